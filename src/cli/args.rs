//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Toolcrib - CI tool provisioning and workspace build caching
///
/// Installs pinned, digest-verified developer tools and runs workspace
/// builds between cache restore and save.
#[derive(Parser, Debug)]
#[command(name = "toolcrib")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "TOOLCRIB_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install every tool of the tool table and add it to PATH
    InstallTools(InstallToolsArgs),

    /// Build and test a workspace with a restored build cache
    BuildTest(BuildTestArgs),

    /// Collect the workspace's test logs into a directory
    UploadTestlogs(UploadTestlogsArgs),

    /// Inspect the tool table
    Tools(ToolsArgs),

    /// Manage the blob cache
    Cache(CacheArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the install-tools command
#[derive(Parser, Debug)]
pub struct InstallToolsArgs {
    /// Installation directory (default: from config, then $HOME/lint)
    #[arg(short, long)]
    pub install_dir: Option<PathBuf>,

    /// Tool table replacing the built-in one
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,
}

/// Arguments for the build-test command
#[derive(Parser, Debug)]
pub struct BuildTestArgs {
    /// Workspace directory (defaults to current directory)
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,

    /// Additional build option (repeatable, appended to configured options)
    #[arg(long = "build-option", allow_hyphen_values = true)]
    pub build_options: Vec<String>,

    /// Target pattern (repeatable, defaults to //...)
    #[arg(short, long = "target", allow_hyphen_values = true)]
    pub targets: Vec<String>,

    /// Triggering event name (default: GITHUB_EVENT_NAME)
    #[arg(long)]
    pub event: Option<String>,

    /// Whether a successful run may save the cache (YAML boolean)
    #[arg(long, default_value = "true", action = ArgAction::Set, value_parser = parse_bool_arg)]
    pub save_cache: bool,
}

/// Arguments for the upload-testlogs command
#[derive(Parser, Debug)]
pub struct UploadTestlogsArgs {
    /// Workspace directory (defaults to current directory)
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,

    /// Directory receiving the collected logs
    #[arg(short, long)]
    pub dest: PathBuf,
}

/// Arguments for the tools command
#[derive(Parser, Debug)]
pub struct ToolsArgs {
    /// Subcommand for tools
    #[command(subcommand)]
    pub action: ToolsAction,
}

/// Tools subcommands
#[derive(Subcommand, Debug)]
pub enum ToolsAction {
    /// List the tools that would be installed
    List {
        /// Tool table replacing the built-in one
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Print the SHA-256 digest of a file
    Digest {
        /// File to hash
        file: PathBuf,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List committed cache entries
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove old entries and abandoned reservations
    Gc {
        /// Remove entries older than N days (default: from config)
        #[arg(long)]
        days: Option<u32>,

        /// Dry run - show what would be removed
        #[arg(long)]
        dry_run: bool,
    },
}

fn parse_bool_arg(s: &str) -> Result<bool, String> {
    crate::ci::parse_yaml_bool(s).map_err(|e| e.to_string())
}
