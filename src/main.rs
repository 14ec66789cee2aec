//! Toolcrib - CI tool provisioning and workspace build caching
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::process::ExitCode;
use toolcrib::ci::{on_actions_runner, CiEnvironment};
use toolcrib::cli::{commands, Cli, Commands};
use toolcrib::config::ConfigManager;
use toolcrib::error::ToolcribResult;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            if let Ok(ci) = CiEnvironment::detect() {
                ci.annotate_failure(&e.to_string());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ToolcribResult<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(cli.config.clone());
    let config = config_manager.load().await?;

    let filter = EnvFilter::new(filter_directive(cli.verbose, on_actions_runner()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.general.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }

    match cli.command {
        Commands::InstallTools(args) => commands::install_tools(args, &config).await,
        Commands::BuildTest(args) => commands::build_test(args, &config).await,
        Commands::UploadTestlogs(args) => commands::upload_testlogs(args, &config).await,
        Commands::Tools(args) => commands::tools(args, &config).await,
        Commands::Cache(args) => commands::cache(args, &config).await,
        Commands::Config(args) => commands::config(args, &config_manager, &config).await,
    }
}

/// 0 = warn (info on a workflow runner), 1 = info, 2+ = debug
fn filter_directive(verbose: u8, on_runner: bool) -> &'static str {
    match verbose {
        0 if on_runner => "toolcrib=info",
        0 => "toolcrib=warn",
        1 => "toolcrib=info",
        _ => "toolcrib=debug",
    }
}
