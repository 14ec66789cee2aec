//! Configuration schema for toolcrib
//!
//! Configuration is stored at `~/.config/toolcrib/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Tool provisioning settings
    pub tools: ToolsConfig,

    /// Blob cache settings
    pub cache: CacheConfig,

    /// Workspace build/test settings
    pub workspace: WorkspaceConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Tool provisioning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Installation directory (defaults to `$HOME/lint`)
    pub install_dir: Option<PathBuf>,

    /// Tool table replacing the built-in one
    pub manifest: Option<PathBuf>,

    /// Scratch directory for archives and source builds
    /// (defaults to `RUNNER_TEMP`, then the OS temp dir)
    pub temp_dir: Option<PathBuf>,

    /// Jar runner invoked by generated launcher scripts
    pub java: String,

    /// Go toolchain used by source builds
    pub go: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            install_dir: None,
            manifest: None,
            temp_dir: None,
            java: "java".to_string(),
            go: "go".to_string(),
        }
    }
}

/// Blob cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root (defaults to the user cache dir)
    pub dir: Option<PathBuf>,

    /// Entries older than this are removed by `cache gc`
    pub gc_days: u32,
}

impl CacheConfig {
    /// Configured cache root, or `toolcrib` under the user cache dir
    pub fn root(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("toolcrib")
        })
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            gc_days: 30,
        }
    }
}

/// Workspace build/test configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Build tool binary
    pub build_tool: String,

    /// Cache format version, bump to invalidate every workspace cache
    pub cache_version: String,

    /// Extra options passed to both build and test
    pub build_options: Vec<String>,

    /// Test exit codes that do not fail the run
    pub accepted_test_exit_codes: Vec<i32>,

    /// Triggering events allowed to save the workspace cache
    pub save_events: Vec<String>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            build_tool: "bazelisk".to_string(),
            cache_version: "v1".to_string(),
            build_options: vec![],
            // 0 = passed, 4 = no test targets
            accepted_test_exit_codes: vec![0, 4],
            save_events: vec![
                "push".to_string(),
                "schedule".to_string(),
                "workflow_dispatch".to_string(),
            ],
        }
    }
}
