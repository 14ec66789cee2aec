//! CLI command implementations

pub mod cache;
pub mod config;
pub mod install_tools;
pub mod tools;
pub mod upload_testlogs;

pub use build_test::execute as build_test;
pub use cache::execute as cache;
pub use config::execute as config;
pub use install_tools::execute as install_tools;
pub use tools::execute as tools;
pub use upload_testlogs::execute as upload_testlogs;

use crate::cache::LocalBlobCache;
use crate::ci::CiEnvironment;
use crate::config::Config;
use crate::error::{ToolcribError, ToolcribResult};
use std::path::PathBuf;

/// Detect the CI environment, applying configured overrides
fn ci_environment(config: &Config) -> ToolcribResult<CiEnvironment> {
    let mut ci = CiEnvironment::detect()?;
    if let Some(ref dir) = config.tools.temp_dir {
        ci.temp_dir = dir.clone();
    }
    Ok(ci)
}

/// Blob cache at the configured location
fn open_cache(config: &Config) -> LocalBlobCache {
    LocalBlobCache::new(config.cache.root())
}

/// Workspace directory argument, defaulting to the current directory
fn workspace_dir(workspace: Option<PathBuf>) -> ToolcribResult<PathBuf> {
    match workspace {
        Some(dir) => Ok(dir),
        None => std::env::current_dir()
            .map_err(|e| ToolcribError::io("getting current directory", e)),
    }
}
