//! Configuration loading
//!
//! `config.toml` provides the settings; a handful of `TOOLCRIB_*` variables
//! override single values so a workflow step can redirect the cache or the
//! install directory without writing a config file:
//!
//! | Variable               | Setting              |
//! |------------------------|----------------------|
//! | `TOOLCRIB_CACHE_DIR`   | `cache.dir`          |
//! | `TOOLCRIB_INSTALL_DIR` | `tools.install_dir`  |
//! | `TOOLCRIB_LOG_FORMAT`  | `general.log_format` |

pub mod schema;

pub use schema::Config;

use crate::error::{ToolcribError, ToolcribResult};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Locates, reads and initializes the config file
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager for an explicit path (`--config` / `TOOLCRIB_CONFIG`), or the
    /// per-user `toolcrib/config.toml`
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            config_path: path.unwrap_or_else(default_config_path),
        }
    }

    /// Config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Read the config file (defaults when absent), then apply `TOOLCRIB_*`
    /// overrides from the process environment
    pub async fn load(&self) -> ToolcribResult<Config> {
        let mut config = self.read().await?;
        apply_env_overrides(&mut config, |name| std::env::var_os(name));
        Ok(config)
    }

    async fn read(&self) -> ToolcribResult<Config> {
        let path = &self.config_path;
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(ToolcribError::io(
                    format!("reading config from {}", path.display()),
                    e,
                ))
            }
        };

        toml::from_str(&content).map_err(|e| ToolcribError::ConfigInvalid {
            path: path.clone(),
            reason: e.to_string(),
        })
    }

    /// Write the default configuration. An existing file is left alone
    /// unless `force` is set; returns whether the file was written.
    pub async fn init(&self, force: bool) -> ToolcribResult<bool> {
        let path = &self.config_path;
        if !force && fs::try_exists(path).await.unwrap_or(false) {
            return Ok(false);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolcribError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let content = toml::to_string_pretty(&Config::default())?;
        fs::write(path, content)
            .await
            .map_err(|e| ToolcribError::io(format!("writing config to {}", path.display()), e))?;

        info!("Wrote default configuration to {}", path.display());
        Ok(true)
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("toolcrib")
        .join("config.toml")
}

/// Apply `TOOLCRIB_*` overrides; empty values are ignored
fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<OsString>) {
    let var = |name: &str| var(name).filter(|value| !value.is_empty());

    if let Some(dir) = var("TOOLCRIB_CACHE_DIR") {
        config.cache.dir = Some(PathBuf::from(dir));
    }
    if let Some(dir) = var("TOOLCRIB_INSTALL_DIR") {
        config.tools.install_dir = Some(PathBuf::from(dir));
    }
    if let Some(format) = var("TOOLCRIB_LOG_FORMAT").and_then(|v| v.into_string().ok()) {
        config.general.log_format = format;
    }
}
