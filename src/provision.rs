//! Provisioning of the full tool set
//!
//! Installers run concurrently on the current task; they share nothing but
//! the installation directory, and every tool writes only its own files.
//! A failing tool does not cancel its siblings. The first failure (in
//! completion order) is returned and the others are logged.

use crate::error::{ToolcribError, ToolcribResult};
use crate::tool::{InstallContext, InstallSource, ToolInstaller, ToolTable};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Outcome for one installed tool
#[derive(Debug, Clone)]
pub struct ToolReport {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    pub source: InstallSource,
}

/// Installs every tool of a table into one directory
pub struct ProvisioningRunner {
    install_dir: PathBuf,
    context: InstallContext,
}

impl ProvisioningRunner {
    /// Create a runner installing into `install_dir`
    pub fn new(install_dir: PathBuf, context: InstallContext) -> Self {
        Self {
            install_dir,
            context,
        }
    }

    /// Installation directory
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Install all tools, then put the directory on PATH
    ///
    /// Reports are returned in table order.
    pub async fn run(&self, table: &ToolTable) -> ToolcribResult<Vec<ToolReport>> {
        fs::create_dir_all(&self.install_dir).await.map_err(|e| {
            ToolcribError::io(format!("creating {}", self.install_dir.display()), e)
        })?;

        let installers = table
            .tools
            .iter()
            .map(|spec| {
                Ok(ToolInstaller::new(
                    spec.descriptor(&self.install_dir)?,
                    spec.acquisition()?,
                    &self.context,
                ))
            })
            .collect::<ToolcribResult<Vec<_>>>()?;

        let mut pending: FuturesUnordered<_> = installers
            .iter()
            .enumerate()
            .map(|(index, installer)| async move { (index, installer.install().await) })
            .collect();

        let mut outcomes: Vec<Option<InstallSource>> = vec![None; installers.len()];
        let mut first_error: Option<ToolcribError> = None;

        while let Some((index, result)) = pending.next().await {
            let tool = installers[index].descriptor();
            match result {
                Ok(source) => {
                    info!("Installed {} from {}", tool, source);
                    outcomes[index] = Some(source);
                }
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => {
                    self.context
                        .ci
                        .error(&format!("Installing {} failed: {}", tool.name, e));
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        self.context.ci.add_path(&self.install_dir).await?;

        Ok(installers
            .iter()
            .zip(outcomes)
            .filter_map(|(installer, source)| {
                let tool = installer.descriptor();
                source.map(|source| ToolReport {
                    name: tool.name.clone(),
                    version: tool.version.clone(),
                    path: tool.local_path.clone(),
                    source,
                })
            })
            .collect())
    }
}
