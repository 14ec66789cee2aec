//! Tool table: the pinned set of tools to provision
//!
//! The table is data, not code. The built-in table ships as TOML inside the
//! binary and can be replaced with a manifest file of the same shape.

use crate::error::{ToolcribError, ToolcribResult};
use crate::tool::descriptor::{Acquisition, ToolDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path};
use tokio::fs;
use tracing::debug;

const BUILTIN_TABLE: &str = include_str!("tools.toml");

/// Placeholder replaced by the tool version in URLs and revisions
const VERSION_PLACEHOLDER: &str = "{version}";

/// A parsed, validated tool table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolTable {
    #[serde(rename = "tool", default)]
    pub tools: Vec<ToolSpec>,
}

/// One `[[tool]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolSpec {
    pub name: String,
    pub version: String,
    pub sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    pub fetch: FetchSpec,
}

/// Acquisition strategy as written in the table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FetchSpec {
    Executable {
        url: String,
    },
    Archive {
        url: String,
        /// Path of the tool inside the archive (defaults to the file name)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        member: Option<String>,
    },
    Jar {
        url: String,
    },
    Source {
        package: String,
        /// Module revision (defaults to `v{version}`)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        revision: Option<String>,
    },
}

impl ToolTable {
    /// The table compiled into this binary
    pub fn builtin() -> ToolcribResult<Self> {
        let table: Self = toml::from_str(BUILTIN_TABLE)?;
        table.validate()?;
        Ok(table)
    }

    /// Load a table from a manifest file
    pub async fn load(path: &Path) -> ToolcribResult<Self> {
        debug!("Loading tool manifest {}", path.display());
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| ToolcribError::io(format!("reading tool manifest {}", path.display()), e))?;

        let table: Self = toml::from_str(&content).map_err(|e| ToolcribError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        table.validate()?;
        Ok(table)
    }

    /// Load `manifest` if given, otherwise the built-in table
    pub async fn resolve(manifest: Option<&Path>) -> ToolcribResult<Self> {
        match manifest {
            Some(path) => Self::load(path).await,
            None => Self::builtin(),
        }
    }

    /// Check every entry and that no two tools write the same file
    pub fn validate(&self) -> ToolcribResult<()> {
        let root = Path::new("/");
        let mut names = HashSet::new();
        let mut files = HashSet::new();

        for spec in &self.tools {
            let descriptor = spec.descriptor(root)?;
            spec.acquisition()?;

            if !names.insert(spec.name.as_str()) {
                return Err(ToolcribError::ToolInvalid {
                    name: spec.name.clone(),
                    reason: "duplicate tool name".to_string(),
                });
            }

            let mut outputs = vec![descriptor.file_name.clone()];
            if matches!(spec.fetch, FetchSpec::Jar { .. }) {
                outputs.push(descriptor.name.clone());
            }
            for output in outputs {
                if !files.insert(output.clone()) {
                    return Err(ToolcribError::ToolInvalid {
                        name: spec.name.clone(),
                        reason: format!("{} is already written by another tool", output),
                    });
                }
            }
        }

        Ok(())
    }
}

impl ToolSpec {
    /// Descriptor for this tool installed into `install_dir`
    pub fn descriptor(&self, install_dir: &Path) -> ToolcribResult<ToolDescriptor> {
        ToolDescriptor::new(
            &self.name,
            &self.version,
            &self.sha256,
            self.extension.as_deref(),
            install_dir,
        )
    }

    /// Resolved acquisition strategy with the version substituted
    pub fn acquisition(&self) -> ToolcribResult<Acquisition> {
        let expand = |template: &str| template.replace(VERSION_PLACEHOLDER, &self.version);

        let acquisition = match &self.fetch {
            FetchSpec::Executable { url } => Acquisition::Executable { url: expand(url) },
            FetchSpec::Archive { url, member } => {
                let member = match member {
                    Some(member) => member.clone(),
                    None => self.file_name(),
                };
                let relative = Path::new(&member)
                    .components()
                    .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
                if member.is_empty() || !relative {
                    return Err(self.invalid("archive member must be a relative path inside the archive"));
                }
                Acquisition::Archive {
                    url: expand(url),
                    member,
                }
            }
            FetchSpec::Jar { url } => {
                if self.extension.as_deref().unwrap_or_default().is_empty() {
                    return Err(self.invalid("jar tools need an extension so the launcher name is free"));
                }
                Acquisition::Jar { url: expand(url) }
            }
            FetchSpec::Source { package, revision } => {
                if package.is_empty() {
                    return Err(self.invalid("source package must not be empty"));
                }
                let revision = revision.as_deref().unwrap_or("v{version}");
                Acquisition::Source {
                    package: package.clone(),
                    revision: expand(revision),
                }
            }
        };

        Ok(acquisition)
    }

    fn file_name(&self) -> String {
        format!("{}{}", self.name, self.extension.as_deref().unwrap_or_default())
    }

    fn invalid(&self, reason: &str) -> ToolcribError {
        ToolcribError::ToolInvalid {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}
