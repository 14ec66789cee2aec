//! CI platform primitives
//!
//! Environment detection, workflow annotations and the executable search
//! path. Only GitHub Actions workflow commands are emitted; every other
//! environment falls back to plain `tracing` output.

use crate::error::{ToolcribError, ToolcribResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};

/// True values in the YAML 1.2 core schema
const YAML_TRUE_VALUES: [&str; 3] = ["true", "True", "TRUE"];
/// False values in the YAML 1.2 core schema
const YAML_FALSE_VALUES: [&str; 3] = ["false", "False", "FALSE"];

/// Whether this process runs inside a GitHub Actions job
pub fn on_actions_runner() -> bool {
    std::env::var("GITHUB_ACTIONS").map(|v| v == "true").unwrap_or(false)
}

/// Process environment as seen by a CI job
#[derive(Debug, Clone)]
pub struct CiEnvironment {
    /// User home directory
    pub home_dir: PathBuf,
    /// Scratch directory for temporary files
    pub temp_dir: PathBuf,
    /// Name of the triggering event, if known
    pub event_name: Option<String>,
    /// File the runner reads additional PATH entries from
    path_file: Option<PathBuf>,
    /// Whether `add_path` also updates this process's PATH
    update_process_path: bool,
    /// Whether to emit workflow command annotations
    annotate: bool,
}

impl CiEnvironment {
    /// Detect the current environment
    pub fn detect() -> ToolcribResult<Self> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| ToolcribError::InvalidInput("cannot determine home directory".into()))?;
        let temp_dir = std::env::var_os("RUNNER_TEMP")
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);
        let annotate = on_actions_runner();

        Ok(Self {
            home_dir,
            temp_dir,
            event_name: std::env::var("GITHUB_EVENT_NAME").ok(),
            path_file: std::env::var_os("GITHUB_PATH").map(PathBuf::from),
            update_process_path: true,
            annotate,
        })
    }

    /// An environment with explicit directories and no side effects on the
    /// current process (for tests and embedding)
    pub fn isolated(home_dir: PathBuf, temp_dir: PathBuf) -> Self {
        Self {
            home_dir,
            temp_dir,
            event_name: None,
            path_file: None,
            update_process_path: false,
            annotate: false,
        }
    }

    /// Record PATH additions in the given file
    pub fn with_path_file(mut self, path: PathBuf) -> Self {
        self.path_file = Some(path);
        self
    }

    /// Override the triggering event name
    pub fn with_event(mut self, event: Option<String>) -> Self {
        if event.is_some() {
            self.event_name = event;
        }
        self
    }

    /// Whether workflow annotations are emitted
    pub fn is_annotating(&self) -> bool {
        self.annotate
    }

    /// Make executables in `dir` resolvable by bare name for this process
    /// and for later steps of the job
    pub async fn add_path(&self, dir: &Path) -> ToolcribResult<()> {
        if let Some(ref path_file) = self.path_file {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path_file)
                .await
                .map_err(|e| ToolcribError::io(format!("opening {}", path_file.display()), e))?;
            let line = format!("{}\n", dir.display());
            file.write_all(line.as_bytes())
                .await
                .map_err(|e| ToolcribError::io(format!("writing {}", path_file.display()), e))?;
            file.flush()
                .await
                .map_err(|e| ToolcribError::io(format!("writing {}", path_file.display()), e))?;
        }

        // Runs once every installer has been joined: no other task or
        // blocking thread of this process reads the environment here.
        if self.update_process_path {
            let current = std::env::var_os("PATH").unwrap_or_default();
            let joined = prepend_path(dir, &current)?;
            std::env::set_var("PATH", joined);
        }

        debug!("Added {} to PATH", dir.display());
        Ok(())
    }

    /// Log a warning, annotating the workflow run when supported
    pub fn warning(&self, message: &str) {
        warn!("{}", message);
        if self.annotate {
            println!("::warning::{}", escape_data(message));
        }
    }

    /// Annotate the workflow run with a fatal error, without logging
    pub fn annotate_failure(&self, message: &str) {
        if self.annotate {
            println!("::error::{}", escape_data(message));
        }
    }

    /// Log a failure, annotating the workflow run when supported
    pub fn error(&self, message: &str) {
        error!("{}", message);
        if self.annotate {
            println!("::error::{}", escape_data(message));
        }
    }
}

/// Build a PATH value with `dir` in front of `current`
fn prepend_path(dir: &Path, current: &OsString) -> ToolcribResult<OsString> {
    let entries = std::iter::once(dir.to_path_buf()).chain(std::env::split_paths(current));
    std::env::join_paths(entries)
        .map_err(|e| ToolcribError::InvalidInput(format!("cannot add {} to PATH: {}", dir.display(), e)))
}

/// Escape a message for a workflow command
fn escape_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Parse a boolean action input using the YAML 1.2 core schema
pub fn parse_yaml_bool(input: &str) -> ToolcribResult<bool> {
    if YAML_TRUE_VALUES.contains(&input) {
        return Ok(true);
    }
    if YAML_FALSE_VALUES.contains(&input) {
        return Ok(false);
    }
    Err(ToolcribError::InvalidInput(format!(
        "{} is not a valid YAML 1.2 Core Schema boolean",
        input
    )))
}
