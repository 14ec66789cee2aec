//! Workspace build/test driver with a cross-run build cache
//!
//! The build tool and version control are reached through narrow traits so
//! the cache session can be exercised without a real workspace.

mod runner;
mod session;
mod testlogs;

pub use runner::{BuildTestOptions, BuildTestReport, BuildTestRunner, FULL_TARGET_UNIVERSE};
pub use session::{check_test_exit, SaveOutcome, WorkspaceCacheKey, WorkspaceCacheSession};
pub use testlogs::collect_test_logs;

use crate::error::{ToolcribError, ToolcribResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// External build tool interface
#[async_trait]
pub trait BuildTool: Send + Sync {
    /// Query a value such as `execution_root` or `output_base`
    async fn info(&self, key: &str) -> ToolcribResult<String>;

    /// Build `targets`, returning the exit code
    async fn build(&self, options: &[String], targets: &[String]) -> ToolcribResult<i32>;

    /// Test `targets`, returning the exit code
    async fn test(&self, options: &[String], targets: &[String]) -> ToolcribResult<i32>;
}

/// Source tree identity
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Content hash of the checked-out tree
    async fn tree_hash(&self) -> ToolcribResult<String>;
}

/// Bazel (or bazelisk) run in a workspace directory
pub struct Bazel {
    binary: String,
    workspace: PathBuf,
}

impl Bazel {
    /// Create a driver for `binary` in `workspace`
    pub fn new(binary: impl Into<String>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            workspace: workspace.into(),
        }
    }

    /// Run a command with output shown in the job log
    async fn exec_visible(&self, command: &str, options: &[String], targets: &[String]) -> ToolcribResult<i32> {
        let mut args = vec![command.to_string()];
        args.extend(options.iter().cloned());
        args.extend(targets.iter().cloned());
        debug!("Executing: {} {:?}", self.binary, args);

        let status = Command::new(&self.binary)
            .args(&args)
            .current_dir(&self.workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| ToolcribError::command_failed(format!("{} {}", self.binary, command), e))?;

        Ok(status.code().unwrap_or(-1))
    }
}

#[async_trait]
impl BuildTool for Bazel {
    async fn info(&self, key: &str) -> ToolcribResult<String> {
        capture(&self.binary, &["info", key], &self.workspace).await
    }

    async fn build(&self, options: &[String], targets: &[String]) -> ToolcribResult<i32> {
        self.exec_visible("build", options, targets).await
    }

    async fn test(&self, options: &[String], targets: &[String]) -> ToolcribResult<i32> {
        self.exec_visible("test", options, targets).await
    }
}

/// Git working copy
pub struct Git {
    workspace: PathBuf,
}

impl Git {
    /// Create a handle for the working copy at `workspace`
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }
}

#[async_trait]
impl SourceControl for Git {
    async fn tree_hash(&self) -> ToolcribResult<String> {
        capture("git", &["rev-parse", "HEAD:"], &self.workspace).await
    }
}

/// Run a command and return its trimmed stdout
async fn capture(program: &str, args: &[&str], dir: &Path) -> ToolcribResult<String> {
    let command = format!("{} {}", program, args.join(" "));
    debug!("Executing: {}", command);

    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ToolcribError::command_failed(&command, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ToolcribError::command_exec(command, stderr.trim()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
