//! Error types for toolcrib
//!
//! All modules use `ToolcribResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for toolcrib operations
pub type ToolcribResult<T> = Result<T, ToolcribError>;

/// All errors that can occur in toolcrib
#[derive(Error, Debug)]
pub enum ToolcribError {
    // Provisioning errors
    #[error("Expected SHA256 {expected} for {tool}-{version}, got {actual}")]
    Integrity {
        tool: String,
        version: String,
        expected: String,
        actual: String,
    },

    #[error("Failed to fetch {tool}: {reason}")]
    Fetch { tool: String, reason: String },

    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("Invalid tool definition for {name}: {reason}")]
    ToolInvalid { name: String, reason: String },

    // Cache errors
    #[error("Unable to reserve cache with key {key}, another job may be creating this cache")]
    CacheReserved { key: String },

    #[error("Cache error: {0}")]
    Cache(String),

    // Workspace errors
    #[error("Build failed with exit code {code}")]
    BuildFailed { code: i32 },

    #[error("Testing failed")]
    TestFailure,

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolcribError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Wrap any acquisition failure into a fetch error naming the tool
    pub fn fetch(tool: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Fetch {
            tool: tool.into(),
            reason: cause.to_string(),
        }
    }

    /// Whether this is the benign "cache key already reserved" race
    pub fn is_reservation_conflict(&self) -> bool {
        matches!(self, Self::CacheReserved { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Integrity { .. } => {
                Some("Check the pinned sha256 in the tool table against the upstream release")
            }
            Self::TestFailure => Some("See the test output above for failing targets"),
            Self::InvalidInput(_) => Some("Boolean inputs accept true/True/TRUE or false/False/FALSE"),
            _ => None,
        }
    }
}
