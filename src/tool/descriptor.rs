//! Tool identity and acquisition strategy

use crate::checksum;
use crate::error::{ToolcribError, ToolcribResult};
use std::fmt;
use std::path::{Path, PathBuf};

/// Length of a hex-encoded SHA-256 digest
const DIGEST_HEX_LEN: usize = 64;

/// Immutable description of one installable tool
///
/// `cache_key` is derived from `file_name`, `version` and `expected_digest`,
/// so two descriptors with the same key always install identical bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    /// Tool identity, also the launcher name for jar tools
    pub name: String,
    /// Pinned version
    pub version: String,
    /// Hex-encoded SHA-256 of the installed artifact
    pub expected_digest: String,
    /// On-disk name: `name` plus optional extension
    pub file_name: String,
    /// Absolute install location
    pub local_path: PathBuf,
    /// Cache entry key
    pub cache_key: String,
}

impl ToolDescriptor {
    /// Build a descriptor for a tool installed into `install_dir`
    pub fn new(
        name: &str,
        version: &str,
        expected_digest: &str,
        extension: Option<&str>,
        install_dir: &Path,
    ) -> ToolcribResult<Self> {
        validate_name(name)?;
        validate_version(name, version)?;
        validate_digest(name, expected_digest)?;

        let file_name = match extension {
            Some(ext) => {
                validate_extension(name, ext)?;
                format!("{}{}", name, ext)
            }
            None => name.to_string(),
        };

        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            expected_digest: expected_digest.to_string(),
            local_path: install_dir.join(&file_name),
            cache_key: Self::cache_key_for(&file_name, version, expected_digest),
            file_name,
        })
    }

    /// Cache key for a (file name, version, digest) triple
    ///
    /// File names never contain `@` and digests are fixed-width, so the
    /// encoding is injective.
    pub fn cache_key_for(file_name: &str, version: &str, digest: &str) -> String {
        format!("{}@{}-{}", file_name, version, digest)
    }

    /// Path of the generated launcher script for jar tools
    pub fn launcher_path(&self) -> PathBuf {
        self.local_path.with_file_name(&self.name)
    }

    /// Verify the installed artifact against the pinned digest
    pub async fn verify(&self) -> ToolcribResult<()> {
        checksum::verify(
            &self.local_path,
            &self.expected_digest,
            &self.name,
            &self.version,
        )
        .await
    }
}

impl fmt::Display for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

/// How a tool's bytes are obtained, with URLs already expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// Download a ready-to-run executable
    Executable { url: String },
    /// Download a `.tar.gz` and copy `member` out of it
    Archive { url: String, member: String },
    /// Download a jar and generate a launcher script next to it
    Jar { url: String },
    /// Compile a Go package at a pinned revision
    Source { package: String, revision: String },
}

impl Acquisition {
    /// Short strategy name
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Executable { .. } => "executable",
            Self::Archive { .. } => "archive",
            Self::Jar { .. } => "jar",
            Self::Source { .. } => "source",
        }
    }
}

impl fmt::Display for Acquisition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> ToolcribError {
    ToolcribError::ToolInvalid {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn validate_name(name: &str) -> ToolcribResult<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(invalid(name, "name must be a file name"));
    }
    if name
        .chars()
        .any(|c| c == '/' || c == '\\' || c == '@' || c.is_whitespace())
    {
        return Err(invalid(
            name,
            "name must not contain '/', '\\', '@' or whitespace",
        ));
    }
    Ok(())
}

fn validate_version(name: &str, version: &str) -> ToolcribResult<()> {
    if version.is_empty() || version.chars().any(char::is_whitespace) {
        return Err(invalid(name, "version must be non-empty without whitespace"));
    }
    Ok(())
}

fn validate_digest(name: &str, digest: &str) -> ToolcribResult<()> {
    let well_formed = digest.len() == DIGEST_HEX_LEN
        && digest
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
    if !well_formed {
        return Err(invalid(name, "sha256 must be 64 lowercase hex characters"));
    }
    Ok(())
}

fn validate_extension(name: &str, ext: &str) -> ToolcribResult<()> {
    if ext.len() < 2
        || !ext.starts_with('.')
        || ext
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '@' || c.is_whitespace())
    {
        return Err(invalid(name, format!("invalid extension '{}'", ext)));
    }
    Ok(())
}
