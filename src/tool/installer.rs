//! Restore-or-fetch, verify, cache installation of a single tool
//!
//! # States
//!
//! | State | Next |
//! |-------|------|
//! | Restore | Validate on hit, Fetch on miss |
//! | Validate | Ready on match; discard file and Fetch on mismatch |
//! | Fetch | PostFetchValidate, or fail with `Fetch` |
//! | PostFetchValidate | CacheSave, or fail with `Integrity` |
//! | CacheSave | Ready; a reservation conflict is only a warning |
//!
//! Verification gates both the cache read and the cache write, so a tool
//! reported as installed always matches its pinned digest.

use crate::cache::BlobCache;
use crate::ci::CiEnvironment;
use crate::error::{ToolcribError, ToolcribResult};
use crate::fetch::{extract_tar_gz, Downloader};
use crate::tool::descriptor::{Acquisition, ToolDescriptor};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

const EXECUTABLE_MODE: u32 = 0o755;

/// Collaborators shared by every installer in a run
pub struct InstallContext {
    /// Durable cache for verified artifacts
    pub cache: Arc<dyn BlobCache>,
    /// Network fetcher
    pub downloader: Arc<dyn Downloader>,
    /// Process environment (scratch dir, annotations, PATH)
    pub ci: CiEnvironment,
    /// Jar runner used in launcher scripts
    pub java: String,
    /// Go toolchain for source builds
    pub go: String,
}

/// Where an installed tool came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallSource {
    /// Restored from the blob cache and verified
    Cache,
    /// Fetched from the network and verified
    Network,
}

impl std::fmt::Display for InstallSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// Installs one tool described by a descriptor and a strategy
pub struct ToolInstaller<'a> {
    descriptor: ToolDescriptor,
    acquisition: Acquisition,
    ctx: &'a InstallContext,
}

impl<'a> ToolInstaller<'a> {
    /// Create an installer
    pub fn new(descriptor: ToolDescriptor, acquisition: Acquisition, ctx: &'a InstallContext) -> Self {
        Self {
            descriptor,
            acquisition,
            ctx,
        }
    }

    /// The tool being installed
    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// The acquisition strategy
    pub fn acquisition(&self) -> &Acquisition {
        &self.acquisition
    }

    /// Run the installation to completion
    pub async fn install(&self) -> ToolcribResult<InstallSource> {
        let tool = &self.descriptor;
        info!("Installing {}", tool.name);

        let source = if self.restore().await? {
            InstallSource::Cache
        } else {
            info!("Downloading {}", tool.name);
            self.fetch()
                .await
                .map_err(|e| ToolcribError::fetch(&tool.name, e))?;
            tool.verify().await?;
            self.save().await?;
            InstallSource::Network
        };

        if let Acquisition::Jar { .. } = self.acquisition {
            self.write_launcher().await?;
        }

        Ok(source)
    }

    /// Try the exact cache key; only a verified restore counts as a hit
    async fn restore(&self) -> ToolcribResult<bool> {
        let tool = &self.descriptor;
        let paths = [tool.local_path.clone()];

        match self.ctx.cache.restore(&paths, &tool.cache_key, &[]).await {
            Ok(Some(_)) => {}
            Ok(None) => return Ok(false),
            Err(e) => {
                self.ctx
                    .ci
                    .warning(&format!("Failed to restore {} from cache: {}", tool.cache_key, e));
                return Ok(false);
            }
        }

        if let Err(e) = tool.verify().await {
            self.ctx.ci.warning(&e.to_string());
            remove_file_if_exists(&tool.local_path).await?;
            // Free the key so the refetched artifact replaces the bad entry
            if let Err(e) = self.ctx.cache.discard(&tool.cache_key).await {
                self.ctx
                    .ci
                    .warning(&format!("Failed to discard cache entry {}: {}", tool.cache_key, e));
            }
            return Ok(false);
        }

        info!("Restored {} from cache", tool.cache_key);
        Ok(true)
    }

    /// Upload the verified artifact; losing the reservation race is fine
    async fn save(&self) -> ToolcribResult<()> {
        let tool = &self.descriptor;
        let paths = [tool.local_path.clone()];

        match self.ctx.cache.save(&paths, &tool.cache_key).await {
            Ok(id) => {
                info!("Saved {} to cache", tool.cache_key);
                debug!("Cache id for {}: {}", tool.cache_key, id);
                Ok(())
            }
            Err(e) if e.is_reservation_conflict() => {
                self.ctx.ci.warning(&e.to_string());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Obtain the artifact at `local_path` using the tool's strategy
    async fn fetch(&self) -> ToolcribResult<()> {
        let path = &self.descriptor.local_path;
        match &self.acquisition {
            Acquisition::Executable { url } => {
                self.ctx.downloader.download(url, path).await?;
                set_executable(path).await
            }
            Acquisition::Archive { url, member } => {
                let scratch = self.scratch_dir().await?;
                let result = self.fetch_archive(&scratch, url, member).await;
                discard_scratch(&scratch).await;
                result
            }
            Acquisition::Jar { url } => self.ctx.downloader.download(url, path).await,
            Acquisition::Source { package, revision } => {
                let scratch = self.scratch_dir().await?;
                let result = self.build_from_source(&scratch, package, revision).await;
                discard_scratch(&scratch).await;
                result
            }
        }
    }

    async fn fetch_archive(&self, scratch: &Path, url: &str, member: &str) -> ToolcribResult<()> {
        let archive = scratch.join(format!("{}.tar.gz", self.descriptor.file_name));
        self.ctx.downloader.download(url, &archive).await?;

        let extracted = scratch.join("extracted");
        extract_tar_gz(&archive, &extracted).await?;

        copy_file(&extracted.join(member), &self.descriptor.local_path).await
    }

    /// Build a Go package in an isolated module and copy out the binary
    async fn build_from_source(&self, scratch: &Path, package: &str, revision: &str) -> ToolcribResult<()> {
        let go = self.ctx.go.as_str();
        let output = scratch.join(&self.descriptor.file_name);
        let output_arg = output.to_string_lossy().into_owned();
        let pinned = format!("{}@{}", package, revision);

        run_in(scratch, go, &["mod", "init", "toolcrib.local/build"]).await?;
        run_in(scratch, go, &["get", &pinned]).await?;
        run_in(
            scratch,
            go,
            &["build", "-ldflags=-s -w", "-o", &output_arg, package],
        )
        .await?;

        copy_file(&output, &self.descriptor.local_path).await
    }

    /// Write the launcher next to the jar; regenerated on every install
    async fn write_launcher(&self) -> ToolcribResult<()> {
        let tool = &self.descriptor;
        let script = launcher_script(&tool.name, &self.ctx.java, &tool.local_path);
        let launcher = tool.launcher_path();

        fs::write(&launcher, script)
            .await
            .map_err(|e| ToolcribError::io(format!("writing launcher {}", launcher.display()), e))?;
        set_executable(&launcher).await?;

        debug!("Wrote launcher {}", launcher.display());
        Ok(())
    }

    /// Fresh per-install scratch directory
    async fn scratch_dir(&self) -> ToolcribResult<PathBuf> {
        let dir = self.ctx.ci.temp_dir.join(format!(
            "{}-{}",
            self.descriptor.name,
            Uuid::new_v4().simple()
        ));
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ToolcribError::io(format!("creating {}", dir.display()), e))?;
        Ok(dir)
    }
}

/// Bash launcher that runs a jar under `java`, forwarding all arguments
pub fn launcher_script(name: &str, java: &str, jar: &Path) -> String {
    format!(
        "#!/usr/bin/env bash\nexec -a '{}' '{}' -jar '{}' \"$@\"\n",
        shell_escape(name),
        shell_escape(java),
        shell_escape(&jar.to_string_lossy()),
    )
}

/// POSIX single-quote escaping: replace `'` with `'\''`.
fn shell_escape(s: &str) -> String {
    s.replace('\'', "'\\''")
}

async fn run_in(dir: &Path, program: &str, args: &[&str]) -> ToolcribResult<()> {
    let command = format!("{} {}", program, args.join(" "));
    debug!("Executing in {}: {}", dir.display(), command);

    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ToolcribError::command_failed(&command, e))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ToolcribError::command_exec(command, stderr.trim()))
    }
}

async fn copy_file(from: &Path, to: &Path) -> ToolcribResult<()> {
    fs::copy(from, to)
        .await
        .map_err(|e| ToolcribError::io(format!("copying {} to {}", from.display(), to.display()), e))?;
    Ok(())
}

async fn remove_file_if_exists(path: &Path) -> ToolcribResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ToolcribError::io(format!("removing {}", path.display()), e)),
    }
}

async fn discard_scratch(dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dir).await {
        debug!("Could not remove scratch dir {}: {}", dir.display(), e);
    }
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> ToolcribResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(EXECUTABLE_MODE))
        .await
        .map_err(|e| ToolcribError::io(format!("marking {} executable", path.display()), e))
}

#[cfg(not(unix))]
async fn set_executable(_path: &Path) -> ToolcribResult<()> {
    Ok(())
}
