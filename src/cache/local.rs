//! Filesystem-backed blob cache
//!
//! Layout under the cache root:
//!
//! ```text
//! <root>/<sha256(key)>/archive.tar.gz   paths, as tar members "0", "1", ...
//! <root>/<sha256(key)>/entry.json       commit marker and metadata
//! ```
//!
//! Creating the entry directory is the reservation. An entry only becomes
//! visible to `restore` once `entry.json` has been renamed into place.

use crate::cache::{BlobCache, CacheId};
use crate::checksum::digest_bytes;
use crate::error::{ToolcribError, ToolcribResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Builder};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

const ENTRY_MANIFEST: &str = "entry.json";
const ENTRY_ARCHIVE: &str = "archive.tar.gz";
const MAX_KEY_LENGTH: usize = 512;

/// Metadata of a committed cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Key the entry was saved under
    pub key: String,
    /// Unique id assigned at save time
    pub id: CacheId,
    /// When the entry was committed
    pub created_at: DateTime<Utc>,
    /// Paths captured in the archive, in member order
    pub paths: Vec<PathBuf>,
    /// Compressed archive size
    pub size_bytes: u64,
}

/// Blob cache stored in a local (possibly shared) directory
pub struct LocalBlobCache {
    root: PathBuf,
}

impl LocalBlobCache {
    /// Create a cache rooted at `root` (created lazily)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, key: &str) -> PathBuf {
        self.root.join(digest_bytes(key))
    }

    /// All committed entries, newest first
    pub async fn entries(&self) -> ToolcribResult<Vec<CacheEntry>> {
        let mut entries = Vec::new();

        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(cache_io("listing", &self.root, e)),
        };

        while let Some(child) = dir
            .next_entry()
            .await
            .map_err(|e| cache_io("listing", &self.root, e))?
        {
            if let Some(entry) = read_manifest(&child.path()).await? {
                entries.push(entry);
            }
        }

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    /// Remove committed entries and abandoned reservations older than `cutoff`
    ///
    /// Returns the committed entries that were (or, for a dry run, would be)
    /// removed.
    pub async fn prune(&self, cutoff: DateTime<Utc>, dry_run: bool) -> ToolcribResult<Vec<CacheEntry>> {
        let mut removed = Vec::new();

        for entry in self.entries().await? {
            if entry.created_at < cutoff {
                if !dry_run {
                    let dir = self.entry_dir(&entry.key);
                    fs::remove_dir_all(&dir)
                        .await
                        .map_err(|e| cache_io("removing", &dir, e))?;
                }
                removed.push(entry);
            }
        }

        if !dry_run {
            self.prune_reservations(cutoff).await?;
        }

        Ok(removed)
    }

    /// Remove reservation directories that never got committed
    async fn prune_reservations(&self, cutoff: DateTime<Utc>) -> ToolcribResult<()> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(cache_io("listing", &self.root, e)),
        };

        while let Some(child) = dir
            .next_entry()
            .await
            .map_err(|e| cache_io("listing", &self.root, e))?
        {
            let path = child.path();
            if !path.is_dir() || path.join(ENTRY_MANIFEST).exists() {
                continue;
            }
            let modified = child
                .metadata()
                .await
                .and_then(|m| m.modified())
                .map(DateTime::<Utc>::from);
            if let Ok(modified) = modified {
                if modified < cutoff {
                    debug!("Removing abandoned reservation {}", path.display());
                    fs::remove_dir_all(&path)
                        .await
                        .map_err(|e| cache_io("removing", &path, e))?;
                }
            }
        }

        Ok(())
    }

    /// Find the entry to restore for `key` / `restore_keys`
    async fn lookup(&self, key: &str, restore_keys: &[String]) -> ToolcribResult<Option<CacheEntry>> {
        if let Some(entry) = read_manifest(&self.entry_dir(key)).await? {
            if entry.key == key {
                return Ok(Some(entry));
            }
        }

        if restore_keys.is_empty() {
            return Ok(None);
        }

        let entries = self.entries().await?;
        for prefix in restore_keys {
            if let Some(entry) = entries.iter().find(|e| e.key.starts_with(prefix.as_str())) {
                return Ok(Some(entry.clone()));
            }
        }

        Ok(None)
    }

    /// Write the archive and manifest into a reserved entry directory
    async fn commit(&self, dir: &Path, paths: &[PathBuf], key: &str) -> ToolcribResult<CacheId> {
        for path in paths {
            if fs::symlink_metadata(path).await.is_err() {
                return Err(ToolcribError::Cache(format!(
                    "path {} does not exist, nothing to cache",
                    path.display()
                )));
            }
        }

        let archive_path = dir.join(ENTRY_ARCHIVE);
        let owned_paths = paths.to_vec();
        let target = archive_path.clone();
        tokio::task::spawn_blocking(move || write_archive(&owned_paths, &target))
            .await
            .map_err(|e| ToolcribError::Internal(format!("cache archive task failed: {}", e)))?
            .map_err(|e| cache_io("writing", &archive_path, e))?;

        let size_bytes = fs::metadata(&archive_path)
            .await
            .map_err(|e| cache_io("reading", &archive_path, e))?
            .len();

        let entry = CacheEntry {
            key: key.to_string(),
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            paths: paths.to_vec(),
            size_bytes,
        };

        let staged = dir.join(format!("{}.tmp", ENTRY_MANIFEST));
        let manifest = dir.join(ENTRY_MANIFEST);
        fs::write(&staged, serde_json::to_vec_pretty(&entry)?)
            .await
            .map_err(|e| cache_io("writing", &staged, e))?;
        fs::rename(&staged, &manifest)
            .await
            .map_err(|e| cache_io("committing", &manifest, e))?;

        Ok(entry.id)
    }
}

#[async_trait]
impl BlobCache for LocalBlobCache {
    async fn restore(
        &self,
        paths: &[PathBuf],
        key: &str,
        restore_keys: &[String],
    ) -> ToolcribResult<Option<String>> {
        validate_key(key)?;

        let Some(entry) = self.lookup(key, restore_keys).await? else {
            debug!("Cache miss for {}", key);
            return Ok(None);
        };

        let archive_path = self.entry_dir(&entry.key).join(ENTRY_ARCHIVE);
        let owned_paths = paths.to_vec();
        let source = archive_path.clone();
        let unpacked = tokio::task::spawn_blocking(move || unpack_archive(&source, &owned_paths))
            .await
            .map_err(|e| ToolcribError::Internal(format!("cache restore task failed: {}", e)))?;
        if let Err(e) = unpacked {
            discard_partial(paths).await;
            return Err(cache_io("restoring", &archive_path, e));
        }

        info!("Cache restored from key: {}", entry.key);
        Ok(Some(entry.key))
    }

    async fn discard(&self, key: &str) -> ToolcribResult<()> {
        validate_key(key)?;

        let dir = self.entry_dir(key);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!("Discarded cache entry: {}", key);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(cache_io("discarding", &dir, e)),
        }
    }

    async fn save(&self, paths: &[PathBuf], key: &str) -> ToolcribResult<CacheId> {
        validate_key(key)?;

        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| cache_io("creating", &self.root, e))?;

        let dir = self.entry_dir(key);
        match fs::create_dir(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(ToolcribError::CacheReserved {
                    key: key.to_string(),
                });
            }
            Err(e) => return Err(cache_io("reserving", &dir, e)),
        }

        match self.commit(&dir, paths, key).await {
            Ok(id) => Ok(id),
            Err(e) => {
                // Release the reservation so a later run can retry
                if let Err(cleanup) = fs::remove_dir_all(&dir).await {
                    warn!("Failed to release cache reservation {}: {}", dir.display(), cleanup);
                }
                Err(e)
            }
        }
    }
}

fn cache_io(action: &str, path: &Path, e: io::Error) -> ToolcribError {
    ToolcribError::Cache(format!("{} {}: {}", action, path.display(), e))
}

fn validate_key(key: &str) -> ToolcribResult<()> {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH || key.contains(',') {
        return Err(ToolcribError::Cache(format!(
            "Key Validation Error: {} cannot be empty, contain commas or exceed {} characters",
            key, MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

/// Read an entry manifest; uncommitted or unreadable entries are skipped
async fn read_manifest(dir: &Path) -> ToolcribResult<Option<CacheEntry>> {
    if !dir.is_dir() {
        return Ok(None);
    }

    let path = dir.join(ENTRY_MANIFEST);
    let content = match fs::read(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(cache_io("reading", &path, e)),
    };

    match serde_json::from_slice(&content) {
        Ok(entry) => Ok(Some(entry)),
        Err(e) => {
            warn!("Ignoring corrupt cache manifest {}: {}", path.display(), e);
            Ok(None)
        }
    }
}

fn write_archive(paths: &[PathBuf], dest: &Path) -> io::Result<()> {
    let file = File::create(dest)?;
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);

    for (index, path) in paths.iter().enumerate() {
        let name = index.to_string();
        if std::fs::symlink_metadata(path)?.is_dir() {
            builder.append_dir_all(&name, path)?;
        } else {
            builder.append_path_with_name(path, &name)?;
        }
    }

    builder.into_inner()?.finish()?;
    Ok(())
}

fn unpack_archive(src: &Path, paths: &[PathBuf]) -> io::Result<()> {
    let file = File::open(src)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);

    // Directory modes are applied once every member is written, deepest first
    let mut directories = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let member = entry.path()?.into_owned();
        let mut components = member.components();

        let index: usize = components
            .next()
            .and_then(|c| c.as_os_str().to_str())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| invalid_member(&member))?;
        let base = paths.get(index).ok_or_else(|| invalid_member(&member))?;

        let rest = components.as_path();
        if rest
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(invalid_member(&member));
        }

        let dest = if rest.as_os_str().is_empty() {
            base.clone()
        } else {
            base.join(rest)
        };

        if entry.header().entry_type().is_dir() {
            let mode = entry.header().mode()?;
            std::fs::create_dir_all(&dest)?;
            set_mode(&dest, mode | 0o700)?;
            directories.push((dest, mode));
            continue;
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry.unpack(&dest)?;
    }

    for (dir, mode) in directories.iter().rev() {
        set_mode(dir, *mode)?;
    }

    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Best-effort removal of whatever a failed restore left behind
async fn discard_partial(paths: &[PathBuf]) {
    for path in paths {
        let result = match fs::symlink_metadata(path).await {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).await,
            Ok(_) => fs::remove_file(path).await,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Failed to remove partially restored {}: {}", path.display(), e);
        }
    }
}

fn invalid_member(member: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("unexpected archive member {}", member.display()),
    )
}
