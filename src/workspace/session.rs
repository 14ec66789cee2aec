//! Workspace cache session
//!
//! The key combines a cache format version, a hash of the build tool's
//! execution root, and the source tree hash. Restores fall back to the
//! newest snapshot for the same execution root, accepting a stale but warm
//! cache over a cold build.

use crate::cache::{BlobCache, CacheId};
use crate::checksum::digest_bytes;
use crate::ci::CiEnvironment;
use crate::error::{ToolcribError, ToolcribResult};
use crate::workspace::{BuildTool, SourceControl};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Identity of one workspace cache snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceCacheKey {
    /// Hash of the execution root path
    pub exec_root_hash: String,
    /// Source tree content hash
    pub tree_hash: String,
    /// Exact key used for save and first restore attempt
    pub exact_key: String,
    /// Fallback prefix shared by every tree state of this execution root
    pub restore_prefix: String,
    /// Cached paths (the build tool's output base)
    pub paths: Vec<PathBuf>,
}

impl WorkspaceCacheKey {
    /// Compose the key from its parts
    pub fn new(cache_version: &str, exec_root: &str, tree_hash: &str, paths: Vec<PathBuf>) -> Self {
        let exec_root_hash = digest_bytes(exec_root);
        let restore_prefix = format!("bazel-{}-{}-", cache_version, exec_root_hash);
        Self {
            exact_key: format!("{}{}", restore_prefix, tree_hash),
            exec_root_hash,
            tree_hash: tree_hash.to_string(),
            restore_prefix,
            paths,
        }
    }
}

/// Result of the end-of-run save attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Snapshot uploaded
    Saved(CacheId),
    /// Another writer already holds this key
    AlreadyReserved,
    /// Save not attempted, with the reason
    Skipped(String),
}

/// Restores a workspace cache before the build and saves it afterwards
pub struct WorkspaceCacheSession {
    cache: Arc<dyn BlobCache>,
    cache_version: String,
    save_events: Vec<String>,
    ci: CiEnvironment,
}

impl WorkspaceCacheSession {
    /// Create a session
    pub fn new(
        cache: Arc<dyn BlobCache>,
        cache_version: impl Into<String>,
        save_events: Vec<String>,
        ci: CiEnvironment,
    ) -> Self {
        Self {
            cache,
            cache_version: cache_version.into(),
            save_events,
            ci,
        }
    }

    /// Compute the key and restore the best available snapshot
    ///
    /// Returns the key and the cache key that was restored, if any. Restore
    /// failures are logged and treated as a miss.
    pub async fn begin(
        &self,
        tool: &dyn BuildTool,
        vcs: &dyn SourceControl,
    ) -> ToolcribResult<(WorkspaceCacheKey, Option<String>)> {
        let exec_root = tool.info("execution_root").await?;
        let tree_hash = vcs.tree_hash().await?;
        let output_base = tool.info("output_base").await?;
        debug!("execution_root={} output_base={}", exec_root, output_base);

        let key = WorkspaceCacheKey::new(
            &self.cache_version,
            &exec_root,
            &tree_hash,
            vec![PathBuf::from(output_base)],
        );

        let restored = match self
            .cache
            .restore(&key.paths, &key.exact_key, &[key.restore_prefix.clone()])
            .await
        {
            Ok(Some(matched)) => {
                if matched == key.exact_key {
                    info!("Restored workspace cache {}", matched);
                } else {
                    info!("Restored stale workspace cache {} for {}", matched, key.exact_key);
                }
                Some(matched)
            }
            Ok(None) => {
                info!("No workspace cache found for {}", key.exact_key);
                None
            }
            Err(e) => {
                self.ci.warning(&format!("Failed to restore workspace cache: {}", e));
                None
            }
        };

        Ok((key, restored))
    }

    /// Save the snapshot when the run succeeded over the full target
    /// universe and was triggered by an allow-listed event
    pub async fn end(
        &self,
        key: &WorkspaceCacheKey,
        success: bool,
        covered_everything: bool,
    ) -> ToolcribResult<SaveOutcome> {
        if !success {
            return Ok(SaveOutcome::Skipped("run did not succeed".to_string()));
        }
        if !covered_everything {
            return Ok(SaveOutcome::Skipped(
                "run did not cover every target".to_string(),
            ));
        }

        let event = self.ci.event_name.as_deref().unwrap_or_default();
        if !self.save_events.iter().any(|allowed| allowed == event) {
            return Ok(SaveOutcome::Skipped(format!(
                "event '{}' does not save caches",
                event
            )));
        }

        match self.cache.save(&key.paths, &key.exact_key).await {
            Ok(id) => {
                info!("Saved workspace cache {}", key.exact_key);
                Ok(SaveOutcome::Saved(id))
            }
            Err(e) if e.is_reservation_conflict() => {
                self.ci.warning(&e.to_string());
                Ok(SaveOutcome::AlreadyReserved)
            }
            Err(e) => Err(e),
        }
    }
}

/// Fail unless the test exit code is in the accepted set
pub fn check_test_exit(code: i32, accepted: &[i32]) -> ToolcribResult<()> {
    if accepted.contains(&code) {
        Ok(())
    } else {
        debug!("Test exit code {} not in {:?}", code, accepted);
        Err(ToolcribError::TestFailure)
    }
}
