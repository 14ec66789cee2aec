//! Durable key/value blob cache
//!
//! A cache entry is an immutable snapshot of a set of paths stored under a
//! string key. Entries are looked up by exact key first, then by an ordered
//! list of key prefixes where the most recently written match wins.
//!
//! # Reservation
//!
//! Saving first reserves the key. When another writer already holds the
//! reservation the save fails with [`ToolcribError::CacheReserved`]; callers
//! treat that as a benign race, since a given key always describes the same
//! content.
//!
//! [`ToolcribError::CacheReserved`]: crate::error::ToolcribError::CacheReserved

pub mod local;

pub use local::{CacheEntry, LocalBlobCache};

use crate::error::ToolcribResult;
use async_trait::async_trait;
use std::path::PathBuf;
use uuid::Uuid;

/// Identifier of a saved cache entry
pub type CacheId = Uuid;

/// Abstract blob cache interface
#[async_trait]
pub trait BlobCache: Send + Sync {
    /// Restore `paths` from the entry stored under `key`, falling back to
    /// the newest entry whose key starts with one of `restore_keys` (tried
    /// in order). Returns the key that matched, or `None` on a miss.
    async fn restore(
        &self,
        paths: &[PathBuf],
        key: &str,
        restore_keys: &[String],
    ) -> ToolcribResult<Option<String>>;

    /// Save `paths` under `key`
    async fn save(&self, paths: &[PathBuf], key: &str) -> ToolcribResult<CacheId>;

    /// Drop the entry stored under `key` so it can be saved again.
    /// Backends with immutable entries keep the default, which does nothing.
    async fn discard(&self, _key: &str) -> ToolcribResult<()> {
        Ok(())
    }
}
