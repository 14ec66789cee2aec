//! Shared test doubles

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use toolcrib::cache::{BlobCache, CacheId, LocalBlobCache};
use toolcrib::error::{ToolcribError, ToolcribResult};
use toolcrib::fetch::Downloader;
use toolcrib::workspace::{BuildTool, SourceControl};

/// Serves fixed bodies by URL and counts requests
#[derive(Default)]
pub struct StubDownloader {
    bodies: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
}

impl StubDownloader {
    pub fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_string(), body.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Downloader for StubDownloader {
    async fn download(&self, url: &str, dest: &Path) -> ToolcribResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Let other installers interleave
        tokio::task::yield_now().await;
        match self.bodies.get(url) {
            Some(body) => tokio::fs::write(dest, body)
                .await
                .map_err(|e| ToolcribError::io("writing stub download", e)),
            None => Err(ToolcribError::Download {
                url: url.to_string(),
                reason: "HTTP status 404".to_string(),
            }),
        }
    }
}

/// A real local cache that counts calls
pub struct CountingCache {
    pub inner: LocalBlobCache,
    restores: AtomicUsize,
    saves: AtomicUsize,
}

impl CountingCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            inner: LocalBlobCache::new(root),
            restores: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn restores(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobCache for CountingCache {
    async fn restore(
        &self,
        paths: &[PathBuf],
        key: &str,
        restore_keys: &[String],
    ) -> ToolcribResult<Option<String>> {
        self.restores.fetch_add(1, Ordering::SeqCst);
        self.inner.restore(paths, key, restore_keys).await
    }

    async fn save(&self, paths: &[PathBuf], key: &str) -> ToolcribResult<CacheId> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(paths, key).await
    }

    async fn discard(&self, key: &str) -> ToolcribResult<()> {
        self.inner.discard(key).await
    }
}

/// Build tool answering `info` from a map and returning fixed exit codes
pub struct MockBuildTool {
    pub info: HashMap<String, String>,
    pub build_code: i32,
    pub test_code: i32,
    pub invocations: Mutex<Vec<Vec<String>>>,
}

impl MockBuildTool {
    pub fn new(exec_root: &str, output_base: &Path) -> Self {
        let mut info = HashMap::new();
        info.insert("execution_root".to_string(), exec_root.to_string());
        info.insert(
            "output_base".to_string(),
            output_base.to_string_lossy().into_owned(),
        );
        Self {
            info,
            build_code: 0,
            test_code: 0,
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn invocations(&self) -> Vec<Vec<String>> {
        self.invocations.lock().unwrap().clone()
    }

    fn record(&self, command: &str, options: &[String], targets: &[String]) {
        let mut call = vec![command.to_string()];
        call.extend(options.iter().cloned());
        call.extend(targets.iter().cloned());
        self.invocations.lock().unwrap().push(call);
    }
}

#[async_trait]
impl BuildTool for MockBuildTool {
    async fn info(&self, key: &str) -> ToolcribResult<String> {
        self.info
            .get(key)
            .cloned()
            .ok_or_else(|| ToolcribError::command_exec(format!("bazel info {key}"), "unknown key"))
    }

    async fn build(&self, options: &[String], targets: &[String]) -> ToolcribResult<i32> {
        self.record("build", options, targets);
        Ok(self.build_code)
    }

    async fn test(&self, options: &[String], targets: &[String]) -> ToolcribResult<i32> {
        self.record("test", options, targets);
        Ok(self.test_code)
    }
}

/// Source control reporting a fixed tree hash
pub struct FixedTree(pub String);

#[async_trait]
impl SourceControl for FixedTree {
    async fn tree_hash(&self) -> ToolcribResult<String> {
        Ok(self.0.clone())
    }
}
