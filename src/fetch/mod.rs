//! Artifact download and archive extraction

mod extract;

pub use extract::extract_tar_gz;

use crate::error::{ToolcribError, ToolcribResult};
use async_trait::async_trait;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Abstract secure download capability
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `url` to `dest`, replacing any existing file.
    /// Fails on non-2xx responses and transport errors.
    async fn download(&self, url: &str, dest: &Path) -> ToolcribResult<()>;
}

/// HTTPS downloader backed by ureq
#[derive(Clone)]
pub struct HttpDownloader {
    agent: ureq::Agent,
}

impl HttpDownloader {
    /// Create a downloader with default agent settings
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> ToolcribResult<()> {
        debug!("Downloading {} to {}", url, dest.display());

        let agent = self.agent.clone();
        let owned_url = url.to_string();
        let owned_dest = dest.to_path_buf();
        let result = tokio::task::spawn_blocking(move || fetch_to_file(&agent, &owned_url, &owned_dest))
            .await
            .map_err(|e| ToolcribError::Internal(format!("download task failed: {}", e)))?;

        match result {
            Ok(bytes) => {
                debug!("Downloaded {} bytes from {}", bytes, url);
                Ok(())
            }
            Err(reason) => {
                discard_partial(dest).await;
                Err(ToolcribError::Download {
                    url: url.to_string(),
                    reason,
                })
            }
        }
    }
}

fn fetch_to_file(agent: &ureq::Agent, url: &str, dest: &Path) -> Result<u64, String> {
    let response = agent
        .get(url)
        .header("User-Agent", concat!("toolcrib/", env!("CARGO_PKG_VERSION")))
        .call()
        .map_err(|e| e.to_string())?;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }

    let mut reader = response.into_body().into_reader();
    let file = File::create(dest).map_err(|e| format!("creating {}: {}", dest.display(), e))?;
    let mut writer = BufWriter::new(file);
    let bytes = io::copy(&mut reader, &mut writer).map_err(|e| e.to_string())?;
    writer.flush().map_err(|e| e.to_string())?;
    Ok(bytes)
}

async fn discard_partial(dest: &Path) {
    if let Err(e) = tokio::fs::remove_file(dest).await {
        if e.kind() != io::ErrorKind::NotFound {
            debug!("Could not remove partial download {}: {}", dest.display(), e);
        }
    }
}
