//! Gzip-compressed tarball extraction

use crate::error::{ToolcribError, ToolcribResult};
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::Path;
use tar::Archive;
use tracing::debug;

/// Extract the tarball at `archive` into `dest`
///
/// `tar` refuses members that would escape `dest`.
pub async fn extract_tar_gz(archive: &Path, dest: &Path) -> ToolcribResult<()> {
    debug!("Extracting {} into {}", archive.display(), dest.display());

    let src = archive.to_path_buf();
    let out = dest.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        std::fs::create_dir_all(&out)?;
        let file = File::open(&src)?;
        let mut archive = Archive::new(GzDecoder::new(file));
        archive.set_preserve_permissions(true);
        archive.unpack(&out)
    })
    .await
    .map_err(|e| ToolcribError::Internal(format!("extraction task failed: {}", e)))?
    .map_err(|e| ToolcribError::io(format!("extracting {}", archive.display()), e))
}
