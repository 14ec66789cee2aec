//! Test log collection

use crate::error::{ToolcribError, ToolcribResult};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Copy every regular file below `source` into `dest`, keeping relative paths
///
/// Returns the relative paths copied. A missing `source` yields no files.
pub async fn collect_test_logs(source: &Path, dest: &Path) -> ToolcribResult<Vec<PathBuf>> {
    let source = source.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || copy_tree(&source, &dest))
        .await
        .map_err(|e| ToolcribError::Internal(format!("test log copy task failed: {}", e)))?
}

fn copy_tree(source: &Path, dest: &Path) -> ToolcribResult<Vec<PathBuf>> {
    if !source.is_dir() {
        return Ok(Vec::new());
    }

    let mut copied = Vec::new();
    for entry in WalkDir::new(source).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            ToolcribError::io(
                format!("walking {}", source.display()),
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| ToolcribError::Internal(e.to_string()))?
            .to_path_buf();
        let target = dest.join(&relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ToolcribError::io(format!("creating {}", parent.display()), e))?;
        }
        std::fs::copy(entry.path(), &target)
            .map_err(|e| ToolcribError::io(format!("copying {}", entry.path().display()), e))?;
        copied.push(relative);
    }

    Ok(copied)
}
