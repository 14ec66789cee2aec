//! SHA-256 file digests
//!
//! Files are hashed in fixed-size chunks so arbitrarily large archives and
//! jars never have to fit in memory.

use crate::error::{ToolcribError, ToolcribResult};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the hex-encoded SHA-256 digest of a file
pub async fn digest(path: &Path) -> ToolcribResult<String> {
    let mut file = File::open(path)
        .await
        .map_err(|e| ToolcribError::io(format!("opening {} for hashing", path.display()), e))?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| ToolcribError::io(format!("reading {} for hashing", path.display()), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hash an in-memory value (used for short identifiers such as paths)
pub fn digest_bytes(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

/// Check that the file at `path` has digest `expected`
///
/// The comparison is exact and case-sensitive. `tool` and `version` only
/// label the error.
pub async fn verify(path: &Path, expected: &str, tool: &str, version: &str) -> ToolcribResult<()> {
    let actual = digest(path).await?;
    if actual != expected {
        return Err(ToolcribError::Integrity {
            tool: tool.to_string(),
            version: version.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
