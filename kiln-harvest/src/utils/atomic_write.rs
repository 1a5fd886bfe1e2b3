//! Crash-safe file writes
//!
//! Bytes go to a hidden temp file in the destination's directory, are flushed
//! to disk, then renamed over the destination. A reader (or a crash) never
//! observes a truncated file at the final path.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique sibling temp path for `destination`
fn temp_path_for(destination: &Path) -> PathBuf {
    let file_name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let unique = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);

    destination.with_file_name(format!(
        ".{}.{}.{}.part",
        file_name,
        std::process::id(),
        unique
    ))
}

/// Atomically write `bytes` to `destination`, creating parent directories
pub async fn write_atomic(destination: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp_path = temp_path_for(destination);
    let result = async {
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp_path, destination).await
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&temp_path).await;
    }
    result
}
