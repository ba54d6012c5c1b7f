//! Filesystem helpers for atomic artifact placement.
//!
//! Artifacts are written to a temporary path and renamed into place so a
//! crash mid-stage never leaves a half-written file visible to a later
//! idempotency check.

use std::path::Path;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Write `bytes` to `dst` atomically (temp file in the same directory,
/// then rename).
pub async fn write_atomic(dst: impl AsRef<Path>, bytes: &[u8]) -> MediaResult<()> {
    let dst = dst.as_ref();
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    let tmp = dst.with_extension("tmp");
    fs::write(&tmp, bytes).await?;
    if let Err(e) = fs::rename(&tmp, dst).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(MediaError::from(e));
    }
    Ok(())
}

/// Move a file into place, tolerating cross-device boundaries.
///
/// Tries a rename first; on EXDEV falls back to copying to a temp file
/// beside the destination and renaming, so the destination only ever
/// appears complete.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            let tmp = dst.with_extension("tmp");
            fs::copy(src, &tmp).await?;
            if let Err(e) = fs::rename(&tmp, dst).await {
                let _ = fs::remove_file(&tmp).await;
                return Err(MediaError::from(e));
            }
            if let Err(e) = fs::remove_file(src).await {
                tracing::warn!(
                    "Failed to remove source after cross-device move: {}: {}",
                    src.display(),
                    e
                );
            }
            Ok(())
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// EXDEV is error code 18 on Linux/macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}
