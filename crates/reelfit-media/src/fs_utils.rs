//! Filesystem helpers for placing stage outputs.

use std::path::Path;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Create the parent directory of `path` if it does not exist yet.
pub async fn ensure_parent_dir(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Move a file from `src` to `dst`, falling back to copy-and-delete when
/// the two paths live on different filesystems (EXDEV).
///
/// Job workspaces usually sit on a scratch volume while outputs go to the
/// caller's directory, so the fallback is the common case in containers.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    ensure_parent_dir(dst).await?;

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                src = %src.display(),
                dst = %dst.display(),
                "Cross-device rename, copying instead"
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Remove a file, ignoring "not found".
pub async fn remove_if_exists(path: &Path) -> MediaResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    // Copy next to dst first so the final rename stays on one filesystem
    let tmp_dst = dst.with_extension("partial");

    fs::copy(src, &tmp_dst).await?;

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(src = %src.display(), "Failed to remove source after copy: {}", e);
    }

    Ok(())
}
