//! Filesystem helpers.
//!
//! Scratch space and the local artifact directory may live on different
//! filesystems, so moving a finished render must survive EXDEV.

use std::path::Path;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Move a file from `src` to `dst`, creating the destination directory.
///
/// Tries a rename first and falls back to copy-then-delete across devices.
/// The copy lands in a sibling temp file and is renamed into place so readers
/// of `dst` never see a partial file.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if !fs::try_exists(src).await.unwrap_or(false) {
        return Err(MediaError::FileNotFound(src.to_path_buf()));
    }

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                src = %src.display(),
                dst = %dst.display(),
                "Cross-device move, copying"
            );
            let partial = dst.with_extension("partial");
            if let Err(e) = fs::copy(src, &partial).await {
                let _ = fs::remove_file(&partial).await;
                return Err(e.into());
            }
            fs::rename(&partial, dst).await?;
            if let Err(e) = fs::remove_file(src).await {
                tracing::warn!(src = %src.display(), "Failed to remove source after copy: {}", e);
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_into_new_directory() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("job.mp4");
        let dst = dir.path().join("renders").join("job.mp4");
        fs::write(&src, b"video").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"video");
    }

    #[tokio::test]
    async fn test_move_overwrites_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("new.mp4");
        let dst = dir.path().join("old.mp4");
        fs::write(&src, b"new").await.unwrap();
        fs::write(&dst, b"old").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert_eq!(fs::read(&dst).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = move_file(dir.path().join("nope"), dir.path().join("dst"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[test]
    fn test_is_cross_device_error() {
        assert!(is_cross_device_error(&std::io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device_error(&std::io::Error::from_raw_os_error(2)));
    }
}
