//! Per-job scratch directories.

use std::path::{Path, PathBuf};

use namecast_models::JobId;
use tracing::{debug, warn};

/// Directory holding one job's intermediate files.
///
/// [`ScratchDir::cleanup`] removes it; if the value is dropped without
/// cleanup (a panicking pipeline), `Drop` removes it synchronously.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    cleaned: bool,
}

impl ScratchDir {
    /// Create `<root>/<job_id>/`.
    pub async fn create(root: &Path, job_id: &JobId) -> std::io::Result<Self> {
        let path = root.join(job_id.as_str());
        tokio::fs::create_dir_all(&path).await?;
        debug!(path = %path.display(), "Scratch directory created");
        Ok(Self {
            path,
            cleaned: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of `file_name` inside the directory.
    pub fn file(&self, file_name: &str) -> PathBuf {
        self.path.join(file_name)
    }

    /// Remove the directory and everything in it.
    pub async fn cleanup(mut self) {
        self.cleaned = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "Scratch directory removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "Failed to remove scratch directory: {}", e),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.cleaned {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}
