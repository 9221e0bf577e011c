//! Per-job scratch directories.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

use reelfit_models::JobId;

use crate::error::WorkerResult;

/// Scratch directory owned by exactly one running job.
///
/// Created under the configured work directory with a unique name, and
/// removed with everything in it when dropped.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: TempDir,
}

impl JobWorkspace {
    pub async fn create(root: &Path, job_id: &JobId) -> WorkerResult<Self> {
        tokio::fs::create_dir_all(root).await?;
        let prefix = format!("job-{}-", job_id);
        let root = root.to_path_buf();
        let dir = tokio::task::spawn_blocking(move || tempfile::Builder::new().prefix(&prefix).tempdir_in(&root))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

        debug!(job_id = %job_id, path = %dir.path().display(), "Created job workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Directory for downloaded source clips.
    pub fn downloads(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }

    /// Remove the workspace now, logging rather than failing on error.
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!(path = %path.display(), error = %e, "Failed to remove job workspace");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_workspaces_are_exclusive_and_removed() {
        let root = TempDir::new().unwrap();
        let job_id = JobId::from_string("same-job");

        let a = JobWorkspace::create(root.path(), &job_id).await.unwrap();
        let b = JobWorkspace::create(root.path(), &job_id).await.unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(root.path()));

        tokio::fs::write(a.path().join("clip.mp4"), b"x").await.unwrap();
        let a_path = a.path().to_path_buf();
        a.cleanup();
        assert!(!a_path.exists());

        let b_path = b.path().to_path_buf();
        drop(b);
        assert!(!b_path.exists());
    }
}
