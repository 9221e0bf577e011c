//! Shared job result store.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use reelfit_models::{Job, JobId, JobStatusSnapshot};

use crate::error::WorkerResult;

/// Concurrency-safe map of jobs, owned by one scheduler.
///
/// Each entry is written only by the worker running that job; any number
/// of readers may take snapshots at the same time.
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, job: Job) {
        self.jobs.write().await.insert(job.id.clone(), job);
    }

    /// Apply `update` to the stored job, returning its result.
    ///
    /// Returns `None` when the job is not (or no longer) stored.
    pub async fn update<T>(
        &self,
        id: &JobId,
        update: impl FnOnce(&mut Job) -> WorkerResult<T>,
    ) -> Option<WorkerResult<T>> {
        let mut jobs = self.jobs.write().await;
        jobs.get_mut(id).map(update)
    }

    pub async fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.read().await.get(id).cloned()
    }

    pub async fn snapshot(&self, id: &JobId) -> Option<JobStatusSnapshot> {
        self.jobs.read().await.get(id).map(JobStatusSnapshot::from)
    }

    /// Snapshots of every stored job, oldest first.
    pub async fn snapshots(&self) -> Vec<JobStatusSnapshot> {
        let jobs = self.jobs.read().await;
        let mut ordered: Vec<&Job> = jobs.values().collect();
        ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.as_str().cmp(b.id.as_str())));
        ordered.into_iter().map(JobStatusSnapshot::from).collect()
    }

    /// Remove every job in a terminal state, returning their ids.
    pub async fn clear_terminal(&self) -> Vec<JobId> {
        let mut jobs = self.jobs.write().await;
        let terminal: Vec<JobId> = jobs
            .values()
            .filter(|job| job.status.is_terminal())
            .map(|job| job.id.clone())
            .collect();
        for id in &terminal {
            jobs.remove(id);
        }
        terminal
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelfit_models::{JobInputs, JobStatus, SelectionCriteria};

    fn job() -> Job {
        Job::new(
            JobInputs::Files { paths: vec![] },
            SelectionCriteria::new(10.0),
            "/tmp/out.mp4",
        )
    }

    #[tokio::test]
    async fn test_update_and_clear_terminal() {
        let store = JobStore::new();
        let done = job();
        let waiting = job();
        let (done_id, waiting_id) = (done.id.clone(), waiting.id.clone());
        store.insert(done).await;
        store.insert(waiting).await;

        store
            .update(&done_id, |job| {
                job.start()?;
                job.complete(None)?;
                Ok(())
            })
            .await
            .unwrap()
            .unwrap();

        // Status never regresses
        let regress = store
            .update(&done_id, |job| Ok(job.start()?))
            .await
            .unwrap();
        assert!(regress.is_err());
        assert_eq!(store.snapshot(&done_id).await.unwrap().status, JobStatus::Completed);

        let cleared = store.clear_terminal().await;
        assert_eq!(cleared, vec![done_id.clone()]);
        assert!(store.get(&done_id).await.is_none());
        assert_eq!(store.snapshots().await.len(), 1);
        assert_eq!(store.snapshot(&waiting_id).await.unwrap().status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_update_missing_job() {
        let store = JobStore::new();
        assert!(store.update(&JobId::new(), |_| Ok(())).await.is_none());
        assert!(store.is_empty().await);
    }
}
