//! Job registry.

use std::collections::HashMap;

use namecast_models::{JobId, JobStatus, RenderJob, TransitionError};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{QueueError, QueueResult};

/// Registry of every job submitted during the process lifetime.
///
/// Readers get cloned snapshots. Updates run against a copy of the record
/// and replace it only when the mutation succeeds, so a rejected transition
/// leaves the stored record untouched.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, RenderJob>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job.
    pub async fn insert(&self, job: RenderJob) -> QueueResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(QueueError::DuplicateJob(job.id));
        }
        debug!(job_id = %job.id, "Job stored");
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    /// Snapshot of one job.
    pub async fn get(&self, id: &JobId) -> Option<RenderJob> {
        self.jobs.read().await.get(id).cloned()
    }

    /// Apply `f` to a job and store the result, returning `f`'s output.
    pub async fn update<F, R>(&self, id: &JobId, f: F) -> QueueResult<R>
    where
        F: FnOnce(&mut RenderJob) -> Result<R, TransitionError>,
    {
        let mut jobs = self.jobs.write().await;
        let current = jobs
            .get(id)
            .ok_or_else(|| QueueError::JobNotFound(id.clone()))?;

        let mut next = current.clone();
        let out = f(&mut next)?;
        jobs.insert(id.clone(), next);
        Ok(out)
    }

    /// Number of jobs in `status`.
    pub async fn count_by_status(&self, status: JobStatus) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|j| j.status == status)
            .count()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_get_snapshot() {
        let store = JobStore::new();
        let job = RenderJob::new("Ana", None);
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        let snapshot = store.get(&id).await.unwrap();
        assert_eq!(snapshot.input_name, "Ana");
        assert_eq!(snapshot.status, JobStatus::Queued);
        assert!(store.get(&JobId::from_string("missing")).await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = JobStore::new();
        let job = RenderJob::new("Ana", None);
        store.insert(job.clone()).await.unwrap();

        assert!(matches!(
            store.insert(job).await,
            Err(QueueError::DuplicateJob(_))
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_applies_transition() {
        let store = JobStore::new();
        let job = RenderJob::new("Ana", None);
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        store.update(&id, |j| j.start()).await.unwrap();

        let job = store.get(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.started_at.is_some());
        assert_eq!(store.count_by_status(JobStatus::Processing).await, 1);
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_record_untouched() {
        let store = JobStore::new();
        let job = RenderJob::new("Ana", None);
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        let err = store
            .update(&id, |j| {
                j.input_name = "mutated".into();
                j.complete("https://cdn.example.com/x.mp4")
            })
            .await
            .unwrap_err();

        assert!(matches!(err, QueueError::Transition(_)));
        let job = store.get(&id).await.unwrap();
        assert_eq!(job.input_name, "Ana");
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_update_unknown_job() {
        let store = JobStore::new();
        let err = store
            .update(&JobId::from_string("nope"), |j| j.start())
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::JobNotFound(_)));
    }
}
