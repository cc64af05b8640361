//! FIFO queue of job ids awaiting the worker.

use std::collections::{HashSet, VecDeque};

use namecast_models::JobId;
use tokio::sync::futures::Notified;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::error::{QueueError, QueueResult};

#[derive(Debug, Default)]
struct QueueState {
    order: VecDeque<JobId>,
    members: HashSet<JobId>,
}

/// Pending job ids in submission order.
///
/// An id appears at most once. Every push wakes the worker; a wake-up sent
/// while nobody is waiting is kept until the next [`JobQueue::notified`].
#[derive(Debug, Default)]
pub struct JobQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id` and wake the worker.
    pub async fn push(&self, id: JobId) -> QueueResult<usize> {
        let len = {
            let mut state = self.state.lock().await;
            if !state.members.insert(id.clone()) {
                return Err(QueueError::AlreadyQueued(id));
            }
            state.order.push_back(id.clone());
            state.order.len()
        };

        debug!(job_id = %id, queue_len = len, "Job enqueued");
        self.notify.notify_one();
        Ok(len)
    }

    /// Take the oldest id, if any.
    pub async fn pop(&self) -> Option<JobId> {
        let mut state = self.state.lock().await;
        let id = state.order.pop_front()?;
        state.members.remove(&id);
        Some(id)
    }

    /// Zero-based position of `id` in the queue.
    pub async fn position(&self, id: &JobId) -> Option<usize> {
        let state = self.state.lock().await;
        if !state.members.contains(id) {
            return None;
        }
        state.order.iter().position(|queued| queued == id)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.order.len()
    }

    /// Resolves after the next push (or immediately if one is pending).
    pub fn notified(&self) -> Notified<'_> {
        self.notify.notified()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn id(s: &str) -> JobId {
        JobId::from_string(s)
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = JobQueue::new();
        for name in ["a", "b", "c"] {
            queue.push(id(name)).await.unwrap();
        }

        assert_eq!(queue.pop().await, Some(id("a")));
        assert_eq!(queue.pop().await, Some(id("b")));
        assert_eq!(queue.pop().await, Some(id("c")));
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn test_duplicate_rejected_until_popped() {
        let queue = JobQueue::new();
        queue.push(id("a")).await.unwrap();

        assert!(matches!(
            queue.push(id("a")).await,
            Err(QueueError::AlreadyQueued(_))
        ));
        assert_eq!(queue.len().await, 1);

        queue.pop().await;
        assert!(queue.push(id("a")).await.is_ok());
    }

    #[tokio::test]
    async fn test_position_tracks_pops() {
        let queue = JobQueue::new();
        queue.push(id("a")).await.unwrap();
        queue.push(id("b")).await.unwrap();

        assert_eq!(queue.position(&id("b")).await, Some(1));
        assert_eq!(queue.position(&id("z")).await, None);

        queue.pop().await;
        assert_eq!(queue.position(&id("a")).await, None);
        assert_eq!(queue.position(&id("b")).await, Some(0));
    }

    #[tokio::test]
    async fn test_push_before_wait_is_not_lost() {
        let queue = JobQueue::new();
        queue.push(id("a")).await.unwrap();

        tokio::time::timeout(Duration::from_millis(100), queue.notified())
            .await
            .expect("pending wake-up should resolve immediately");
    }
}
