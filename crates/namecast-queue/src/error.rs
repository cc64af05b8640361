//! Queue error types.

use namecast_models::{JobId, TransitionError};
use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Job already exists: {0}")]
    DuplicateJob(JobId),

    #[error("Job already queued: {0}")]
    AlreadyQueued(JobId),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}
