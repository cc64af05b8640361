//! Render job record and its state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::{JobStatus, PipelineStage};

/// Unique identifier for a render job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Illegal job transition {from} -> {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// One end-to-end personalization request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderJob {
    /// Unique job ID, immutable after submission
    pub id: JobId,

    /// Personalization name (trimmed, bounded length)
    pub input_name: String,

    /// Photo URL; `None` means the composition's placeholder is used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_photo_ref: Option<String>,

    /// Lifecycle status
    pub status: JobStatus,

    /// Pipeline stage while the job is active
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<PipelineStage>,

    /// Public URL of the final video, set on `done`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,

    /// Failure cause, set on `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Refreshed on every status transition
    pub updated_at: DateTime<Utc>,

    /// When the worker picked the job up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RenderJob {
    /// Create a new queued job.
    pub fn new(input_name: impl Into<String>, input_photo_ref: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            input_name: input_name.into(),
            input_photo_ref,
            status: JobStatus::Queued,
            current_step: None,
            artifact_url: None,
            error_detail: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `next`, refusing anything but a forward transition.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        self.status = next;
        self.updated_at = now;

        match next {
            JobStatus::Processing => self.started_at = Some(now),
            JobStatus::Done | JobStatus::Error => {
                self.finished_at = Some(now);
                self.current_step = None;
            }
            _ => {}
        }

        Ok(())
    }

    /// Mark the job as picked up by the worker.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Processing)
    }

    /// Record the stage the pipeline just entered.
    ///
    /// Entering the upload stage also moves the job to `uploading`.
    pub fn enter_stage(&mut self, stage: PipelineStage) -> Result<(), TransitionError> {
        if stage == PipelineStage::Upload && self.status == JobStatus::Processing {
            self.transition(JobStatus::Uploading)?;
        } else if !self.status.is_active() {
            return Err(TransitionError {
                from: self.status,
                to: JobStatus::Processing,
            });
        }
        self.current_step = Some(stage);
        Ok(())
    }

    /// Mark the job as done with its artifact URL.
    pub fn complete(&mut self, artifact_url: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Done)?;
        self.artifact_url = Some(artifact_url.into());
        Ok(())
    }

    /// Mark the job as failed.
    pub fn fail(&mut self, detail: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Error)?;
        self.error_detail = Some(detail.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_queued() {
        let job = RenderJob::new("Ana", None);
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.started_at.is_none());
        assert!(job.artifact_url.is_none());
        assert_eq!(job.created_at, job.updated_at);
    }

    #[test]
    fn test_happy_path_sets_artifact_only_on_done() {
        let mut job = RenderJob::new("Ana", None);
        job.start().unwrap();
        assert!(job.started_at.is_some());

        job.enter_stage(PipelineStage::Synthesis).unwrap();
        job.enter_stage(PipelineStage::Render).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.current_step, Some(PipelineStage::Render));

        job.enter_stage(PipelineStage::Upload).unwrap();
        assert_eq!(job.status, JobStatus::Uploading);
        assert!(job.artifact_url.is_none());

        job.complete("https://cdn.example.com/renders/x.mp4").unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(
            job.artifact_url.as_deref(),
            Some("https://cdn.example.com/renders/x.mp4")
        );
        assert!(job.finished_at.is_some());
        assert!(job.current_step.is_none());
    }

    #[test]
    fn test_fail_from_processing() {
        let mut job = RenderJob::new("Ana", None);
        job.start().unwrap();
        job.fail("synthesis: provider returned 500").unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert!(job.artifact_url.is_none());
        assert_eq!(
            job.error_detail.as_deref(),
            Some("synthesis: provider returned 500")
        );
    }

    #[test]
    fn test_terminal_jobs_are_immutable() {
        let mut job = RenderJob::new("Ana", None);
        job.start().unwrap();
        job.enter_stage(PipelineStage::Upload).unwrap();
        job.complete("https://a/b.mp4").unwrap();

        let err = job.fail("late failure").unwrap_err();
        assert_eq!(err.from, JobStatus::Done);
        assert!(job.complete("https://other").is_err());
        assert_eq!(job.artifact_url.as_deref(), Some("https://a/b.mp4"));
        assert!(job.error_detail.is_none());
    }

    #[test]
    fn test_cannot_skip_queued_or_processing() {
        let mut job = RenderJob::new("Ana", None);
        assert!(job.complete("https://a/b.mp4").is_err());
        assert!(job.enter_stage(PipelineStage::Render).is_err());
        assert_eq!(job.status, JobStatus::Queued);
    }
}
