//! Job lifecycle status and pipeline stage markers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Render job lifecycle status.
///
/// Transitions only move forward:
/// `queued -> processing -> uploading -> done`, or `queued -> processing -> error`.
/// `error` is also reachable from `uploading` when the upload itself is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting in the queue
    #[default]
    Queued,
    /// Voice synthesis or rendering is in progress
    Processing,
    /// Final artifact is being published
    Uploading,
    /// Artifact is available at the job's URL
    Done,
    /// Job failed; see the error detail
    Error,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Uploading => "uploading",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    /// Check if a job in this state is occupying the worker.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Processing | JobStatus::Uploading)
    }

    /// Whether moving from `self` to `next` is a legal forward transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Processing)
                | (Processing, Uploading)
                | (Processing, Error)
                | (Uploading, Done)
                | (Uploading, Error)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Step of the render pipeline a job is currently in.
///
/// Reported through the status endpoint while a job is `processing` or
/// `uploading`, and used to prefix error details so clients can tell
/// failure causes apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Compiling (or reusing) the render bundle
    Bundle,
    /// Text-to-speech request
    Synthesis,
    /// Audio re-encoding through FFmpeg
    Conversion,
    /// Composition rendering
    Render,
    /// Joining intro, dynamic and outro segments
    Concatenation,
    /// Publishing the final artifact
    Upload,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Bundle => "bundle",
            PipelineStage::Synthesis => "synthesis",
            PipelineStage::Conversion => "conversion",
            PipelineStage::Render => "render",
            PipelineStage::Concatenation => "concatenation",
            PipelineStage::Upload => "upload",
        }
    }

    /// Human-readable description shown as the job's current step.
    pub fn description(&self) -> &'static str {
        match self {
            PipelineStage::Bundle => "Preparing render bundle",
            PipelineStage::Synthesis => "Synthesizing voice",
            PipelineStage::Conversion => "Converting audio",
            PipelineStage::Render => "Rendering video",
            PipelineStage::Concatenation => "Joining video segments",
            PipelineStage::Upload => "Uploading video",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Uploading));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Error));
        assert!(JobStatus::Uploading.can_transition_to(JobStatus::Done));
    }

    #[test]
    fn test_backward_and_skipping_transitions_rejected() {
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Queued));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Done));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Uploading));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Done));
        assert!(!JobStatus::Done.can_transition_to(JobStatus::Error));
        assert!(!JobStatus::Error.can_transition_to(JobStatus::Processing));
    }

    #[test]
    fn test_terminal_and_active() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(!JobStatus::Uploading.is_terminal());
        assert!(JobStatus::Uploading.is_active());
        assert!(!JobStatus::Queued.is_active());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::Uploading).unwrap();
        assert_eq!(json, "\"uploading\"");
        let stage = serde_json::to_string(&PipelineStage::Concatenation).unwrap();
        assert_eq!(stage, "\"concatenation\"");
    }
}
