//! Shared data models for the Namecast render service.
//!
//! This crate provides Serde-serializable types for:
//! - Render jobs and their lifecycle state machine
//! - Pipeline stages reported while a job is processing
//! - Submission request validation and API response shapes
//! - The spoken line template used for voice synthesis

pub mod job;
pub mod job_status;
pub mod request;
pub mod script;

// Re-export common types
pub use job::{JobId, RenderJob, TransitionError};
pub use job_status::{JobStatus, PipelineStage};
pub use request::{
    JobStatusResponse, RenderRequest, SubmitResponse, ValidRenderRequest, ValidationError,
    DEFAULT_MAX_NAME_CHARS,
};
pub use script::{spoken_line, FALLBACK_ADDRESSEE};
