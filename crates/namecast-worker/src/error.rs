//! Worker error types.

use std::path::Path;
use std::time::Duration;

use namecast_media::MediaError;
use namecast_models::{PipelineStage, ValidationError};
use namecast_queue::QueueError;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// A failure that aborts one job.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("BundleFailure: {0}")]
    Bundle(String),

    #[error("SynthesisFailure: {0}")]
    Synthesis(String),

    #[error("ConversionFailure: {0}")]
    Conversion(String),

    #[error("RenderFailure: {0}")]
    Render(String),

    #[error(
        "CompositionNotFound: '{requested}' is not among the compiled compositions (available: {})",
        available.join(", ")
    )]
    CompositionNotFound {
        requested: String,
        available: Vec<String>,
    },

    #[error("ConcatenationFailure: {0}")]
    Concatenation(String),

    #[error("UploadFailure: {0}")]
    Upload(String),

    #[error("Timeout: stage exceeded {}", format_limit(*limit))]
    Timeout { stage: PipelineStage, limit: Duration },

    #[error("ScratchFailure: {message}")]
    Scratch {
        stage: PipelineStage,
        message: String,
    },

    #[error("InternalError: {message}")]
    Internal {
        stage: PipelineStage,
        message: String,
    },
}

impl PipelineError {
    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    pub fn upload(msg: impl Into<String>) -> Self {
        Self::Upload(msg.into())
    }

    pub fn scratch(stage: PipelineStage, err: impl std::fmt::Display) -> Self {
        Self::Scratch {
            stage,
            message: err.to_string(),
        }
    }

    pub fn internal(stage: PipelineStage, err: impl std::fmt::Display) -> Self {
        Self::Internal {
            stage,
            message: err.to_string(),
        }
    }

    /// Classify a render engine error.
    pub fn from_render(err: MediaError) -> Self {
        match err {
            MediaError::CompositionNotFound {
                requested,
                available,
            } => Self::CompositionNotFound {
                requested,
                available,
            },
            MediaError::BundleFailed(msg) => Self::Bundle(msg),
            other => Self::Render(with_stderr(&other)),
        }
    }

    /// Classify an audio conversion error.
    pub fn from_conversion(err: MediaError) -> Self {
        Self::Conversion(with_stderr(&err))
    }

    /// Classify a segment concatenation error.
    pub fn from_concat(err: MediaError) -> Self {
        Self::Concatenation(with_stderr(&err))
    }

    /// Pipeline stage the failure belongs to.
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::Bundle(_) => PipelineStage::Bundle,
            PipelineError::Synthesis(_) => PipelineStage::Synthesis,
            PipelineError::Conversion(_) => PipelineStage::Conversion,
            PipelineError::Render(_) | PipelineError::CompositionNotFound { .. } => {
                PipelineStage::Render
            }
            PipelineError::Concatenation(_) => PipelineStage::Concatenation,
            PipelineError::Upload(_) => PipelineStage::Upload,
            PipelineError::Timeout { stage, .. }
            | PipelineError::Scratch { stage, .. }
            | PipelineError::Internal { stage, .. } => *stage,
        }
    }

    /// Client-facing detail: `"<stage>: <message>"` with the scratch and
    /// output directories replaced so local paths do not leak.
    pub fn detail(&self, scratch_root: &Path, output_root: &Path) -> String {
        let detail = format!("{}: {}", self.stage(), self);
        redact_paths(&detail, &[(scratch_root, "<scratch>"), (output_root, "<output>")])
    }
}

fn format_limit(limit: Duration) -> String {
    if limit.subsec_millis() == 0 {
        format!("{} seconds", limit.as_secs())
    } else {
        format!("{} ms", limit.as_millis())
    }
}

fn with_stderr(err: &MediaError) -> String {
    match err.stderr().filter(|s| !s.is_empty()) {
        Some(stderr) => format!("{err}: {stderr}"),
        None => err.to_string(),
    }
}

/// Longest root first, so a root that prefixes another cannot mangle it.
fn redact_paths(text: &str, roots: &[(&Path, &str)]) -> String {
    let mut roots: Vec<(String, &str)> = roots
        .iter()
        .map(|(root, label)| (root.to_string_lossy().trim_end_matches('/').to_string(), *label))
        .filter(|(root, _)| !root.is_empty())
        .collect();
    roots.sort_by_key(|(root, _)| std::cmp::Reverse(root.len()));

    roots
        .iter()
        .fold(text.to_string(), |acc, (root, label)| acc.replace(root.as_str(), label))
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced synchronously by the render service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_names_stage() {
        let err = PipelineError::synthesis("Voice provider returned 500: boom");
        let detail = err.detail(Path::new("/tmp/namecast"), Path::new("/srv/renders"));
        assert!(detail.starts_with("synthesis: SynthesisFailure"));
        assert!(detail.contains("boom"));
    }

    #[test]
    fn test_detail_redacts_scratch_paths() {
        let err = PipelineError::scratch(
            PipelineStage::Synthesis,
            "failed to write /tmp/namecast/job-1/job-1.mp3",
        );
        let detail = err.detail(Path::new("/tmp/namecast/"), Path::new("/srv/renders"));
        assert!(!detail.contains("/tmp/namecast"));
        assert!(detail.contains("<scratch>/job-1/job-1.mp3"));
    }

    #[test]
    fn test_composition_not_found_mapping() {
        let err = PipelineError::from_render(MediaError::CompositionNotFound {
            requested: "natal".into(),
            available: vec!["noel".into(), "intro".into()],
        });
        assert_eq!(err.stage(), PipelineStage::Render);
        let detail = err.detail(Path::new("/w"), Path::new("/out"));
        assert!(detail.contains("CompositionNotFound"));
        assert!(detail.contains("noel, intro"));
    }

    #[test]
    fn test_render_failure_keeps_stderr() {
        let err = PipelineError::from_render(MediaError::render_failed(
            "Remotion render failed (exit code 1)",
            Some("Error: could not decode asset".into()),
        ));
        assert!(err.to_string().contains("could not decode asset"));
    }

    #[test]
    fn test_timeout_stage() {
        let err = PipelineError::Timeout {
            stage: PipelineStage::Upload,
            limit: Duration::from_secs(300),
        };
        assert_eq!(err.stage(), PipelineStage::Upload);
        assert_eq!(
            err.detail(Path::new("/w"), Path::new("/out")),
            "upload: Timeout: stage exceeded 300 seconds"
        );
    }

    #[test]
    fn test_timeout_keeps_sub_second_limits() {
        let err = PipelineError::Timeout {
            stage: PipelineStage::Render,
            limit: Duration::from_millis(250),
        };
        assert!(err.to_string().ends_with("250 ms"));
    }

    #[test]
    fn test_detail_redacts_output_paths() {
        let err = PipelineError::upload(
            "local fallback failed: No such file: /tmp/namecast-renders/job-1.mp4",
        );
        let detail = err.detail(Path::new("/tmp/namecast"), Path::new("/tmp/namecast-renders"));
        assert!(!detail.contains("/tmp/"));
        assert!(detail.contains("<output>/job-1.mp4"));
    }
}
