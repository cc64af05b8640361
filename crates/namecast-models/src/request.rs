//! Submission request validation and API response shapes.
//!
//! Wire types use camelCase field names so existing clients
//! (`{ "name": ..., "photoUrl": ... }` in, `{ "jobId": ... }` out) keep working.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::{JobStatus, PipelineStage, RenderJob};

/// Default bound on the personalization name, in characters.
pub const DEFAULT_MAX_NAME_CHARS: usize = 40;

/// Maximum accepted photo URL length.
const MAX_PHOTO_URL_LENGTH: usize = 2048;

/// Why a submission was rejected before a job was created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name is required")]
    MissingName,

    #[error("name must not be empty")]
    EmptyName,

    #[error("photoUrl is invalid: {0}")]
    InvalidPhotoUrl(String),
}

/// Raw submission body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub photo_url: Option<String>,
}

/// Submission that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRenderRequest {
    /// Trimmed and truncated to the configured bound
    pub name: String,
    /// `None` when absent or blank
    pub photo_url: Option<String>,
}

impl RenderRequest {
    /// Validate the request, normalizing the name and photo reference.
    pub fn validate(&self, max_name_chars: usize) -> Result<ValidRenderRequest, ValidationError> {
        let raw = self.name.as_deref().ok_or(ValidationError::MissingName)?;

        let name = normalize_name(raw, max_name_chars);
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        let photo_url = match self.photo_url.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(url) => Some(validate_photo_url(url)?),
        };

        Ok(ValidRenderRequest { name, photo_url })
    }
}

/// Trim, drop control characters and truncate to `max_chars`.
fn normalize_name(raw: &str, max_chars: usize) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(max_chars)
        .collect();
    cleaned.trim_end().to_string()
}

fn validate_photo_url(url: &str) -> Result<String, ValidationError> {
    if url.len() > MAX_PHOTO_URL_LENGTH {
        return Err(ValidationError::InvalidPhotoUrl(format!(
            "exceeds {} characters",
            MAX_PHOTO_URL_LENGTH
        )));
    }

    let parsed = Url::parse(url).map_err(|e| ValidationError::InvalidPhotoUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        scheme => Err(ValidationError::InvalidPhotoUrl(format!(
            "unsupported scheme '{}'",
            scheme
        ))),
    }
}

/// Response to a successful submission.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
}

/// Job status as returned by the polling endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub id: String,
    pub status: JobStatus,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<PipelineStage>,
    /// Jobs ahead of this one while it is still `queued`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl JobStatusResponse {
    pub fn with_queue_position(mut self, position: Option<usize>) -> Self {
        self.queue_position = position;
        self
    }
}

impl From<&RenderJob> for JobStatusResponse {
    fn from(job: &RenderJob) -> Self {
        Self {
            id: job.id.to_string(),
            status: job.status,
            name: job.input_name.clone(),
            photo_url: job.input_photo_ref.clone(),
            current_step: job.current_step,
            queue_position: None,
            output_url: job.artifact_url.clone(),
            error: job.error_detail.clone(),
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
            started_at: job.started_at.map(|t| t.to_rfc3339()),
            finished_at: job.finished_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: Option<&str>, photo: Option<&str>) -> RenderRequest {
        RenderRequest {
            name: name.map(String::from),
            photo_url: photo.map(String::from),
        }
    }

    #[test]
    fn test_valid_request_is_trimmed() {
        let valid = request(Some("  Ana  "), None).validate(40).unwrap();
        assert_eq!(valid.name, "Ana");
        assert_eq!(valid.photo_url, None);
    }

    #[test]
    fn test_missing_and_blank_names_rejected() {
        assert_eq!(
            request(None, None).validate(40),
            Err(ValidationError::MissingName)
        );
        assert_eq!(
            request(Some(""), None).validate(40),
            Err(ValidationError::EmptyName)
        );
        assert_eq!(
            request(Some("   \t "), None).validate(40),
            Err(ValidationError::EmptyName)
        );
    }

    #[test]
    fn test_long_name_truncated_by_chars() {
        let long = "João".repeat(20);
        let valid = request(Some(&long), None).validate(10).unwrap();
        assert_eq!(valid.name.chars().count(), 10);
        assert!(valid.name.starts_with("JoãoJoão"));
    }

    #[test]
    fn test_photo_url_validation() {
        let valid = request(Some("Ana"), Some("https://example.com/a.jpg"))
            .validate(40)
            .unwrap();
        assert_eq!(valid.photo_url.as_deref(), Some("https://example.com/a.jpg"));

        let blank = request(Some("Ana"), Some("  ")).validate(40).unwrap();
        assert_eq!(blank.photo_url, None);

        assert!(matches!(
            request(Some("Ana"), Some("ftp://example.com/a.jpg")).validate(40),
            Err(ValidationError::InvalidPhotoUrl(_))
        ));
        assert!(matches!(
            request(Some("Ana"), Some("not a url")).validate(40),
            Err(ValidationError::InvalidPhotoUrl(_))
        ));
    }

    #[test]
    fn test_request_accepts_camel_case() {
        let req: RenderRequest =
            serde_json::from_str(r#"{"name":"Ana","photoUrl":"https://x.io/p.png"}"#).unwrap();
        assert_eq!(req.photo_url.as_deref(), Some("https://x.io/p.png"));
    }

    #[test]
    fn test_status_response_from_job() {
        let mut job = RenderJob::new("Ana", None);
        job.start().unwrap();
        job.fail("render: composition crashed").unwrap();

        let response = JobStatusResponse::from(&job);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "render: composition crashed");
        assert!(json.get("outputUrl").is_none());
        assert!(json.get("finishedAt").is_some());
        assert!(json.get("queuePosition").is_none());
    }

    #[test]
    fn test_status_response_queue_position() {
        let job = RenderJob::new("Ana", None);
        let response = JobStatusResponse::from(&job).with_queue_position(Some(2));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["queuePosition"], 2);
    }
}
