//! Artifact publishing with graceful degradation.
//!
//! Storage is optional for the render service: when credentials are absent
//! the publisher reports [`UploadOutcome::NotConfigured`] and the caller
//! falls back to serving the file locally.

use std::path::Path;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::client::{R2Client, R2Config};
use crate::error::StorageResult;

/// Result of a publish attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Object stored and publicly reachable at `url`.
    Published { url: String },
    /// Storage credentials are absent; nothing was uploaded.
    NotConfigured,
}

impl UploadOutcome {
    /// The public URL, if the object was published.
    pub fn url(&self) -> Option<&str> {
        match self {
            UploadOutcome::Published { url } => Some(url),
            UploadOutcome::NotConfigured => None,
        }
    }
}

/// Publishes local files to object storage.
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    /// Upload `path` under `key`.
    ///
    /// Returns `NotConfigured` instead of an error when storage is disabled.
    async fn upload(&self, path: &Path, key: &str, content_type: &str)
        -> StorageResult<UploadOutcome>;

    /// Whether uploads can actually reach storage.
    fn is_configured(&self) -> bool;
}

/// R2-backed publisher; a no-op when no client is configured.
#[derive(Clone, Default)]
pub struct StoragePublisher {
    client: Option<R2Client>,
}

impl StoragePublisher {
    /// Create a publisher around an optional client.
    pub fn new(client: Option<R2Client>) -> Self {
        Self { client }
    }

    /// Publisher that never uploads.
    pub fn disabled() -> Self {
        Self { client: None }
    }

    /// Create from environment variables, disabling storage when incomplete.
    pub fn from_env() -> Self {
        match R2Config::from_env() {
            Ok(config) => match R2Client::new(config) {
                Ok(client) => {
                    info!("R2 storage configured");
                    Self::new(Some(client))
                }
                Err(e) => {
                    warn!("R2 storage disabled: {}", e);
                    Self::disabled()
                }
            },
            Err(missing) => {
                warn!(missing = ?missing, "R2 storage not configured, artifacts will be served locally");
                Self::disabled()
            }
        }
    }

    /// Underlying client, if configured.
    pub fn client(&self) -> Option<&R2Client> {
        self.client.as_ref()
    }
}

#[async_trait]
impl ArtifactPublisher for StoragePublisher {
    async fn upload(
        &self,
        path: &Path,
        key: &str,
        content_type: &str,
    ) -> StorageResult<UploadOutcome> {
        let Some(client) = &self.client else {
            return Ok(UploadOutcome::NotConfigured);
        };

        client.upload_file(path, key, content_type).await?;
        let url = client.public_url(key);
        info!(key = %key, url = %url, "Artifact published");
        Ok(UploadOutcome::Published { url })
    }

    fn is_configured(&self) -> bool {
        self.client.is_some()
    }
}

/// Object key for a job's synthesized audio.
pub fn audio_key(job_id: &str, extension: &str) -> String {
    format!("audios/{}.{}", job_id, extension)
}

/// Object key for a job's final video.
pub fn video_key(job_id: &str) -> String {
    format!("renders/{}.mp4", job_id)
}
