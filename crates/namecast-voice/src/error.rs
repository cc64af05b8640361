//! Voice client error types.

use thiserror::Error;

pub type VoiceResult<T> = Result<T, VoiceError>;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Voice provider not configured: {0}")]
    NotConfigured(String),

    #[error("Voice provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Voice provider returned an empty audio payload")]
    EmptyAudio,

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl VoiceError {
    /// Check if retrying the request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            VoiceError::Provider { status, .. } => *status == 429 || *status >= 500,
            VoiceError::Timeout(_) | VoiceError::Network(_) => true,
            VoiceError::NotConfigured(_) | VoiceError::EmptyAudio => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let server = VoiceError::Provider { status: 503, body: String::new() };
        let limited = VoiceError::Provider { status: 429, body: String::new() };
        let bad = VoiceError::Provider { status: 401, body: "invalid api key".into() };

        assert!(server.is_retryable());
        assert!(limited.is_retryable());
        assert!(!bad.is_retryable());
        assert!(!VoiceError::NotConfigured("x".into()).is_retryable());
    }

    #[test]
    fn test_provider_body_kept_in_message() {
        let err = VoiceError::Provider {
            status: 500,
            body: "{\"detail\":\"quota exceeded\"}".into(),
        };
        assert!(err.to_string().contains("quota exceeded"));
    }
}
