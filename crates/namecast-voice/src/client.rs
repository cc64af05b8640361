//! ElevenLabs HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{VoiceError, VoiceResult};
use crate::types::{SynthesisRequest, TtsBody, VoiceSettings};
use crate::VoiceSynthesizer;

/// Configuration for the ElevenLabs client.
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// API base URL
    pub base_url: String,
    /// API key; synthesis fails with `NotConfigured` when absent
    pub api_key: Option<String>,
    /// Default voice
    pub voice_id: Option<String>,
    /// Synthesis model
    pub model_id: String,
    /// Tuning knobs forwarded with each request
    pub settings: VoiceSettings,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".to_string(),
            api_key: None,
            voice_id: None,
            model_id: "eleven_multilingual_v2".to_string(),
            settings: VoiceSettings::default(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl VoiceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let settings = VoiceSettings {
            stability: env_parse("ELEVENLABS_STABILITY").unwrap_or(defaults.settings.stability),
            similarity_boost: env_parse("ELEVENLABS_SIMILARITY_BOOST")
                .unwrap_or(defaults.settings.similarity_boost),
            style: env_parse("ELEVENLABS_STYLE").unwrap_or(defaults.settings.style),
            use_speaker_boost: env_parse("ELEVENLABS_SPEAKER_BOOST")
                .unwrap_or(defaults.settings.use_speaker_boost),
        };

        Self {
            base_url: std::env::var("ELEVENLABS_BASE_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("ELEVENLABS_API_KEY").ok().filter(|v| !v.is_empty()),
            voice_id: std::env::var("ELEVENLABS_VOICE_ID").ok().filter(|v| !v.is_empty()),
            model_id: std::env::var("ELEVENLABS_MODEL_ID").unwrap_or(defaults.model_id),
            settings,
            timeout: Duration::from_secs(env_parse("TTS_TIMEOUT_SECS").unwrap_or(60)),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Client for the ElevenLabs text-to-speech API.
pub struct ElevenLabsClient {
    http: Client,
    config: VoiceConfig,
}

impl ElevenLabsClient {
    /// Create a new client.
    pub fn new(config: VoiceConfig) -> VoiceResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(VoiceError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> VoiceResult<Self> {
        Self::new(VoiceConfig::from_env())
    }

    /// Whether an API key and default voice are present.
    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some() && self.config.voice_id.is_some()
    }
}

#[async_trait]
impl VoiceSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, request: &SynthesisRequest) -> VoiceResult<Vec<u8>> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| VoiceError::NotConfigured("ELEVENLABS_API_KEY not set".into()))?;
        let voice_id = request
            .voice_id
            .as_deref()
            .or(self.config.voice_id.as_deref())
            .ok_or_else(|| VoiceError::NotConfigured("ELEVENLABS_VOICE_ID not set".into()))?;

        let url = format!(
            "{}/v1/text-to-speech/{}",
            self.config.base_url.trim_end_matches('/'),
            voice_id
        );
        let body = TtsBody {
            text: &request.text,
            model_id: &self.config.model_id,
            voice_settings: &self.config.settings,
        };

        debug!(voice_id = %voice_id, chars = request.text.chars().count(), "Sending TTS request");

        let response = self
            .http
            .post(&url)
            .header("xi-api-key", api_key)
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "TTS provider rejected request");
            return Err(VoiceError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if audio.is_empty() {
            return Err(VoiceError::EmptyAudio);
        }

        Ok(audio.to_vec())
    }
}

impl ElevenLabsClient {
    fn map_transport_error(&self, e: reqwest::Error) -> VoiceError {
        if e.is_timeout() {
            VoiceError::Timeout(self.config.timeout.as_secs())
        } else {
            VoiceError::Network(e)
        }
    }
}
