//! Voice provider request types.

use serde::{Deserialize, Serialize};

/// Provider tuning knobs, forwarded as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.6,
            similarity_boost: 0.8,
            style: 0.4,
            use_speaker_boost: true,
        }
    }
}

/// One synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    /// Text to speak
    pub text: String,
    /// Voice/style identifier; the client default is used when `None`
    pub voice_id: Option<String>,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_id: None,
        }
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = Some(voice_id.into());
        self
    }
}

/// JSON body of the text-to-speech endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct TtsBody<'a> {
    pub text: &'a str,
    pub model_id: &'a str,
    pub voice_settings: &'a VoiceSettings,
}
