//! Text-to-speech provider client.
//!
//! This crate provides the voice synthesis seam used by the render pipeline
//! and an ElevenLabs implementation of it. Tuning knobs (stability,
//! similarity, style) are passed through to the provider unmodified.

pub mod client;
pub mod error;
pub mod types;

pub use client::{ElevenLabsClient, VoiceConfig};
pub use error::{VoiceError, VoiceResult};
pub use types::{SynthesisRequest, VoiceSettings};

use async_trait::async_trait;

/// Turns text into an encoded audio payload.
#[async_trait]
pub trait VoiceSynthesizer: Send + Sync {
    /// Synthesize `request.text`, returning the raw audio bytes.
    async fn synthesize(&self, request: &SynthesisRequest) -> VoiceResult<Vec<u8>>;

    /// File extension of the audio this synthesizer returns.
    fn audio_extension(&self) -> &str {
        "mp3"
    }
}
