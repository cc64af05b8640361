//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use namecast_models::{PipelineStage, DEFAULT_MAX_NAME_CHARS};

/// How the final video is assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositionMode {
    /// The composition renders the whole video.
    Single,
    /// The composition renders only the personalized middle; pre-rendered
    /// intro and outro are joined around it.
    Segmented { intro: PathBuf, outro: PathBuf },
}

/// What the composition receives as `audioSrc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioSource {
    /// Base64 data URI of the synthesized audio.
    #[default]
    Inline,
    /// Public URL of the published audio, inline when publishing failed.
    Published,
}

impl std::str::FromStr for AudioSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" | "data" | "data_uri" => Ok(AudioSource::Inline),
            "published" | "url" => Ok(AudioSource::Published),
            other => Err(format!("unknown audio source '{other}'")),
        }
    }
}

/// Wall-clock limit per pipeline stage.
#[derive(Debug, Clone)]
pub struct StageTimeouts {
    pub bundle: Duration,
    pub synthesis: Duration,
    pub conversion: Duration,
    pub render: Duration,
    pub concatenation: Duration,
    /// Applied per upload attempt so retries and the local fallback still run
    pub upload: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            bundle: Duration::from_secs(300),
            synthesis: Duration::from_secs(90),
            conversion: Duration::from_secs(120),
            render: Duration::from_secs(900),
            concatenation: Duration::from_secs(180),
            upload: Duration::from_secs(300),
        }
    }
}

impl StageTimeouts {
    pub fn from_env() -> Self {
        let d = Self::default();
        let secs = |key: &str, default: Duration| {
            env_parse::<u64>(key)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        Self {
            bundle: secs("STAGE_TIMEOUT_BUNDLE_SECS", d.bundle),
            synthesis: secs("STAGE_TIMEOUT_SYNTHESIS_SECS", d.synthesis),
            conversion: secs("STAGE_TIMEOUT_CONVERSION_SECS", d.conversion),
            render: secs("STAGE_TIMEOUT_RENDER_SECS", d.render),
            concatenation: secs("STAGE_TIMEOUT_CONCAT_SECS", d.concatenation),
            upload: secs("STAGE_TIMEOUT_UPLOAD_SECS", d.upload),
        }
    }

    /// Limit for `stage`.
    pub fn for_stage(&self, stage: PipelineStage) -> Duration {
        match stage {
            PipelineStage::Bundle => self.bundle,
            PipelineStage::Synthesis => self.synthesis,
            PipelineStage::Conversion => self.conversion,
            PipelineStage::Render => self.render,
            PipelineStage::Concatenation => self.concatenation,
            PipelineStage::Upload => self.upload,
        }
    }

    /// Hard cap for a single FFmpeg process, which serves both conversion
    /// and concatenation; the stage limits stay the tighter bound.
    pub fn ffmpeg_limit(&self) -> Duration {
        self.conversion.max(self.concatenation)
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root of per-job scratch directories
    pub work_dir: PathBuf,
    /// Where finished videos land when storage is unavailable
    pub output_dir: PathBuf,
    /// Base URL the output directory is served under
    pub local_base_url: String,
    /// Composition rendered for every job
    pub composition_id: String,
    /// Single or segmented rendering
    pub composition_mode: CompositionMode,
    /// Re-encode synthesized audio to this format (e.g. "wav")
    pub audio_target_format: Option<String>,
    /// How the composition receives the audio
    pub audio_source: AudioSource,
    /// Photo used when the request has none; empty lets the composition
    /// fall back to its bundled placeholder
    pub placeholder_photo_url: String,
    /// Names longer than this are truncated
    pub max_name_chars: usize,
    /// Per-stage limits
    pub timeouts: StageTimeouts,
    /// Queue re-check interval when no wake-up arrives
    pub safety_tick: Duration,
    /// How long an in-flight job may run after shutdown is requested
    pub shutdown_timeout: Duration,
    /// Retries for the voice provider (0 = single shot)
    pub tts_max_retries: u32,
    /// Retries for the final upload
    pub upload_max_retries: u32,
    /// Serve the file locally when a configured upload fails
    pub upload_fallback_on_error: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("namecast"),
            output_dir: std::env::temp_dir().join("namecast-renders"),
            local_base_url: "http://localhost:8080/renders".to_string(),
            composition_id: "noel".to_string(),
            composition_mode: CompositionMode::Single,
            audio_target_format: None,
            audio_source: AudioSource::Inline,
            placeholder_photo_url: String::new(),
            max_name_chars: DEFAULT_MAX_NAME_CHARS,
            timeouts: StageTimeouts::default(),
            safety_tick: Duration::from_secs(2),
            shutdown_timeout: Duration::from_secs(60),
            tts_max_retries: 0,
            upload_max_retries: 2,
            upload_fallback_on_error: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();

        let composition_mode = match (
            env_non_empty("SEGMENT_INTRO_PATH"),
            env_non_empty("SEGMENT_OUTRO_PATH"),
        ) {
            (Some(intro), Some(outro)) => CompositionMode::Segmented {
                intro: PathBuf::from(intro),
                outro: PathBuf::from(outro),
            },
            _ => CompositionMode::Single,
        };

        let local_base_url = env_non_empty("PUBLIC_BASE_URL")
            .unwrap_or_else(|| {
                let port = env_non_empty("API_PORT")
                    .or_else(|| env_non_empty("PORT"))
                    .unwrap_or_else(|| "8080".to_string());
                format!("http://localhost:{port}")
            });

        Self {
            work_dir: env_non_empty("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.work_dir),
            output_dir: env_non_empty("WORKER_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.output_dir),
            local_base_url: format!("{}/renders", local_base_url.trim_end_matches('/')),
            composition_id: env_non_empty("RENDER_COMPOSITION_ID").unwrap_or(d.composition_id),
            composition_mode,
            audio_target_format: env_non_empty("AUDIO_TARGET_FORMAT")
                .map(|f| f.trim_start_matches('.').to_ascii_lowercase()),
            audio_source: env_parse("AUDIO_SOURCE").unwrap_or_default(),
            placeholder_photo_url: env_non_empty("PLACEHOLDER_PHOTO_URL").unwrap_or_default(),
            max_name_chars: env_parse("MAX_NAME_CHARS").unwrap_or(d.max_name_chars),
            timeouts: StageTimeouts::from_env(),
            safety_tick: Duration::from_secs(env_parse("SAFETY_TICK_SECS").unwrap_or(2)),
            shutdown_timeout: Duration::from_secs(env_parse("WORKER_SHUTDOWN_TIMEOUT").unwrap_or(60)),
            tts_max_retries: env_parse("TTS_MAX_RETRIES").unwrap_or(d.tts_max_retries),
            upload_max_retries: env_parse("UPLOAD_MAX_RETRIES").unwrap_or(d.upload_max_retries),
            upload_fallback_on_error: env_parse("UPLOAD_FALLBACK_ON_ERROR")
                .unwrap_or(d.upload_fallback_on_error),
        }
    }
}

impl WorkerConfig {
    /// Whether any configured stage shells out to FFmpeg.
    pub fn needs_ffmpeg(&self) -> bool {
        self.audio_target_format.is_some()
            || matches!(self.composition_mode, CompositionMode::Segmented { .. })
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_non_empty(key).and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.composition_id, "noel");
        assert_eq!(config.composition_mode, CompositionMode::Single);
        assert_eq!(config.tts_max_retries, 0);
        assert_eq!(config.max_name_chars, 40);
        assert!(config.upload_fallback_on_error);
        assert!(!config.needs_ffmpeg());
    }

    #[test]
    fn test_segmented_needs_ffmpeg() {
        let config = WorkerConfig {
            composition_mode: CompositionMode::Segmented {
                intro: PathBuf::from("intro.mp4"),
                outro: PathBuf::from("outro.mp4"),
            },
            ..Default::default()
        };
        assert!(config.needs_ffmpeg());
    }

    #[test]
    fn test_audio_source_parse() {
        assert_eq!("inline".parse::<AudioSource>().unwrap(), AudioSource::Inline);
        assert_eq!(" Published ".parse::<AudioSource>().unwrap(), AudioSource::Published);
        assert!("s3".parse::<AudioSource>().is_err());
    }

    #[test]
    fn test_stage_timeout_lookup() {
        let timeouts = StageTimeouts::default();
        assert_eq!(timeouts.for_stage(PipelineStage::Render), timeouts.render);
        assert_eq!(timeouts.for_stage(PipelineStage::Upload), timeouts.upload);
    }

    #[test]
    fn test_ffmpeg_limit_covers_both_ffmpeg_stages() {
        let timeouts = StageTimeouts {
            conversion: Duration::from_secs(120),
            concatenation: Duration::from_secs(180),
            ..Default::default()
        };
        assert_eq!(timeouts.ffmpeg_limit(), Duration::from_secs(180));

        let timeouts = StageTimeouts {
            conversion: Duration::from_secs(400),
            ..timeouts
        };
        assert_eq!(timeouts.ffmpeg_limit(), Duration::from_secs(400));
    }
}
