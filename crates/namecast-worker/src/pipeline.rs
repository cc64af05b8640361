//! Per-job render pipeline.
//!
//! Stages run strictly in order, each depending on the previous one:
//! bundle, synthesis, optional conversion, render, optional concatenation,
//! upload. The job record in the store is updated on entry to every stage so
//! status polls see progress. Scratch files are removed on every exit path.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use namecast_media::{move_file, BundleCache, InputProps, MediaTools};
use namecast_models::{spoken_line, JobId, PipelineStage, RenderJob};
use namecast_queue::JobStore;
use namecast_storage::{audio_key, video_key, ArtifactPublisher, StorageError, UploadOutcome};
use namecast_voice::{SynthesisRequest, VoiceError, VoiceSynthesizer};

use crate::config::{AudioSource, CompositionMode, WorkerConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::retry::{retry_async, RetryConfig};
use crate::scratch::ScratchDir;

/// External collaborators the pipeline drives.
#[derive(Clone)]
pub struct Adapters {
    pub voice: Arc<dyn VoiceSynthesizer>,
    pub bundles: Arc<BundleCache>,
    pub media: Arc<dyn MediaTools>,
    pub publisher: Arc<dyn ArtifactPublisher>,
}

/// Runs one job from synthesis to a published artifact.
pub struct RenderPipeline {
    config: WorkerConfig,
    store: Arc<JobStore>,
    adapters: Adapters,
}

impl RenderPipeline {
    pub fn new(config: WorkerConfig, store: Arc<JobStore>, adapters: Adapters) -> Self {
        Self {
            config,
            store,
            adapters,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn bundles(&self) -> &BundleCache {
        &self.adapters.bundles
    }

    pub fn publisher(&self) -> &dyn ArtifactPublisher {
        self.adapters.publisher.as_ref()
    }

    /// Execute every stage for `job`, returning the artifact URL.
    pub async fn execute(&self, job: &RenderJob) -> PipelineResult<String> {
        let logger = JobLogger::new(&job.id, "render");

        self.enter(&job.id, PipelineStage::Bundle, &logger).await?;
        timed(PipelineStage::Bundle, self.config.timeouts.bundle, async {
            self.adapters
                .bundles
                .compile_once()
                .await
                .map_err(PipelineError::from_render)
        })
        .await?;

        let scratch = ScratchDir::create(&self.config.work_dir, &job.id)
            .await
            .map_err(|e| PipelineError::scratch(PipelineStage::Synthesis, e))?;

        let result = self.produce(job, &scratch, &logger).await;
        scratch.cleanup().await;
        result
    }

    async fn produce(
        &self,
        job: &RenderJob,
        scratch: &ScratchDir,
        logger: &JobLogger,
    ) -> PipelineResult<String> {
        let (audio_path, audio_ext) = self.synthesize(job, scratch, logger).await?;

        let published_audio = if self.adapters.publisher.is_configured() {
            self.publish_audio(&job.id, &audio_path, &audio_ext, logger)
                .await
        } else {
            None
        };

        let audio_src = match (self.config.audio_source, published_audio) {
            (AudioSource::Published, Some(url)) => url,
            _ => {
                let bytes = tokio::fs::read(&audio_path)
                    .await
                    .map_err(|e| PipelineError::scratch(PipelineStage::Render, e))?;
                data_uri(audio_mime(&audio_ext), &bytes)
            }
        };

        let props = InputProps {
            name: job.input_name.clone(),
            photo_url: job
                .input_photo_ref
                .clone()
                .unwrap_or_else(|| self.config.placeholder_photo_url.clone()),
            has_photo: job.input_photo_ref.is_some(),
            audio_src,
        };

        let video = self.render(job, &props, scratch, logger).await?;

        self.enter(&job.id, PipelineStage::Upload, logger).await?;
        self.publish_video(&job.id, &video, logger).await
    }

    /// Synthesize the spoken line and, if configured, re-encode it.
    async fn synthesize(
        &self,
        job: &RenderJob,
        scratch: &ScratchDir,
        logger: &JobLogger,
    ) -> PipelineResult<(PathBuf, String)> {
        self.enter(&job.id, PipelineStage::Synthesis, logger).await?;

        let request = SynthesisRequest::new(spoken_line(&job.input_name));
        let retry =
            RetryConfig::new("voice_synthesis").with_max_retries(self.config.tts_max_retries);

        let audio = timed(PipelineStage::Synthesis, self.config.timeouts.synthesis, async {
            retry_async(&retry, VoiceError::is_retryable, || {
                self.adapters.voice.synthesize(&request)
            })
            .await
            .map_err(|e| PipelineError::synthesis(e.to_string()))
        })
        .await?;

        let ext = self.adapters.voice.audio_extension().to_string();
        let path = scratch.file(&format!("{}.{}", job.id, ext));
        tokio::fs::write(&path, &audio)
            .await
            .map_err(|e| PipelineError::scratch(PipelineStage::Synthesis, e))?;
        logger.log_progress(&format!("voice line synthesized ({} bytes)", audio.len()));

        match &self.config.audio_target_format {
            Some(target) if *target != ext => {
                self.enter(&job.id, PipelineStage::Conversion, logger).await?;
                let converted = scratch.file(&format!("{}.{}", job.id, target));
                timed(PipelineStage::Conversion, self.config.timeouts.conversion, async {
                    self.adapters
                        .media
                        .convert_audio(&path, &converted)
                        .await
                        .map_err(PipelineError::from_conversion)
                })
                .await?;
                Ok((converted, target.clone()))
            }
            _ => Ok((path, ext)),
        }
    }

    /// Render the composition and join segments when in segmented mode.
    async fn render(
        &self,
        job: &RenderJob,
        props: &InputProps,
        scratch: &ScratchDir,
        logger: &JobLogger,
    ) -> PipelineResult<PathBuf> {
        self.enter(&job.id, PipelineStage::Render, logger).await?;

        let rendered = match self.config.composition_mode {
            CompositionMode::Single => scratch.file(&format!("{}.mp4", job.id)),
            CompositionMode::Segmented { .. } => scratch.file(&format!("{}.dynamic.mp4", job.id)),
        };

        timed(PipelineStage::Render, self.config.timeouts.render, async {
            self.adapters
                .bundles
                .render(&self.config.composition_id, props, &rendered)
                .await
                .map_err(PipelineError::from_render)
        })
        .await?;

        let CompositionMode::Segmented { intro, outro } = &self.config.composition_mode else {
            return Ok(rendered);
        };

        self.enter(&job.id, PipelineStage::Concatenation, logger).await?;
        let joined = scratch.file(&format!("{}.mp4", job.id));
        let segments = [intro.clone(), rendered, outro.clone()];
        timed(
            PipelineStage::Concatenation,
            self.config.timeouts.concatenation,
            async {
                self.adapters
                    .media
                    .concat_segments(&segments, &joined)
                    .await
                    .map_err(PipelineError::from_concat)
            },
        )
        .await?;

        Ok(joined)
    }

    /// Best-effort copy of the audio in storage; failures are logged only.
    async fn publish_audio(
        &self,
        job_id: &JobId,
        path: &Path,
        ext: &str,
        logger: &JobLogger,
    ) -> Option<String> {
        let key = audio_key(job_id.as_str(), ext);
        let upload = self.adapters.publisher.upload(path, &key, audio_mime(ext));

        match tokio::time::timeout(self.config.timeouts.upload, upload).await {
            Ok(Ok(outcome)) => outcome.url().map(str::to_string),
            Ok(Err(e)) => {
                logger.log_warning(&format!("audio publish failed: {}", e));
                None
            }
            Err(_) => {
                logger.log_warning("audio publish timed out");
                None
            }
        }
    }

    /// Publish the final video, falling back to local serving.
    ///
    /// The upload limit applies to each attempt; a timed-out attempt is
    /// retried and, once retries run out, handled like any other upload
    /// error.
    async fn publish_video(
        &self,
        job_id: &JobId,
        path: &Path,
        logger: &JobLogger,
    ) -> PipelineResult<String> {
        let key = video_key(job_id.as_str());
        let limit = self.config.timeouts.upload;
        let retry =
            RetryConfig::new("video_upload").with_max_retries(self.config.upload_max_retries);

        let started = Instant::now();
        let publisher = &self.adapters.publisher;
        let key_ref = key.as_str();
        let outcome = retry_async(&retry, StorageError::is_retryable, || async move {
            let upload = publisher.upload(path, key_ref, "video/mp4");
            match tokio::time::timeout(limit, upload).await {
                Ok(result) => result,
                Err(_) => Err(StorageError::Timeout(limit)),
            }
        })
        .await;
        metrics::record_stage_duration(PipelineStage::Upload, started.elapsed().as_secs_f64());

        match outcome {
            Ok(UploadOutcome::Published { url }) => Ok(url),
            Ok(UploadOutcome::NotConfigured) => {
                logger.log_progress("storage not configured, serving video locally");
                self.serve_locally(job_id, path).await
            }
            Err(e) if self.config.upload_fallback_on_error => {
                logger.log_warning(&format!("upload failed, serving video locally: {}", e));
                self.serve_locally(job_id, path).await
            }
            Err(e) => Err(PipelineError::upload(e.to_string())),
        }
    }

    async fn serve_locally(&self, job_id: &JobId, path: &Path) -> PipelineResult<String> {
        let file_name = format!("{}.mp4", job_id);
        move_file(path, self.config.output_dir.join(&file_name))
            .await
            .map_err(|e| PipelineError::upload(format!("local fallback failed: {}", e)))?;

        Ok(format!(
            "{}/{}",
            self.config.local_base_url.trim_end_matches('/'),
            file_name
        ))
    }

    async fn enter(
        &self,
        job_id: &JobId,
        stage: PipelineStage,
        logger: &JobLogger,
    ) -> PipelineResult<()> {
        self.store
            .update(job_id, |job| job.enter_stage(stage))
            .await
            .map_err(|e| PipelineError::internal(stage, e))?;
        logger.log_stage(stage);
        Ok(())
    }
}

/// Bound `fut` by `limit` and record how long the stage took.
async fn timed<T, F>(stage: PipelineStage, limit: Duration, fut: F) -> PipelineResult<T>
where
    F: Future<Output = PipelineResult<T>>,
{
    let started = Instant::now();
    let result = match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(PipelineError::Timeout { stage, limit }),
    };
    metrics::record_stage_duration(stage, started.elapsed().as_secs_f64());
    result
}

fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

fn audio_mime(ext: &str) -> &'static str {
    match ext {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "aac" => "audio/aac",
        "m4a" => "audio/mp4",
        "ogg" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}
