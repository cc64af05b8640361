//! In-memory adapters for pipeline and worker loop tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use namecast_media::{
    BundleCache, BundleHandle, InputProps, MediaError, MediaResult, MediaTools, RenderEngine,
};
use namecast_queue::JobStore;
use namecast_storage::{ArtifactPublisher, StorageError, StorageResult, UploadOutcome};
use namecast_voice::{SynthesisRequest, VoiceError, VoiceResult, VoiceSynthesizer};
use tempfile::TempDir;

use crate::config::WorkerConfig;
use crate::pipeline::{Adapters, RenderPipeline};
use crate::service::RenderService;

#[derive(Default)]
pub struct FakeVoice {
    pub calls: AtomicUsize,
    pub texts: Mutex<Vec<String>>,
    /// Non-zero makes synthesis fail with this HTTP status.
    pub fail_status: AtomicU16,
    /// Fail only the first N calls; 0 fails every call.
    pub fail_times: AtomicU64,
}

#[async_trait]
impl VoiceSynthesizer for FakeVoice {
    async fn synthesize(&self, request: &SynthesisRequest) -> VoiceResult<Vec<u8>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) as u64;
        self.texts.lock().unwrap().push(request.text.clone());

        let status = self.fail_status.load(Ordering::SeqCst);
        let limit = self.fail_times.load(Ordering::SeqCst);
        if status != 0 && (limit == 0 || n < limit) {
            return Err(VoiceError::Provider {
                status,
                body: "provider exploded".into(),
            });
        }
        Ok(b"ID3 fake audio".to_vec())
    }
}

pub struct FakeEngine {
    pub compositions: Vec<String>,
    pub renders: AtomicUsize,
    pub props: Mutex<Vec<InputProps>>,
    pub fail_render: AtomicBool,
    pub delay_ms: AtomicU64,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            compositions: vec!["noel".into(), "intro".into()],
            renders: AtomicUsize::new(0),
            props: Mutex::new(Vec::new()),
            fail_render: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RenderEngine for FakeEngine {
    async fn compile(&self) -> MediaResult<BundleHandle> {
        Ok(BundleHandle::new("/bundle"))
    }

    async fn list_compositions(&self, _bundle: &BundleHandle) -> MediaResult<Vec<String>> {
        Ok(self.compositions.clone())
    }

    async fn render(
        &self,
        _bundle: &BundleHandle,
        _composition_id: &str,
        props: &InputProps,
        output: &Path,
    ) -> MediaResult<()> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        self.renders.fetch_add(1, Ordering::SeqCst);
        self.props.lock().unwrap().push(props.clone());

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let result = if self.fail_render.load(Ordering::SeqCst) {
            Err(MediaError::render_failed(
                "Remotion render failed (exit code 1)",
                Some("Error: asset missing".into()),
            ))
        } else {
            tokio::fs::write(output, b"fake video").await.map_err(Into::into)
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[derive(Default)]
pub struct FakeMedia {
    pub conversions: AtomicUsize,
    pub concats: Mutex<Vec<Vec<PathBuf>>>,
    pub fail_convert: AtomicBool,
    pub fail_concat: AtomicBool,
}

#[async_trait]
impl MediaTools for FakeMedia {
    async fn convert_audio(&self, input: &Path, output: &Path) -> MediaResult<()> {
        self.conversions.fetch_add(1, Ordering::SeqCst);
        if self.fail_convert.load(Ordering::SeqCst) {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with code 1",
                Some("Unknown encoder 'pcm_s16le'".into()),
                Some(1),
            ));
        }
        tokio::fs::copy(input, output).await?;
        Ok(())
    }

    async fn concat_segments(&self, segments: &[PathBuf], output: &Path) -> MediaResult<()> {
        self.concats.lock().unwrap().push(segments.to_vec());
        if self.fail_concat.load(Ordering::SeqCst) {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with code 1",
                Some("Non-monotonous DTS in output stream".into()),
                Some(1),
            ));
        }
        let mut joined = Vec::new();
        for segment in segments {
            joined.extend(tokio::fs::read(segment).await?);
        }
        tokio::fs::write(output, joined).await?;
        Ok(())
    }
}

pub struct FakePublisher {
    pub configured: AtomicBool,
    pub fail: AtomicBool,
    /// Video uploads (`renders/` keys) never complete.
    pub hang_videos: AtomicBool,
    pub video_attempts: AtomicUsize,
    pub keys: Mutex<Vec<String>>,
}

impl Default for FakePublisher {
    fn default() -> Self {
        Self {
            configured: AtomicBool::new(true),
            fail: AtomicBool::new(false),
            hang_videos: AtomicBool::new(false),
            video_attempts: AtomicUsize::new(0),
            keys: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ArtifactPublisher for FakePublisher {
    async fn upload(
        &self,
        _path: &Path,
        key: &str,
        _content_type: &str,
    ) -> StorageResult<UploadOutcome> {
        if !self.is_configured() {
            return Ok(UploadOutcome::NotConfigured);
        }
        if key.starts_with("renders/") {
            self.video_attempts.fetch_add(1, Ordering::SeqCst);
            if self.hang_videos.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::upload_failed("bucket unreachable"));
        }
        self.keys.lock().unwrap().push(key.to_string());
        Ok(UploadOutcome::Published {
            url: format!("https://cdn.test/{}", key),
        })
    }

    fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }
}

/// Fakes plus a temp-dir backed config.
pub struct Harness {
    pub root: TempDir,
    pub config: WorkerConfig,
    pub store: Arc<JobStore>,
    pub voice: Arc<FakeVoice>,
    pub engine: Arc<FakeEngine>,
    pub bundles: Arc<BundleCache>,
    pub media: Arc<FakeMedia>,
    pub publisher: Arc<FakePublisher>,
}

impl Harness {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let config = WorkerConfig {
            work_dir: root.path().join("work"),
            output_dir: root.path().join("renders"),
            local_base_url: "http://localhost:8080/renders".into(),
            safety_tick: Duration::from_millis(50),
            ..Default::default()
        };
        let engine = Arc::new(FakeEngine::default());

        Self {
            root,
            config,
            store: Arc::new(JobStore::new()),
            voice: Arc::new(FakeVoice::default()),
            bundles: Arc::new(BundleCache::new(engine.clone())),
            engine,
            media: Arc::new(FakeMedia::default()),
            publisher: Arc::new(FakePublisher::default()),
        }
    }

    pub fn adapters(&self) -> Adapters {
        Adapters {
            voice: self.voice.clone(),
            bundles: self.bundles.clone(),
            media: self.media.clone(),
            publisher: self.publisher.clone(),
        }
    }

    pub fn pipeline(&self) -> RenderPipeline {
        RenderPipeline::new(self.config.clone(), self.store.clone(), self.adapters())
    }

    pub fn service(&self) -> Arc<RenderService> {
        Arc::new(RenderService::new(self.config.clone(), self.adapters()))
    }
}
