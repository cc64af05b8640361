//! Render service: job intake, status reads and the single worker loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use namecast_models::{JobId, JobStatus, RenderJob, RenderRequest, TransitionError};
use namecast_queue::{JobQueue, JobStore};
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn, Instrument};

use crate::config::WorkerConfig;
use crate::error::ServiceResult;
use crate::logging::JobLogger;
use crate::metrics;
use crate::pipeline::{Adapters, RenderPipeline};

/// Queue introspection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub queue_length: usize,
    pub busy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_job_id: Option<String>,
    pub total_jobs: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
}

/// Owns the job store and queue; constructed once per process and shared
/// with the HTTP handlers.
///
/// One worker loop drains the queue in FIFO order and runs at most one
/// pipeline at a time.
pub struct RenderService {
    config: WorkerConfig,
    store: Arc<JobStore>,
    queue: JobQueue,
    pipeline: Arc<RenderPipeline>,
    busy: AtomicBool,
    current: RwLock<Option<JobId>>,
}

impl RenderService {
    pub fn new(config: WorkerConfig, adapters: Adapters) -> Self {
        let store = Arc::new(JobStore::new());
        let pipeline = RenderPipeline::new(config.clone(), store.clone(), adapters);

        Self {
            config,
            store,
            queue: JobQueue::new(),
            pipeline: Arc::new(pipeline),
            busy: AtomicBool::new(false),
            current: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Validate and enqueue a render request.
    pub async fn submit(&self, request: &RenderRequest) -> ServiceResult<RenderJob> {
        let valid = request.validate(self.config.max_name_chars)?;
        let job = RenderJob::new(valid.name, valid.photo_url);

        self.store.insert(job.clone()).await?;
        let queue_len = self.queue.push(job.id.clone()).await?;

        metrics::record_job_enqueued();
        metrics::set_queue_length(queue_len);
        info!(job_id = %job.id, queue_len, "Render job queued");

        Ok(job)
    }

    /// Snapshot of a job.
    pub async fn job(&self, id: &JobId) -> Option<RenderJob> {
        self.store.get(id).await
    }

    pub async fn queue_status(&self) -> QueueStatus {
        QueueStatus {
            queue_length: self.queue.len().await,
            busy: self.is_busy(),
            current_job_id: self.current.read().await.as_ref().map(JobId::to_string),
            total_jobs: self.store.len().await,
            completed_jobs: self.store.count_by_status(JobStatus::Done).await,
            failed_jobs: self.store.count_by_status(JobStatus::Error).await,
        }
    }

    /// Zero-based position of a job still waiting in the queue.
    pub async fn queue_position(&self, id: &JobId) -> Option<usize> {
        self.queue.position(id).await
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Whether the render bundle has been compiled.
    pub fn bundle_ready(&self) -> bool {
        self.pipeline.bundles().is_compiled()
    }

    pub fn storage_configured(&self) -> bool {
        self.pipeline.publisher().is_configured()
    }

    /// Spawn the worker loop.
    pub fn spawn_worker(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move { service.run(shutdown).await })
    }

    /// Drain the queue on every wake-up or safety tick until shutdown.
    ///
    /// An in-flight job is finished before the loop observes shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            composition = %self.config.composition_id,
            safety_tick = ?self.config.safety_tick,
            "Render worker started"
        );

        let mut tick = tokio::time::interval(self.config.safety_tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.drain(&shutdown).await;

            tokio::select! {
                _ = self.queue.notified() => {}
                _ = tick.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let pending = self.queue.len().await;
        if pending > 0 {
            warn!(pending, "Render worker stopped with jobs still queued");
        } else {
            info!("Render worker stopped");
        }
    }

    async fn drain(&self, shutdown: &watch::Receiver<bool>) {
        while !*shutdown.borrow() {
            let Some(id) = self.queue.pop().await else {
                break;
            };
            metrics::set_queue_length(self.queue.len().await);
            self.process(id).await;
        }
    }

    async fn process(&self, id: JobId) {
        let job = match self
            .store
            .update(&id, |job| {
                job.start()?;
                Ok::<_, TransitionError>(job.clone())
            })
            .await
        {
            Ok(job) => job,
            Err(e) => {
                warn!(job_id = %id, "Skipping dequeued job: {}", e);
                return;
            }
        };

        self.busy.store(true, Ordering::SeqCst);
        *self.current.write().await = Some(id.clone());

        let logger = JobLogger::new(&id, "render");
        logger.log_start(&format!("personalizing for '{}'", job.input_name));
        let started = Instant::now();

        // Run in its own task so a panic becomes a job error instead of
        // killing the loop.
        let pipeline = Arc::clone(&self.pipeline);
        let span = logger.create_span();
        let outcome = tokio::spawn(async move { pipeline.execute(&job).await }.instrument(span)).await;

        match outcome {
            Ok(Ok(url)) => {
                self.finish(&id, |job| job.complete(url.clone())).await;
                metrics::record_job_completed(started.elapsed().as_secs_f64());
                logger.log_completion(&url);
            }
            Ok(Err(e)) => {
                let detail = e.detail(&self.config.work_dir, &self.config.output_dir);
                metrics::record_job_failed(e.stage().as_str());
                logger.log_error(&detail);
                self.finish(&id, |job| job.fail(detail.clone())).await;
            }
            Err(join_err) => {
                metrics::record_job_failed("panic");
                logger.log_error(&format!("pipeline task aborted: {}", join_err));
                self.finish(&id, |job| job.fail("internal: render task aborted unexpectedly"))
                    .await;
            }
        }

        *self.current.write().await = None;
        self.busy.store(false, Ordering::SeqCst);
    }

    async fn finish<F>(&self, id: &JobId, f: F)
    where
        F: FnOnce(&mut RenderJob) -> Result<(), TransitionError>,
    {
        if let Err(e) = self.store.update(id, f).await {
            error!(job_id = %id, "Failed to finalize job: {}", e);
        }
    }
}
