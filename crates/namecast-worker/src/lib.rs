//! Render pipeline orchestrator and worker loop.
//!
//! This crate provides:
//! - The per-job pipeline (voice, render, optional concat, publish)
//! - The render service owning the job store and FIFO queue
//! - A single worker loop, at most one job in flight
//! - Scratch space management, bounded retries and job logging

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod scratch;
pub mod service;

#[cfg(test)]
mod testing;

pub use config::{AudioSource, CompositionMode, StageTimeouts, WorkerConfig};
pub use error::{PipelineError, PipelineResult, ServiceError, ServiceResult};
pub use logging::JobLogger;
pub use pipeline::{Adapters, RenderPipeline};
pub use service::{QueueStatus, RenderService};
