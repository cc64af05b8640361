//! Job and pipeline metrics.

use metrics::{counter, gauge, histogram};
use namecast_models::PipelineStage;

pub mod names {
    pub const JOBS_ENQUEUED_TOTAL: &str = "namecast_jobs_enqueued_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "namecast_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "namecast_jobs_failed_total";
    pub const STAGE_DURATION_SECONDS: &str = "namecast_stage_duration_seconds";
    pub const QUEUE_LENGTH: &str = "namecast_queue_length";
    pub const JOB_DURATION_SECONDS: &str = "namecast_job_duration_seconds";
}

pub fn record_job_enqueued() {
    counter!(names::JOBS_ENQUEUED_TOTAL).increment(1);
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

pub fn record_job_failed(stage: &str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_stage_duration(stage: PipelineStage, duration_secs: f64) {
    let labels = [("stage", stage.as_str().to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn set_queue_length(length: usize) {
    gauge!(names::QUEUE_LENGTH).set(length as f64);
}
