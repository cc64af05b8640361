//! Job submission and status handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use namecast_models::{JobId, JobStatusResponse, RenderRequest, SubmitResponse};
use namecast_worker::QueueStatus;
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Accept a render request and queue it.
pub async fn submit_job(
    State(state): State<AppState>,
    body: Result<Json<RenderRequest>, JsonRejection>,
) -> ApiResult<Json<SubmitResponse>> {
    let Json(request) = body?;

    let job = state.service.submit(&request).await?;
    info!(job_id = %job.id, has_photo = job.input_photo_ref.is_some(), "Accepted render request");

    Ok(Json(SubmitResponse {
        job_id: job.id.to_string(),
        status: job.status,
    }))
}

/// Current state of a job.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    let id = JobId::from_string(job_id);
    debug!(job_id = %id, "Job status requested");

    let job = state
        .service
        .job(&id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("job {}", id)))?;

    let position = state.service.queue_position(&id).await;
    Ok(Json(JobStatusResponse::from(&job).with_queue_position(position)))
}

/// Queue length, worker activity and the job in flight.
pub async fn get_queue_status(State(state): State<AppState>) -> Json<QueueStatus> {
    Json(state.service.queue_status().await)
}
