//! API routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;

use crate::handlers::{get_job, get_queue_status, health, ready, submit_job};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
///
/// `POST /render` and `GET /job/:id` are the routes existing clients call;
/// the `/api/jobs` pair is the same handlers under the API prefix.
pub fn create_router(state: AppState) -> Router {
    let rate_limiter = Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    let submit_routes = Router::new()
        .route("/render", post(submit_job))
        .route("/api/jobs", post(submit_job))
        .route_layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let status_routes = Router::new()
        .route("/job/:id", get(get_job))
        .route("/api/jobs/:id", get(get_job))
        .route("/api/queue", get(get_queue_status));

    let renders = ServeDir::new(&state.service.config().output_dir);

    Router::new()
        .merge(submit_routes)
        .merge(status_routes)
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(render_metrics))
        .nest_service("/renders", renders)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

/// Prometheus exposition, or 404 when metrics are disabled.
async fn render_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}
