//! Submission and status API for render jobs.
//!
//! The binary runs this router and the render worker loop in one process,
//! sharing a single [`namecast_worker::RenderService`].

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
