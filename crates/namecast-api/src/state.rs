//! Application state.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use namecast_storage::StoragePublisher;
use namecast_worker::RenderService;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub service: Arc<RenderService>,
    /// Same publisher the pipeline uploads through; used by the readiness check.
    pub storage: Arc<StoragePublisher>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        service: Arc<RenderService>,
        storage: Arc<StoragePublisher>,
    ) -> Self {
        Self {
            config,
            service,
            storage,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
