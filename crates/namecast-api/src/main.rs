//! Namecast API server binary: HTTP API plus the render worker loop.

use std::net::SocketAddr;
use std::sync::Arc;

use namecast_media::{check_ffmpeg, BundleCache, FfmpegTools, RemotionCli, RemotionConfig};
use namecast_storage::StoragePublisher;
use namecast_voice::ElevenLabsClient;
use namecast_worker::{Adapters, RenderService, WorkerConfig};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use namecast_api::{create_router, metrics, ApiConfig, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    init_tracing();

    info!("Starting namecast-api");

    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    info!(
        host = %config.host,
        port = config.port,
        composition = %worker_config.composition_id,
        output_dir = %worker_config.output_dir.display(),
        "Configuration loaded"
    );

    if let Err(e) = tokio::fs::create_dir_all(&worker_config.output_dir).await {
        error!("Failed to create output directory: {}", e);
        std::process::exit(1);
    }

    if check_ffmpeg().is_err() && worker_config.needs_ffmpeg() {
        warn!("FFmpeg not found in PATH; audio conversion and segment concatenation will fail");
    }

    let voice = match ElevenLabsClient::from_env() {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create voice client: {}", e);
            std::process::exit(1);
        }
    };
    if !voice.is_configured() {
        warn!("ELEVENLABS_API_KEY is not set; every job will fail at synthesis");
    }

    let storage = Arc::new(StoragePublisher::from_env());
    let ffmpeg_limit = worker_config.timeouts.ffmpeg_limit();

    let adapters = Adapters {
        voice: Arc::new(voice),
        bundles: Arc::new(BundleCache::new(Arc::new(RemotionCli::new(
            RemotionConfig::from_env(),
        )))),
        media: Arc::new(FfmpegTools::with_timeout(ffmpeg_limit.as_secs())),
        publisher: storage.clone(),
    };

    let shutdown_timeout = worker_config.shutdown_timeout;
    let service = Arc::new(RenderService::new(worker_config, adapters));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = service.spawn_worker(shutdown_rx);

    let mut state = AppState::new(config.clone(), service, storage);
    if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                state = state.with_metrics(handle);
            }
            Err(e) => warn!("Failed to install metrics recorder: {}", e),
        }
    }

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid bind address");

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        error!("Server error: {}", e);
    }

    // Let the in-flight job finish; queued jobs are dropped.
    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(shutdown_timeout, worker).await {
        Ok(Ok(())) => info!("Render worker stopped"),
        Ok(Err(e)) => error!("Render worker task failed: {}", e),
        Err(_) => warn!(
            timeout_secs = shutdown_timeout.as_secs(),
            "Render worker did not stop in time; abandoning in-flight job"
        ),
    }

    info!("Server shutdown complete");
}

/// JSON logs when `LOG_FORMAT=json`, human-readable otherwise.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive("namecast=info".parse().expect("valid directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
