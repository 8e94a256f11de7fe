//! API server binary. Hosts the HTTP endpoints and the in-process job
//! executor.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vgen_api::{create_router, metrics, ApiConfig, AppState, JwksCache};
use vgen_firestore::{DocumentStore, FirestoreClient};
use vgen_media_client::FalClient;
use vgen_worker::{
    AttributePromptBuilder, JobExecutor, JobOrchestrator, JobRunner, QueueDispatcher, WorkerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // rustls 0.23 needs an explicit process-wide provider
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    init_tracing();
    info!("Starting vgen-api");

    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);

    let firestore = FirestoreClient::from_env()
        .await
        .context("Failed to create Firestore client")?;
    let project_id = firestore.config().project_id.clone();
    let store: Arc<dyn DocumentStore> = Arc::new(firestore);

    let media = Arc::new(FalClient::from_env().context("Failed to create media client")?);
    let verifier = Arc::new(
        JwksCache::connect(project_id)
            .await
            .context("Failed to load Firebase signing keys")?,
    );

    let (dispatcher, queue) = QueueDispatcher::channel(worker_config.queue_capacity);
    let orchestrator = Arc::new(JobOrchestrator::new(
        store.clone(),
        Arc::new(dispatcher),
        worker_config.clone(),
    ));
    let runner = Arc::new(JobRunner::new(
        store.clone(),
        media,
        Arc::new(AttributePromptBuilder::new()),
        worker_config.clone(),
    ));

    let executor = Arc::new(JobExecutor::new(worker_config, runner, queue));
    let executor_task = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run().await })
    };

    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    let metrics_handle = if metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
                None
            }
        }
    } else {
        None
    };

    let state = AppState::new(config.clone(), store, orchestrator, verifier);
    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address()))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("HTTP server stopped, draining job executor");
    executor.shutdown();
    match executor_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Job executor failed: {}", e),
        Err(e) => error!("Job executor task panicked: {}", e),
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Received shutdown signal");
}
