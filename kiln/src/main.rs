//! kiln - code execution orchestrator.
//!
//! Accepts submission batches over HTTP, feeds the shared Redis queue, and
//! drives the replica count of the worker deployment.

use std::sync::Arc;

use kiln::api::{self, AppState};
use kiln::cluster::KubeCluster;
use kiln::config::Settings;
use kiln::logging::init_logging;
use kiln::orchestrator::Orchestrator;
use kiln::queue::RedisQueue;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env_or_default();
    let _guard = init_logging(settings.log_dir.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    info!("Starting kiln orchestrator v{}", env!("CARGO_PKG_VERSION"));

    let queue = Arc::new(
        RedisQueue::connect(
            &settings.queue.host,
            settings.queue.port,
            settings.queue.key.clone(),
        )
        .await?,
    );
    let cluster = Arc::new(KubeCluster::connect(settings.namespace.clone()).await?);

    let orchestrator = Arc::new(Orchestrator::new(
        queue,
        cluster,
        settings.autoscaler.clone(),
    ));
    orchestrator.start_scaling_loop();

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            info!("Shutdown signal received");
            shutdown.cancel();
        });
    }

    api::server::serve(&settings.api, AppState::new(orchestrator.clone()), shutdown).await?;

    orchestrator.shutdown().await;
    info!("kiln shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = wait_for_sigterm() => {}
    }
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
    sigterm.recv().await;
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}
