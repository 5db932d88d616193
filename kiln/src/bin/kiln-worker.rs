//! kiln-worker - queue-draining execution worker.
//!
//! Pops one job at a time from the shared Redis queue, executes it under
//! the configured bounds, and posts the result to the job's callback URL.

use std::sync::Arc;

use kiln::config::Settings;
use kiln::executor::Executor;
use kiln::logging::init_logging;
use kiln::queue::{JobQueue, RedisQueue};
use kiln::worker::{WorkerConfig, WorkerLoop};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env_or_default();
    let _guard = init_logging(settings.log_dir.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    info!("Starting kiln worker v{}", env!("CARGO_PKG_VERSION"));

    let queue = Arc::new(
        RedisQueue::connect(
            &settings.queue.host,
            settings.queue.port,
            settings.queue.key.clone(),
        )
        .await?,
    );

    let mut executor = Executor::new();
    if let Some(root) = &settings.workspace_root {
        std::fs::create_dir_all(root)?;
        executor = executor.with_workspace_root(root.clone());
    }

    let config = WorkerConfig {
        callback_timeout: settings.callback_timeout,
        ..WorkerConfig::default()
    };
    let worker = Arc::new(WorkerLoop::with_config(queue.clone(), executor, config));

    {
        let worker = worker.clone();
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            info!("Shutdown signal received");
            worker.shutdown();
        });
    }

    // Runs until cancelled; the in-flight job completes first.
    worker.run().await;

    queue.close().await;
    info!("kiln-worker shutdown complete");
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
