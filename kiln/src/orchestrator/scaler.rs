//! Autoscaling control loop.
//!
//! One reconcile tick reads backlog depth and per-pod CPU usage, computes a
//! desired replica count, and patches the worker deployment when it
//! differs from the observed pod count. Queue length alone lags behind
//! compute-bound workloads, so CPU pressure above the watermark adds a
//! single clamped step on top of the backlog baseline.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Result;
use crate::cluster::{Cluster, parse_cpu_quantity};
use crate::queue::JobQueue;

/// Scaling configuration for the worker deployment.
#[derive(Debug, Clone)]
pub struct AutoscalerConfig {
    /// Floor for the replica count; keeps a warm worker even when idle.
    pub min_pods: u32,
    /// Ceiling for the replica count.
    pub max_pods: u32,
    /// Target backlog-to-pod ratio.
    pub jobs_per_pod: u32,
    /// Reconcile interval.
    pub check_interval: Duration,
    /// Average per-pod CPU (cores) above which one extra replica is added.
    pub cpu_high_watermark: f64,
    /// Name of the worker deployment to patch.
    pub deployment: String,
    /// Label selector matching the worker pods.
    pub pod_selector: String,
}

impl Default for AutoscalerConfig {
    fn default() -> Self {
        Self {
            min_pods: 1,
            max_pods: 10,
            jobs_per_pod: 5,
            check_interval: Duration::from_millis(10_000),
            cpu_high_watermark: 0.8,
            deployment: "kiln-worker".to_string(),
            pod_selector: "app=kiln-worker".to_string(),
        }
    }
}

/// Pure scaling decision for one tick.
///
/// `baseline = clamp(ceil(queued / jobs_per_pod), min, max)`; CPU pressure
/// above the watermark adds one replica, still clamped by `max_pods`.
pub fn desired_replicas(
    config: &AutoscalerConfig,
    queued: usize,
    avg_cpu: Option<f64>,
) -> u32 {
    let jobs_per_pod = config.jobs_per_pod.max(1) as f64;
    let baseline = (queued as f64 / jobs_per_pod).ceil() as u32;
    let baseline = baseline.clamp(config.min_pods, config.max_pods);

    match avg_cpu {
        Some(avg) if avg > config.cpu_high_watermark => (baseline + 1).min(config.max_pods),
        _ => baseline,
    }
}

/// The reconcile loop over a queue and a cluster.
pub struct Scaler {
    queue: Arc<dyn JobQueue>,
    cluster: Arc<dyn Cluster>,
    config: AutoscalerConfig,
}

impl Scaler {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        cluster: Arc<dyn Cluster>,
        config: AutoscalerConfig,
    ) -> Self {
        Self {
            queue,
            cluster,
            config,
        }
    }

    /// One reconcile tick. Returns the replica count that was patched, or
    /// `None` when the tick was a no-op.
    pub async fn reconcile_once(&self) -> Result<Option<u32>> {
        let queued = self.queue.len().await?;
        let current_pods = self.cluster.count_pods(&self.config.pod_selector).await?;
        let avg_cpu = self.average_cpu(current_pods).await;

        let desired = desired_replicas(&self.config, queued, avg_cpu);

        if desired as usize == current_pods {
            debug!(queued, current_pods, "Reconcile no-op");
            return Ok(None);
        }

        self.cluster
            .patch_replicas(&self.config.deployment, desired as i32)
            .await?;

        info!(
            queued,
            current_pods,
            avg_cpu = avg_cpu.unwrap_or(0.0),
            desired,
            "Scaled worker deployment"
        );
        Ok(Some(desired))
    }

    /// Average per-pod CPU in cores, or `None` when no usable signal exists.
    /// A metrics read failure degrades to "no signal" — losing the CPU bias
    /// must not stop backlog-driven scaling.
    async fn average_cpu(&self, current_pods: usize) -> Option<f64> {
        if current_pods == 0 {
            return None;
        }

        let usage = match self.cluster.pod_usage(&self.config.pod_selector).await {
            Ok(usage) => usage,
            Err(e) => {
                warn!(error = %e, "Failed to read pod metrics; scaling on backlog only");
                return None;
            }
        };
        if usage.is_empty() {
            return None;
        }

        let total: f64 = usage
            .iter()
            .filter_map(|pod| parse_cpu_quantity(&pod.cpu))
            .sum();
        Some(total / current_pods as f64)
    }

    /// Run reconcile ticks at the configured interval until cancelled.
    /// Tick failures are logged and swallowed; the next tick retries.
    pub async fn run(&self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            deployment = %self.config.deployment,
            interval_ms = self.config.check_interval.as_millis() as u64,
            "Scaling loop started"
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.reconcile_once().await {
                        warn!(error = %e, "Scaling tick failed");
                    }
                }
            }
        }

        info!("Scaling loop stopped");
    }
}
