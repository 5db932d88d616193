//! The orchestrator: accepts submissions, exposes backlog visibility, and
//! drives the replica count of the worker deployment.

pub mod scaler;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::Result;
use crate::cluster::Cluster;
use crate::domain::{Job, JobRequest};
use crate::queue::JobQueue;

pub use scaler::{AutoscalerConfig, Scaler, desired_replicas};

/// Snapshot of backlog depth and live worker count. Values may be stale;
/// nothing is locked to produce them.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueStatus {
    pub queued: usize,
    pub worker_count: usize,
}

/// Orchestrator process state: the queue producer side plus the scaling
/// loop. Explicitly constructed; shutdown is ordered (scaling timer first,
/// then the queue client).
pub struct Orchestrator {
    queue: Arc<dyn JobQueue>,
    cluster: Arc<dyn Cluster>,
    config: AutoscalerConfig,
    scaling_task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
    shut_down: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        cluster: Arc<dyn Cluster>,
        config: AutoscalerConfig,
    ) -> Self {
        Self {
            queue,
            cluster,
            config,
            scaling_task: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Assign a token to one validated submission and enqueue it. Constant
    /// time; does not wait for execution.
    pub async fn submit_job(&self, request: JobRequest) -> Result<String> {
        let job = Job::assign(request);
        let payload = serde_json::to_string(&job)?;
        self.queue.push_right(payload).await?;

        info!(token = %job.token, language_id = job.language_id, "Job submitted");
        Ok(job.token)
    }

    /// Enqueue a batch atomically, preserving submitter order. Tokens are
    /// returned in input order; a queue failure enqueues nothing.
    pub async fn submit_batch(&self, requests: Vec<JobRequest>) -> Result<Vec<String>> {
        let jobs: Vec<Job> = requests.into_iter().map(Job::assign).collect();

        let mut payloads = Vec::with_capacity(jobs.len());
        for job in &jobs {
            payloads.push(serde_json::to_string(job)?);
        }
        self.queue.push_right_all(payloads).await?;

        let tokens: Vec<String> = jobs.into_iter().map(|job| job.token).collect();
        info!(count = tokens.len(), "Batch submitted");
        Ok(tokens)
    }

    /// Read queue length and live pod count.
    pub async fn queue_status(&self) -> Result<QueueStatus> {
        let queued = self.queue.len().await?;
        let worker_count = self.cluster.count_pods(&self.config.pod_selector).await?;
        Ok(QueueStatus {
            queued,
            worker_count,
        })
    }

    /// Install the periodic reconcile timer. Idempotent: starting a running
    /// loop replaces it.
    pub fn start_scaling_loop(&self) {
        let scaler = Scaler::new(
            self.queue.clone(),
            self.cluster.clone(),
            self.config.clone(),
        );
        let token = CancellationToken::new();
        let loop_token = token.clone();
        let handle = tokio::spawn(async move { scaler.run(loop_token).await });

        let mut guard = self.scaling_task.lock();
        if let Some((old_token, _)) = guard.replace((token, handle)) {
            debug!("Replacing running scaling loop");
            old_token.cancel();
        }
    }

    /// Remove the reconcile timer, if any.
    pub fn stop_scaling_loop(&self) {
        let mut guard = self.scaling_task.lock();
        if let Some((token, _)) = guard.take() {
            token.cancel();
        }
    }

    /// Stop the scaling loop, then close the queue client. Safe to call
    /// more than once; subsequent calls are no-ops.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        self.stop_scaling_loop();
        self.queue.close().await;
        info!("Orchestrator shut down");
    }
}
