//! The worker loop.
//!
//! One job in flight per process; horizontal scale-out is the parallelism
//! model. The loop drains the shared queue with a bounded blocking pop so
//! cancellation is observed promptly, hands each job to the executor, and
//! delivers the result to the job's callback URL when one is set.

pub mod callback;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::Job;
use crate::executor::Executor;
use crate::queue::JobQueue;

pub use callback::{CallbackClient, DEFAULT_CALLBACK_TIMEOUT};

/// Worker loop tuning.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Upper bound for one blocking pop before re-polling.
    pub pop_timeout: Duration,
    /// Backoff after a queue error.
    pub error_backoff: Duration,
    /// Timeout for the callback POST.
    pub callback_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pop_timeout: Duration::from_secs(5),
            error_backoff: Duration::from_secs(1),
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
        }
    }
}

/// A single-job-at-a-time queue consumer.
pub struct WorkerLoop {
    worker_id: String,
    queue: Arc<dyn JobQueue>,
    executor: Executor,
    callback: CallbackClient,
    config: WorkerConfig,
    cancellation_token: CancellationToken,
}

impl WorkerLoop {
    pub fn new(queue: Arc<dyn JobQueue>, executor: Executor) -> Self {
        Self::with_config(queue, executor, WorkerConfig::default())
    }

    pub fn with_config(
        queue: Arc<dyn JobQueue>,
        executor: Executor,
        config: WorkerConfig,
    ) -> Self {
        Self {
            worker_id: uuid::Uuid::new_v4().to_string(),
            queue,
            executor,
            callback: CallbackClient::new(config.callback_timeout),
            config,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Identifier used only in logs.
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Token that stops the loop. The in-flight job (if any) is completed
    /// before the loop exits.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Request shutdown.
    pub fn shutdown(&self) {
        self.cancellation_token.cancel();
    }

    /// Drain jobs until cancelled.
    pub async fn run(&self) {
        info!(worker_id = %self.worker_id, "Worker loop started");

        while !self.cancellation_token.is_cancelled() {
            let popped = tokio::select! {
                _ = self.cancellation_token.cancelled() => break,
                popped = self.queue.blocking_pop_left(self.config.pop_timeout) => popped,
            };

            match popped {
                Ok(Some(payload)) => self.process_payload(&payload).await,
                Ok(None) => {}
                Err(e) => {
                    warn!(worker_id = %self.worker_id, error = %e, "Queue pop failed; backing off");
                    tokio::select! {
                        _ = self.cancellation_token.cancelled() => break,
                        _ = tokio::time::sleep(self.config.error_backoff) => {}
                    }
                }
            }
        }

        info!(worker_id = %self.worker_id, "Worker loop stopped");
    }

    async fn process_payload(&self, payload: &str) {
        let job: Job = match serde_json::from_str(payload) {
            Ok(job) => job,
            Err(e) => {
                warn!(worker_id = %self.worker_id, error = %e, "Dropping malformed job payload");
                return;
            }
        };

        let queue_wait_ms = (Utc::now() - job.created_at).num_milliseconds().max(0);
        info!(
            worker_id = %self.worker_id,
            queue_wait_ms,
            "Processing job {} for problem {}",
            job.token,
            job.problem_id
        );

        let result = self.executor.execute(&job).await;
        info!(token = %result.token, status = %result.status, "Job finished");

        match job.callback_url.as_deref() {
            Some(url) => {
                // At-most-once: a failed POST is logged and the result is
                // lost; the job is never requeued.
                if let Err(e) = self.callback.deliver(url, &result).await {
                    warn!(token = %result.token, error = %e, "Failed to deliver result callback");
                }
            }
            None => {
                debug!(
                    token = %result.token,
                    status = %result.status,
                    exit_code = result.exit_code,
                    "No callback URL set; discarding result"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobRequest;
    use crate::executor::{LanguageRegistry, Recipe};
    use crate::queue::MemoryQueue;

    fn shell_executor(root: &std::path::Path) -> Executor {
        let mut registry = LanguageRegistry::new();
        registry.register(1, Recipe::interpreted("sh", "sh {file}", 5000));
        Executor::new()
            .with_registry(registry)
            .with_workspace_root(root)
    }

    fn test_config() -> WorkerConfig {
        WorkerConfig {
            pop_timeout: Duration::from_millis(50),
            error_backoff: Duration::from_millis(50),
            callback_timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn drains_jobs_and_stops_on_shutdown() {
        let root = tempfile::tempdir().unwrap();
        let queue = Arc::new(MemoryQueue::new());

        let job = Job::assign(JobRequest {
            source_code: "echo done".to_string(),
            language_id: 1,
            problem_id: "p1".to_string(),
            callback_url: None,
            timeout_ms: None,
            memory_limit_mb: None,
            expected_output: None,
        });
        queue
            .push_right(serde_json::to_string(&job).unwrap())
            .await
            .unwrap();

        let worker = Arc::new(WorkerLoop::with_config(
            queue.clone(),
            shell_executor(root.path()),
            test_config(),
        ));

        let runner = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.run().await })
        };

        // Wait for the queue to drain, then stop the loop.
        for _ in 0..100 {
            if queue.len().await.unwrap() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(queue.len().await.unwrap(), 0);

        worker.shutdown();
        tokio::time::timeout(Duration::from_secs(2), runner)
            .await
            .expect("worker loop did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn malformed_payloads_are_dropped() {
        let root = tempfile::tempdir().unwrap();
        let queue = Arc::new(MemoryQueue::new());
        let worker = WorkerLoop::with_config(
            queue.clone(),
            shell_executor(root.path()),
            test_config(),
        );

        // Must not panic and must not leave the payload in the queue.
        worker.process_payload("{not json").await;
        assert_eq!(queue.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn worker_ids_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let queue: Arc<dyn JobQueue> = Arc::new(MemoryQueue::new());

        let a = WorkerLoop::new(queue.clone(), shell_executor(root.path()));
        let b = WorkerLoop::new(queue, shell_executor(root.path()));
        assert_ne!(a.worker_id(), b.worker_id());
    }
}
