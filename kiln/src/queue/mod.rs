//! The shared job queue.
//!
//! The queue is the only coupling between the orchestrator and the workers:
//! a named FIFO of JSON-encoded job descriptors with atomic push-right and
//! blocking pop-left. Serialization stays at the edges — the trait moves
//! opaque payload strings so a malformed value can be logged and dropped by
//! the consumer instead of poisoning the queue client.

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

pub use memory::MemoryQueue;
pub use redis::RedisQueue;

/// Redis list key holding pending jobs.
pub const DEFAULT_QUEUE_KEY: &str = "code-execution-queue";

/// FIFO queue of serialized job descriptors.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Append one payload to the tail of the queue.
    async fn push_right(&self, payload: String) -> Result<()>;

    /// Append several payloads atomically, preserving their order. Either
    /// every payload is enqueued or none is.
    async fn push_right_all(&self, payloads: Vec<String>) -> Result<()>;

    /// Pop the head of the queue, waiting up to `timeout` for a job to
    /// appear. Returns `Ok(None)` on timeout.
    async fn blocking_pop_left(&self, timeout: Duration) -> Result<Option<String>>;

    /// Number of jobs currently queued.
    async fn len(&self) -> Result<usize>;

    /// Close the queue. Subsequent operations fail with a queue-unavailable
    /// error; a blocked pop observes the close promptly.
    async fn close(&self);
}
