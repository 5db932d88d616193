//! Redis-backed queue implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;

use super::JobQueue;
use crate::{Error, Result};

/// Queue backed by a Redis list.
///
/// Uses a [`ConnectionManager`] so transient connection drops are retried
/// transparently. `close` only flips a local flag — the manager has no
/// explicit shutdown — which is enough to make every subsequent operation
/// fail fast with a queue-unavailable error.
pub struct RedisQueue {
    manager: ConnectionManager,
    key: String,
    closed: AtomicBool,
}

impl RedisQueue {
    /// Connect to Redis at `host:port` and bind to the list `key`.
    pub async fn connect(host: &str, port: u16, key: impl Into<String>) -> Result<Self> {
        let url = format!("redis://{host}:{port}");
        let client = redis::Client::open(url.as_str())?;
        let manager = client.get_connection_manager().await?;
        let key = key.into();

        debug!(%url, %key, "Connected to Redis queue");

        Ok(Self {
            manager,
            key,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::queue_unavailable("queue client is closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn push_right(&self, payload: String) -> Result<()> {
        self.ensure_open()?;
        let mut con = self.manager.clone();
        let _: i64 = con.rpush(&self.key, payload).await?;
        Ok(())
    }

    async fn push_right_all(&self, payloads: Vec<String>) -> Result<()> {
        self.ensure_open()?;
        if payloads.is_empty() {
            return Ok(());
        }

        // MULTI/EXEC keeps the batch atomic: a submit either enqueues the
        // whole batch in order or nothing at all.
        let mut pipe = redis::pipe();
        pipe.atomic();
        for payload in payloads {
            pipe.rpush(&self.key, payload).ignore();
        }

        let mut con = self.manager.clone();
        let _: () = pipe.query_async(&mut con).await?;
        Ok(())
    }

    async fn blocking_pop_left(&self, timeout: Duration) -> Result<Option<String>> {
        self.ensure_open()?;
        let mut con = self.manager.clone();
        // BLPOP yields (key, value); nil on timeout.
        let popped: Option<(String, String)> =
            con.blpop(&self.key, timeout.as_secs_f64()).await?;
        Ok(popped.map(|(_, payload)| payload))
    }

    async fn len(&self) -> Result<usize> {
        self.ensure_open()?;
        let mut con = self.manager.clone();
        let len: i64 = con.llen(&self.key).await?;
        Ok(len.max(0) as usize)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
