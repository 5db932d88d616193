//! In-memory queue used by tests and single-process setups.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::JobQueue;
use crate::{Error, Result};

/// FIFO queue over a `VecDeque`, with [`Notify`] wakeups for blocked pops.
#[derive(Default)]
pub struct MemoryQueue {
    items: Mutex<VecDeque<String>>,
    notify: Notify,
    closed: AtomicBool,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::queue_unavailable("queue client is closed"));
        }
        Ok(())
    }

    fn pop_front(&self) -> Option<String> {
        self.items.lock().pop_front()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn push_right(&self, payload: String) -> Result<()> {
        self.ensure_open()?;
        self.items.lock().push_back(payload);
        self.notify.notify_one();
        Ok(())
    }

    async fn push_right_all(&self, payloads: Vec<String>) -> Result<()> {
        self.ensure_open()?;
        let mut items = self.items.lock();
        for payload in payloads {
            items.push_back(payload);
        }
        drop(items);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn blocking_pop_left(&self, timeout: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + timeout;

        loop {
            self.ensure_open()?;

            if let Some(payload) = self.pop_front() {
                return Ok(Some(payload));
            }

            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return Ok(None);
            };

            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(remaining) => return Ok(None),
            }
        }
    }

    async fn len(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.items.lock().len())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // Wake every blocked pop so it observes the close.
        self.notify.notify_waiters();
    }
}
