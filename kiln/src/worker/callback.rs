//! Webhook delivery of execution results.

use std::time::Duration;

use tracing::debug;

use crate::domain::ExecutionResult;
use crate::{Error, Result};

/// Default timeout for a callback POST.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for posting results to a job's callback URL.
///
/// Delivery is at-most-once: a single bounded attempt, no retries. The
/// receiving side owns idempotency; re-queueing on failure would re-execute
/// the program.
pub struct CallbackClient {
    client: reqwest::Client,
}

impl Default for CallbackClient {
    fn default() -> Self {
        Self::new(DEFAULT_CALLBACK_TIMEOUT)
    }
}

impl CallbackClient {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// POST the result JSON to `url`. The receiver's response body is
    /// ignored beyond its status code.
    pub async fn deliver(&self, url: &str, result: &ExecutionResult) -> Result<()> {
        let response = self.client.post(url).json(result).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(Error::Other(format!(
                "Callback to {url} answered {status}"
            )));
        }

        debug!(token = %result.token, %url, "Delivered result callback");
        Ok(())
    }
}
