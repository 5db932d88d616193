//! API request/response models.

use serde::{Deserialize, Serialize};

/// Response for a successful batch submission. Tokens are in input order.
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchSubmitResponse {
    pub tokens: Vec<String>,
}

/// Response for the health endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}
