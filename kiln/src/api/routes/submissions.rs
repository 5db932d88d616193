//! Submission and queue-status routes.

use axum::{Json, extract::State};
use serde_json::Value;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::BatchSubmitResponse;
use crate::api::server::AppState;
use crate::domain::JobRequest;
use crate::orchestrator::QueueStatus;

/// Fields every submission must carry.
const REQUIRED_FIELDS: [&str; 3] = ["source_code", "language_id", "problem_id"];

/// Accept a batch of submissions.
///
/// The whole batch is validated before anything is enqueued: one invalid
/// element rejects the entire request and no tokens are returned.
pub async fn submit_batch(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<BatchSubmitResponse>> {
    let submissions = body
        .get("submissions")
        .ok_or_else(|| ApiError::bad_request("`submissions` is required"))?;
    let items = submissions
        .as_array()
        .ok_or_else(|| ApiError::bad_request("`submissions` must be a list"))?;
    if items.is_empty() {
        return Err(ApiError::bad_request("`submissions` must not be empty"));
    }

    let mut requests = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let request = parse_submission(item)
            .map_err(|msg| ApiError::bad_request(format!("submissions[{index}]: {msg}")))?;
        requests.push(request);
    }

    let tokens = state.orchestrator.submit_batch(requests).await?;
    Ok(Json(BatchSubmitResponse { tokens }))
}

/// Backlog depth and live worker count.
pub async fn queue_status(State(state): State<AppState>) -> ApiResult<Json<QueueStatus>> {
    let status = state.orchestrator.queue_status().await?;
    Ok(Json(status))
}

fn parse_submission(value: &Value) -> Result<JobRequest, String> {
    if !value.is_object() {
        return Err("must be an object".to_string());
    }

    for field in REQUIRED_FIELDS {
        if value.get(field).is_none() {
            return Err(format!("missing required field `{field}`"));
        }
    }

    serde_json::from_value(value.clone()).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_minimal_submission() {
        let request = parse_submission(&json!({
            "source_code": "print('Hello, World!')",
            "language_id": 71,
            "problem_id": "p1"
        }))
        .unwrap();

        assert_eq!(request.language_id, 71);
        assert_eq!(request.problem_id, "p1");
        assert!(request.callback_url.is_none());
    }

    #[test]
    fn parses_optional_fields() {
        let request = parse_submission(&json!({
            "source_code": "while True: pass",
            "language_id": 71,
            "problem_id": "p2",
            "callback_url": "http://example.com/cb",
            "timeout_ms": 2000,
            "memory_limit_mb": 128
        }))
        .unwrap();

        assert_eq!(request.timeout_ms, Some(2000));
        assert_eq!(request.memory_limit_mb, Some(128));
        assert_eq!(request.callback_url.as_deref(), Some("http://example.com/cb"));
    }

    #[test]
    fn rejects_missing_required_fields() {
        for field in REQUIRED_FIELDS {
            let mut value = json!({
                "source_code": "x",
                "language_id": 71,
                "problem_id": "p"
            });
            value.as_object_mut().unwrap().remove(field);

            let err = parse_submission(&value).unwrap_err();
            assert!(err.contains(field), "error should name `{field}`: {err}");
        }
    }

    #[test]
    fn rejects_non_object_elements() {
        assert!(parse_submission(&json!("just a string")).is_err());
        assert!(parse_submission(&json!(42)).is_err());
    }

    #[test]
    fn rejects_wrongly_typed_fields() {
        let err = parse_submission(&json!({
            "source_code": "x",
            "language_id": "python",
            "problem_id": "p"
        }))
        .unwrap_err();
        assert!(!err.is_empty());
    }
}
