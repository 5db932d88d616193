//! Route-level tests for the submission API.

mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use kiln::api::{AppState, routes};
use kiln::domain::Job;
use kiln::queue::{JobQueue, MemoryQueue};
use serde_json::{Value, json};
use tower::util::ServiceExt;

fn app() -> (Router, Arc<MemoryQueue>) {
    let queue = Arc::new(MemoryQueue::new());
    let orchestrator = Arc::new(common::orchestrator(queue.clone(), 2));
    (routes::router(AppState::new(orchestrator)), queue)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn submission(problem_id: &str) -> Value {
    json!({
        "source_code": "print('Hello, World!')",
        "language_id": 71,
        "problem_id": problem_id
    })
}

#[tokio::test]
async fn health_reports_healthy() {
    let (app, _) = app();

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn batch_submit_returns_tokens_in_input_order() {
    let (app, queue) = app();

    let body = json!({ "submissions": [submission("a"), submission("b"), submission("c")] });
    let response = app.oneshot(post_json("/submit/batch", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let tokens: Vec<String> = body["tokens"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_str().unwrap().to_string())
        .collect();
    assert_eq!(tokens.len(), 3);
    assert_eq!(queue.len().await.unwrap(), 3);

    // Queue order matches token order.
    for expected in &tokens {
        let payload = queue
            .blocking_pop_left(std::time::Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();
        let job: Job = serde_json::from_str(&payload).unwrap();
        assert_eq!(&job.token, expected);
    }
}

#[tokio::test]
async fn missing_submissions_key_is_a_bad_request() {
    let (app, _) = app();

    let response = app
        .oneshot(post_json("/submit/batch", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn empty_submission_list_is_a_bad_request() {
    let (app, _) = app();

    let response = app
        .oneshot(post_json("/submit/batch", json!({ "submissions": [] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_list_submissions_is_a_bad_request() {
    let (app, _) = app();

    let response = app
        .oneshot(post_json(
            "/submit/batch",
            json!({ "submissions": "not-a-list" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn one_invalid_element_rejects_the_whole_batch() {
    let (app, queue) = app();

    let body = json!({
        "submissions": [
            submission("ok"),
            { "source_code": "x", "language_id": 71 }
        ]
    });
    let response = app.oneshot(post_json("/submit/batch", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("submissions[1]"), "got: {message}");
    assert!(message.contains("problem_id"), "got: {message}");

    // Nothing was enqueued.
    assert_eq!(queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn status_reports_backlog_and_worker_count() {
    let (app, queue) = app();

    queue.push_right("payload".to_string()).await.unwrap();
    queue.push_right("payload".to_string()).await.unwrap();

    let response = app.oneshot(get("/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["queued"], 2);
    assert_eq!(body["worker_count"], 2);
}
