//! Webhook surface tests: secret validation, event filtering, and the
//! fast-acknowledge contract.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use clipflow_models::{ClipId, ClipStatus};
use clipflow_processor::create_router;

use common::{harness, seed_pending_clip, TestHarness, UppercaseTransformer, TEST_SECRET};

fn insert_payload(record: &clipflow_models::ClipRecord) -> Value {
    json!({
        "event": { "type": "INSERT" },
        "table": "clips",
        "record": record,
    })
}

fn webhook_request(secret: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook/new-clip")
        .header("content-type", "application/json")
        .header("x-webhook-secret", secret)
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll the registry until the clip reaches a terminal status.
async fn await_terminal(h: &TestHarness, id: &ClipId) -> ClipStatus {
    for _ in 0..100 {
        if let Some(row) = h.registry.get(id) {
            if row.status.is_terminal() {
                return row.status;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("clip {} never reached a terminal status", id);
}

#[tokio::test]
async fn test_wrong_secret_is_unauthorized_and_mutates_nothing() {
    let h = harness(Arc::new(UppercaseTransformer));
    let record = seed_pending_clip(&h, "clip001.mp4", "arena01").await;
    let app = create_router(h.state.clone(), None);

    let response = app
        .oneshot(webhook_request("wrong", &insert_payload(&record)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(h.registry.get(&record.id).unwrap().status, ClipStatus::Pending);
}

#[tokio::test]
async fn test_missing_secret_is_unauthorized() {
    let h = harness(Arc::new(UppercaseTransformer));
    let record = seed_pending_clip(&h, "clip001.mp4", "arena01").await;
    let app = create_router(h.state.clone(), None);

    let request = Request::builder()
        .method("POST")
        .uri("/webhook/new-clip")
        .header("content-type", "application/json")
        .body(Body::from(insert_payload(&record).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_insert_event_is_acknowledged_and_ignored() {
    let h = harness(Arc::new(UppercaseTransformer));
    let record = seed_pending_clip(&h, "clip001.mp4", "arena01").await;
    let app = create_router(h.state.clone(), None);

    let mut payload = insert_payload(&record);
    payload["event"]["type"] = json!("UPDATE");

    let response = app
        .oneshot(webhook_request(TEST_SECRET, &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Event type ignored");
    assert_eq!(h.registry.get(&record.id).unwrap().status, ClipStatus::Pending);
}

#[tokio::test]
async fn test_other_table_is_acknowledged_and_ignored() {
    let h = harness(Arc::new(UppercaseTransformer));
    let record = seed_pending_clip(&h, "clip001.mp4", "arena01").await;
    let app = create_router(h.state.clone(), None);

    let mut payload = insert_payload(&record);
    payload["table"] = json!("scores");

    let response = app
        .oneshot(webhook_request(TEST_SECRET, &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.registry.get(&record.id).unwrap().status, ClipStatus::Pending);
}

#[tokio::test]
async fn test_malformed_payload_is_bad_request() {
    let h = harness(Arc::new(UppercaseTransformer));
    let app = create_router(h.state.clone(), None);

    let request = Request::builder()
        .method("POST")
        .uri("/webhook/new-clip")
        .header("content-type", "application/json")
        .header("x-webhook-secret", TEST_SECRET)
        .body(Body::from("{ not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_valid_insert_is_accepted_and_processed() {
    let h = harness(Arc::new(UppercaseTransformer));
    let record = seed_pending_clip(&h, "clip001.mp4", "arena01").await;
    let app = create_router(h.state.clone(), None);

    let response = app
        .oneshot(webhook_request(TEST_SECRET, &insert_payload(&record)))
        .await
        .unwrap();

    // Fast acknowledgment: 202 before the pipeline finishes.
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(
        body["message"],
        format!("Processing started for clip {}", record.id)
    );

    // Outcome is visible only through the registry.
    assert_eq!(await_terminal(&h, &record.id).await, ClipStatus::Ready);
    let row = h.registry.get(&record.id).unwrap();
    assert_eq!(
        row.processed_clip_url.as_deref(),
        Some("https://cdn/processed-clips/arena01/proc_clip001.mp4")
    );
}

#[tokio::test]
async fn test_redelivered_notification_is_accepted_but_claims_once() {
    let h = harness(Arc::new(UppercaseTransformer));
    let record = seed_pending_clip(&h, "clip001.mp4", "arena01").await;
    let payload = insert_payload(&record);

    // Deliver the same event twice, as an at-least-once sender would.
    for _ in 0..2 {
        let app = create_router(h.state.clone(), None);
        let response = app
            .oneshot(webhook_request(TEST_SECRET, &payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    assert_eq!(await_terminal(&h, &record.id).await, ClipStatus::Ready);

    // Still exactly one row, finalized once.
    assert_eq!(h.registry.row_count(), 1);
}

#[tokio::test]
async fn test_health_endpoint() {
    let h = harness(Arc::new(UppercaseTransformer));
    let app = create_router(h.state.clone(), None);

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}
