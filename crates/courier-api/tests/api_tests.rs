//! HTTP surface tests for the ingress API.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{FakePublisher, FakeStore};
use courier_api::{api_routes, AdmissionService, ApiMetrics, ApiState};

fn app(store: Arc<FakeStore>, publisher: Arc<FakePublisher>) -> axum::Router {
    let metrics = Arc::new(ApiMetrics::unregistered());
    let admission = Arc::new(AdmissionService::new(
        store,
        publisher,
        Arc::clone(&metrics),
        10,
    ));
    api_routes(ApiState { admission, metrics })
}

async fn post_json(app: axum::Router, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/sms/messages")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn send_body(idem: &str) -> Value {
    json!({
        "tenantId": "t1",
        "idempotencyKey": idem,
        "to": "+15550100000",
        "templateId": "txn_confirm_v1",
        "vars": {"name": "Ada"}
    })
}

#[tokio::test]
async fn test_create_returns_202_with_outcome() {
    let store = Arc::new(FakeStore::default());
    store.opt_in("t1", "+15550100000");
    let publisher = Arc::new(FakePublisher::default());

    let (status, body) = post_json(app(store, publisher), send_body("idem-1")).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["state"], "queued");
    assert!(body["messageId"].as_str().unwrap().starts_with("msg_"));
}

#[tokio::test]
async fn test_policy_rejection_is_202_with_suppressed_state() {
    let store = Arc::new(FakeStore::default());
    // No opt-in recorded.
    let publisher = Arc::new(FakePublisher::default());

    let (status, body) = post_json(app(store, publisher), send_body("idem-1")).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["state"], "suppressed");
}

#[tokio::test]
async fn test_missing_fields_are_400() {
    let store = Arc::new(FakeStore::default());
    let publisher = Arc::new(FakePublisher::default());
    let app = app(store, publisher);

    // Absent key entirely.
    let (status, _) = post_json(
        app.clone(),
        json!({"tenantId": "t1", "to": "+15550100000", "templateId": "tpl"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Present but empty.
    let mut body = send_body("idem-1");
    body["tenantId"] = json!("");
    let (status, _) = post_json(app, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_json_is_400() {
    let store = Arc::new(FakeStore::default());
    let publisher = Arc::new(FakePublisher::default());

    let response = app(store, publisher)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/sms/messages")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_enqueue_failure_is_502() {
    let store = Arc::new(FakeStore::default());
    store.opt_in("t1", "+15550100000");
    let publisher = Arc::new(FakePublisher::failing());

    let (status, body) = post_json(app(store, publisher), send_body("idem-1")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "upstream_error");
}

#[tokio::test]
async fn test_duplicate_create_returns_same_message_id() {
    let store = Arc::new(FakeStore::default());
    store.opt_in("t1", "+15550100000");
    let publisher = Arc::new(FakePublisher::default());
    let app = app(store, publisher.clone());

    let (_, first) = post_json(app.clone(), send_body("idem-1")).await;
    let (status, second) = post_json(app, send_body("idem-1")).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(first["messageId"], second["messageId"]);
    assert_eq!(publisher.jobs().len(), 1);
}

#[tokio::test]
async fn test_get_message_roundtrip() {
    let store = Arc::new(FakeStore::default());
    store.opt_in("t1", "+15550100000");
    let publisher = Arc::new(FakePublisher::default());
    let app = app(store, publisher);

    let (_, created) = post_json(app.clone(), send_body("idem-1")).await;
    let id = created["messageId"].as_str().unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/v1/messages/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["id"], id);
    assert_eq!(body["tenantId"], "t1");
    assert_eq!(body["state"], "queued");
}

#[tokio::test]
async fn test_get_unknown_message_is_404() {
    let store = Arc::new(FakeStore::default());
    let publisher = Arc::new(FakePublisher::default());

    let response = app(store, publisher)
        .oneshot(
            Request::builder()
                .uri("/v1/messages/msg_does_not_exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
