//! Integration Tests for API Endpoints
//!
//! Tests the full request/response cycle for each endpoint, in-process via
//! `oneshot` and against a live server with `reqwest`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use hybrid_cache::storage::MemoryKvStore;
use hybrid_cache::{create_router, AppState, CacheConfig, HybridCache};
use serde_json::{json, Value};
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> Router {
    let cache = HybridCache::builder(CacheConfig::default())
        .default_strategies()
        .persistence(Arc::new(MemoryKvStore::new()))
        .build();
    create_router(AppState::new(cache))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

// == SET / GET ==

#[tokio::test]
async fn test_set_endpoint_success() {
    let app = create_test_app();

    let (status, json) = send(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "test_key", "value": "test_value"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["message"].as_str().unwrap().contains("test_key"));
}

#[tokio::test]
async fn test_get_returns_structured_value() {
    let app = create_test_app();
    let value = json!({"name": "Ada", "roles": ["admin", "dev"]});

    send(&app, "PUT", "/set", Some(json!({"key": "user:1", "value": value}))).await;
    let (status, json) = send(&app, "GET", "/get/user:1", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["key"], "user:1");
    assert_eq!(json["value"], value);
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/get/nonexistent", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("nonexistent"));
}

#[tokio::test]
async fn test_large_value_roundtrip() {
    let app = create_test_app();
    let text = "lorem ipsum dolor sit amet ".repeat(200);

    send(&app, "PUT", "/set", Some(json!({"key": "text:essay", "value": text}))).await;
    let (status, json) = send(&app, "GET", "/get/text:essay", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"], text);

    let (_, stats) = send(&app, "GET", "/stats", None).await;
    assert!(stats["compression_ratio"].as_f64().unwrap() < 1.0);
}

// == HAS / DELETE ==

#[tokio::test]
async fn test_has_endpoint() {
    let app = create_test_app();
    send(&app, "PUT", "/set", Some(json!({"key": "k", "value": 1}))).await;

    let (_, present) = send(&app, "GET", "/has/k", None).await;
    let (_, absent) = send(&app, "GET", "/has/other", None).await;

    assert_eq!(present["exists"], true);
    assert_eq!(absent["exists"], false);
}

#[tokio::test]
async fn test_delete_endpoint() {
    let app = create_test_app();
    send(&app, "PUT", "/set", Some(json!({"key": "to_delete", "value": "v"}))).await;

    let (status, json) = send(&app, "DELETE", "/del/to_delete", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["message"].as_str().unwrap().contains("deleted"));

    let (status, _) = send(&app, "GET", "/get/to_delete", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", "/del/to_delete", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// == CLEAR / INVALIDATE ==

#[tokio::test]
async fn test_clear_with_pattern() {
    let app = create_test_app();
    for key in ["voice:1", "voice:2", "user:1"] {
        send(&app, "PUT", "/set", Some(json!({"key": key, "value": key}))).await;
    }

    let (status, json) = send(&app, "POST", "/clear", Some(json!({"pattern": "voice"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 2);

    let (status, _) = send(&app, "GET", "/get/user:1", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_full_clear_resets_stats() {
    let app = create_test_app();
    send(&app, "PUT", "/set", Some(json!({"key": "a", "value": 1}))).await;
    send(&app, "GET", "/get/a", None).await;

    let (_, json) = send(&app, "POST", "/clear", Some(json!({}))).await;
    assert_eq!(json["removed"], 1);

    let (_, stats) = send(&app, "GET", "/stats", None).await;
    assert_eq!(stats["total_entries"], 0);
    assert_eq!(stats["hits"], 0);
}

#[tokio::test]
async fn test_invalidate_by_tag() {
    let app = create_test_app();
    send(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "post:1", "value": {"topic": "weather"}})),
    )
    .await;
    send(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "post:2", "value": {"topic": "sports"}})),
    )
    .await;

    let (status, json) = send(
        &app,
        "POST",
        "/invalidate",
        Some(json!({"tags": ["weather"]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 1);
    let (status, _) = send(&app, "GET", "/get/post:2", None).await;
    assert_eq!(status, StatusCode::OK);
}

// == STATS / HEALTH ==

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app();
    send(&app, "PUT", "/set", Some(json!({"key": "k", "value": "v"}))).await;
    send(&app, "GET", "/get/k", None).await;
    send(&app, "GET", "/get/missing", None).await;

    let (status, json) = send(&app, "GET", "/stats", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["total_entries"], 1);
    assert!(json["memory_usage_bytes"].as_u64().unwrap() > 0);
    let rates = json["hit_rate"].as_f64().unwrap() + json["miss_rate"].as_f64().unwrap();
    assert!((rates - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].as_str().is_some());
}

// == Error Handling ==

#[tokio::test]
async fn test_invalid_json_request() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/set")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_key_request() {
    let app = create_test_app();

    let (status, json) = send(&app, "PUT", "/set", Some(json!({"key": "", "value": 1}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_ttl_expiration_via_api() {
    let app = create_test_app();
    send(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "brief", "value": "v", "ttl": 50, "priority": "high"})),
    )
    .await;

    let (status, _) = send(&app, "GET", "/get/brief", None).await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(100)).await;

    // the durable copy has expired too
    let (status, _) = send(&app, "GET", "/get/brief", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// == Live Server ==

#[tokio::test]
async fn test_live_server_roundtrip() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_test_app();
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::new();
    let base = format!("http://{}", addr);

    let response = client
        .put(format!("{}/set", base))
        .json(&json!({"key": "session:abc", "value": {"token": "t"}}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let body: Value = client
        .get(format!("{}/get/session:abc", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["value"]["token"], "t");

    let health = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(health.status(), reqwest::StatusCode::OK);

    server.abort();
}
