// tests/api_test.rs — Integration tests: HTTP gateway

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use modelforge::api::{build_router, ApiState};
use modelforge::infra::config::{ApiConfig, BuildConfig};
use modelforge::queue::{MemoryQueue, QueueAdapter};
use modelforge::store::{JobStore, MemoryStore};

struct TestApi {
    app: axum::Router,
    store: Arc<MemoryStore>,
    queue: Arc<MemoryQueue>,
}

fn test_api() -> TestApi {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let state = ApiState {
        store: store.clone(),
        queue: queue.clone(),
        defaults: BuildConfig::default(),
        debug: false,
    };
    TestApi {
        app: build_router(state, &ApiConfig::default()),
        store,
        queue,
    }
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_submit_creates_record_and_enqueues() {
    let api = test_api();

    let resp = api
        .app
        .clone()
        .oneshot(post_json(
            "/api/v1/models",
            serde_json::json!({"intent": "predict house prices"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body = json_body(resp).await;
    assert_eq!(body["status"], "pending");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let job = api.store.load(&job_id).await.unwrap();
    assert_eq!(job.intent, "predict house prices");
    assert_eq!(job.max_iterations, BuildConfig::default().max_iterations);
    assert_eq!(api.queue.depth().await, 1);
}

#[tokio::test]
async fn test_submit_honors_per_job_overrides() {
    let api = test_api();

    let resp = api
        .app
        .clone()
        .oneshot(post_json(
            "/api/v1/models",
            serde_json::json!({
                "intent": "classify emails",
                "max_iterations": 2,
                "timeout_seconds": 120,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body = json_body(resp).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();
    let job = api.store.load(&job_id).await.unwrap();
    assert_eq!(job.max_iterations, 2);
    assert_eq!(job.timeout, std::time::Duration::from_secs(120));
}

#[tokio::test]
async fn test_submit_rejects_empty_intent() {
    let api = test_api();

    let resp = api
        .app
        .clone()
        .oneshot(post_json(
            "/api/v1/models",
            serde_json::json!({"intent": "  "}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(api.queue.depth().await, 0);
}

#[tokio::test]
async fn test_submit_rejects_zero_iterations() {
    let api = test_api();

    let resp = api
        .app
        .clone()
        .oneshot(post_json(
            "/api/v1/models",
            serde_json::json!({"intent": "x", "max_iterations": 0}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_returns_job_view() {
    let api = test_api();

    let resp = api
        .app
        .clone()
        .oneshot(post_json(
            "/api/v1/models",
            serde_json::json!({"intent": "predict churn"}),
        ))
        .await
        .unwrap();
    let job_id = json_body(resp).await["job_id"].as_str().unwrap().to_string();

    let resp = api
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/models/{job_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["id"], job_id.as_str());
    assert_eq!(body["status"], "pending");
    assert_eq!(body["iteration_count"], 0);
    assert!(body["best_score"].is_null());
}

#[tokio::test]
async fn test_get_unknown_job_is_404() {
    let api = test_api();

    let resp = api
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/models/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_sets_cooperative_flag() {
    let api = test_api();

    let resp = api
        .app
        .clone()
        .oneshot(post_json(
            "/api/v1/models",
            serde_json::json!({"intent": "predict churn"}),
        ))
        .await
        .unwrap();
    let job_id = json_body(resp).await["job_id"].as_str().unwrap().to_string();

    let resp = api
        .app
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/models/{job_id}/cancel"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["status"], "cancel_requested");
    assert!(api.store.load(&job_id).await.unwrap().cancel_requested);
}

#[tokio::test]
async fn test_list_returns_submitted_jobs() {
    let api = test_api();

    for intent in ["a", "b", "c"] {
        api.app
            .clone()
            .oneshot(post_json(
                "/api/v1/models",
                serde_json::json!({"intent": intent}),
            ))
            .await
            .unwrap();
    }

    let resp = api
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/models")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 3);
}
