//! HTTP-level integration tests for the control plane, exercising the
//! deployed axum router end to end against an in-memory sqlite pool
//! (grounded in `sem_os_server`'s `tests/authoring_http_integration.rs`,
//! which drives its router with `tower::ServiceExt::oneshot` the same way).

use axum::body::Body;
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use monitor::db;
use monitor::web::state::AppState;
use monitor::web::router;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

const ADMIN_TOKEN: &str = "test-admin-token";

async fn build_test_app() -> axum::Router {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite pool");
    db::migrate(&pool).await.expect("migrate test pool");

    let state = AppState::new(pool, ADMIN_TOKEN.to_string());
    state.dispatcher.reload().await.expect("dispatcher reload");
    router::build(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn admin_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {ADMIN_TOKEN}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn watcher_request(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_is_unauthenticated() {
    let app = build_test_app().await;
    let response = app
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_routes_reject_missing_or_wrong_token() {
    let app = build_test_app().await;
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/watchers").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/watchers")
                .header("authorization", "Bearer wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Testable Property 9: result submission from an unapproved watcher is
/// rejected with 403 and appends no row.
#[tokio::test]
async fn unapproved_watcher_result_submission_is_forbidden() {
    let app = build_test_app().await;

    let register_body = json!({
        "name": "alpha",
        "version": "1.0.0",
        "token": "tok-alpha",
        "probe_types": []
    });
    let response = app
        .clone()
        .oneshot(admin_request("POST", "/api/push/register", register_body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed = body_json(response).await;
    assert_eq!(parsed["approved"], false);

    let result_body = json!({
        "watcher": "alpha",
        "probe_config_id": 1,
        "status": "ok",
        "message": "fine",
        "duration_ms": 5,
        "scheduled_at": "2024-01-01T00:00:00Z",
        "executed_at": "2024-01-01T00:00:00Z"
    });
    let response = app
        .oneshot(watcher_request("POST", "/api/push/result", "tok-alpha", result_body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

/// §12's "Heartbeat approval" decision: heartbeat succeeds for a valid but
/// still-unapproved watcher token.
#[tokio::test]
async fn heartbeat_does_not_require_approval() {
    let app = build_test_app().await;

    let register_body = json!({
        "name": "beta", "version": "1.0.0", "token": "tok-beta", "probe_types": []
    });
    app.clone()
        .oneshot(admin_request("POST", "/api/push/register", register_body))
        .await
        .unwrap();

    let heartbeat_body = json!({"name": "beta", "version": "1.0.1"});
    let response = app
        .oneshot(watcher_request("POST", "/api/push/heartbeat", "tok-beta", heartbeat_body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// S4: an external alert creates a watcher-less config and, on critical
/// status with channels attached, fans out a notification whose title
/// starts with "[critical] <source>" (verified indirectly: the endpoint
/// succeeds and a result row is recorded against the synthesized config).
#[tokio::test]
async fn external_alert_creates_config_and_inserts_result() {
    let app = build_test_app().await;

    let alert_body = json!({"source": "ci", "status": "critical", "message": "build failed"});
    let response = app
        .clone()
        .oneshot(admin_request("POST", "/api/push/alert", alert_body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder()
            .uri("/api/results/latest")
            .header("authorization", format!("Bearer {ADMIN_TOKEN}"))
            .body(Body::empty())
            .unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed = body_json(response).await;
    let rows = parsed.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["status"], "critical");
}

/// Testable Property 10: two identical register calls produce one watcher
/// row and do not flip an existing approval.
#[tokio::test]
async fn idempotent_registration_via_http() {
    let app = build_test_app().await;
    let body = json!({"name": "gamma", "version": "1.0.0", "token": "tok-gamma", "probe_types": []});

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(admin_request("POST", "/api/push/register", body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(Request::builder()
            .uri("/api/watchers")
            .header("authorization", format!("Bearer {ADMIN_TOKEN}"))
            .body(Body::empty())
            .unwrap())
        .await
        .unwrap();
    let parsed = body_json(response).await;
    assert_eq!(parsed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn channel_crud_round_trips() {
    let app = build_test_app().await;

    let create_body = json!({
        "name": "ops-ntfy",
        "type": "ntfy",
        "config": {"url": "https://ntfy.sh/my-topic"},
        "enabled": true
    });
    let response = app
        .clone()
        .oneshot(admin_request("POST", "/api/channels", create_body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await;
    let id = created["id"].as_i64().unwrap();

    let response = app
        .oneshot(Request::builder()
            .uri(format!("/api/channels/{id}"))
            .header("authorization", format!("Bearer {ADMIN_TOKEN}"))
            .body(Body::empty())
            .unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched["name"], "ops-ntfy");
}

#[tokio::test]
async fn set_paused_approves_on_first_unpause() {
    let app = build_test_app().await;
    let body = json!({"name": "delta", "version": "1.0.0", "token": "tok-delta", "probe_types": []});
    let response = app
        .clone()
        .oneshot(admin_request("POST", "/api/push/register", body))
        .await
        .unwrap();
    let registered = body_json(response).await;
    let watcher_id = registered["watcher_id"].as_i64().unwrap();

    let response = app
        .oneshot(admin_request(
            "PUT",
            &format!("/api/watchers/{watcher_id}/paused"),
            json!({"paused": false}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let watcher = body_json(response).await;
    assert_eq!(watcher["approved"], true);
    assert_eq!(watcher["paused"], false);
}
