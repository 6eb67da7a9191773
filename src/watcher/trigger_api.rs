//! Local trigger API (§4.6 / C6): a minimal HTTP surface bound to
//! `api_port`, used by the web service's `run-now` path and by operators
//! poking a single watcher directly.

use crate::watcher::runtime::WatcherHandle;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Builds the router. Every route but `/health` is gated by
/// [`require_token`] when the watcher has a token configured — admission is
/// deliberately permissive when it doesn't (§4.6's note: "a deployment
/// decision, not a security feature").
pub fn router(handle: Arc<WatcherHandle>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/reload", post(reload))
        .route("/trigger/:id", post(trigger))
        .route("/discover", post(discover))
        .with_state(handle)
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

fn require_token(handle: &WatcherHandle, headers: &HeaderMap) -> Result<(), Response> {
    let presented = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == handle.token => Ok(()),
        Some(_) => Err((StatusCode::FORBIDDEN, "invalid token").into_response()),
        None if handle.callback_advertised => {
            Err((StatusCode::UNAUTHORIZED, "bearer token required").into_response())
        }
        None => Ok(()),
    }
}

async fn reload(State(handle): State<Arc<WatcherHandle>>, headers: HeaderMap) -> Response {
    if let Err(response) = require_token(&handle, &headers) {
        return response;
    }
    match handle.reload().await {
        Ok(()) => Json(json!({"status": "ok"})).into_response(),
        Err(e) => {
            warn!(error = %e, "reload failed");
            (StatusCode::BAD_GATEWAY, Json(json!({"status": "error", "message": e.to_string()}))).into_response()
        }
    }
}

async fn trigger(
    State(handle): State<Arc<WatcherHandle>>,
    headers: HeaderMap,
    Path(config_id): Path<i64>,
) -> Response {
    if let Err(response) = require_token(&handle, &headers) {
        return response;
    }
    match handle.trigger(config_id).await {
        Ok(true) => Json(json!({"status": "ok"})).into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, Json(json!({"status": "error", "message": "unknown config id"}))).into_response(),
        Err(e) => {
            warn!(error = %e, config_id, "trigger failed");
            (StatusCode::BAD_GATEWAY, Json(json!({"status": "error", "message": e.to_string()}))).into_response()
        }
    }
}

async fn discover(State(handle): State<Arc<WatcherHandle>>, headers: HeaderMap) -> Response {
    if let Err(response) = require_token(&handle, &headers) {
        return response;
    }
    match handle.rediscover_and_register().await {
        Ok(count) => Json(json!({"status": "ok", "probe_types": count})).into_response(),
        Err(e) => {
            warn!(error = %e, "rediscover failed");
            (StatusCode::BAD_GATEWAY, Json(json!({"status": "error", "message": e.to_string()}))).into_response()
        }
    }
}
