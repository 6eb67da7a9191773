//! Admission (§4.7): a single shared admin token authenticates UI-scoped
//! endpoints; a per-watcher token authenticates watcher-scoped endpoints.

use crate::web::state::AppState;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::error::ApiError;

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

/// Gate for the admin-scoped UI/read API: the bearer token must equal the
/// server's configured `AUTH_TOKEN` exactly.
pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match bearer_token(&req) {
        Some(token) if token == state.admin_token.as_ref() => next.run(req).await,
        _ => ApiError::Unauthorized("admin token required").into_response(),
    }
}

/// Takes an already-extracted bearer token rather than the whole request, so
/// the caller doesn't need to hold a `&Request` borrow across the lookup's
/// `.await` (`axum::body::Body` is not `Sync`, so doing that would make the
/// enclosing middleware future non-`Send`, which `from_fn_with_state`
/// requires).
async fn resolve_watcher(state: &AppState, token: &str) -> Result<crate::db::models::WatcherRow, Response> {
    match crate::db::watchers::find_by_token(&state.pool, token).await {
        Ok(Some(watcher)) => Ok(watcher),
        Ok(None) => Err(ApiError::Unauthorized("unknown token").into_response()),
        Err(e) => Err(ApiError::from(e).into_response()),
    }
}

/// Gate for watcher-scoped endpoints that carry no data an unapproved
/// watcher could use to pollute state — currently just heartbeat (§12's
/// "Heartbeat approval" decision: liveness-only, no approval required).
///
/// On success, the resolved [`WatcherRow`] is inserted into request
/// extensions for the handler to read.
pub async fn require_watcher_token(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&req) else {
        return ApiError::Unauthorized("bearer token required").into_response();
    };
    match resolve_watcher(&state, &token).await {
        Ok(watcher) => {
            req.extensions_mut().insert(watcher);
            next.run(req).await
        }
        Err(response) => response,
    }
}

/// Gate for watcher-scoped endpoints that DO require approval: result
/// submission and config fetch, since either could pollute state or leak
/// configuration to an unvetted watcher (§4.7's one-way approval gate).
pub async fn require_approved_watcher(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&req) else {
        return ApiError::Unauthorized("bearer token required").into_response();
    };
    match resolve_watcher(&state, &token).await {
        Ok(watcher) if !watcher.approved => ApiError::Forbidden("watcher is not approved").into_response(),
        Ok(watcher) => {
            req.extensions_mut().insert(watcher);
            next.run(req).await
        }
        Err(response) => response,
    }
}
