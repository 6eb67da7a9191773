//! Read API: watchers (§4.12) — list, get, delete, set-paused.

use crate::db;
use crate::db::models::WatcherRow;
use crate::web::error::ApiError;
use crate::web::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<WatcherRow>>, ApiError> {
    Ok(Json(db::watchers::list(&state.pool).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<WatcherRow>, ApiError> {
    db::watchers::find_by_id(&state.pool, id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("unknown watcher"))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !db::watchers::delete(&state.pool, id).await? {
        return Err(ApiError::NotFound("unknown watcher"));
    }
    Ok(Json(serde_json::json!({"status": "ok"})))
}

#[derive(Debug, Deserialize)]
pub struct SetPausedRequest {
    pub paused: bool,
}

/// `PUT /api/watchers/{id}/paused` — toggling off also sets `approved=true`
/// on first unpause (§4.7's approval gesture).
pub async fn set_paused(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<SetPausedRequest>,
) -> Result<Json<WatcherRow>, ApiError> {
    db::watchers::set_paused(&state.pool, id, body.paused)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("unknown watcher"))
}
