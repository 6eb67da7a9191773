//! Read API: notification channels (§4.12) — CRUD and test.

use crate::db;
use crate::db::models::NotificationChannelRow;
use crate::web::error::ApiError;
use crate::web::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<NotificationChannelRow>>, ApiError> {
    Ok(Json(db::channels::list(&state.pool).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<NotificationChannelRow>, ApiError> {
    db::channels::find_by_id(&state.pool, id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("unknown channel"))
}

#[derive(Debug, Deserialize)]
pub struct ChannelBody {
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    pub config: serde_json::Value,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<ChannelBody>,
) -> Result<Json<NotificationChannelRow>, ApiError> {
    let row = db::channels::create(&state.pool, &body.name, &body.channel_type, &body.config, body.enabled).await?;
    state.dispatcher.reload().await?;
    Ok(Json(row))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ChannelBody>,
) -> Result<Json<NotificationChannelRow>, ApiError> {
    if !db::channels::update(&state.pool, id, &body.name, &body.channel_type, &body.config, body.enabled).await? {
        return Err(ApiError::NotFound("unknown channel"));
    }
    state.dispatcher.reload().await?;
    db::channels::find_by_id(&state.pool, id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("unknown channel"))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !db::channels::delete(&state.pool, id).await? {
        return Err(ApiError::NotFound("unknown channel"));
    }
    state.dispatcher.reload().await?;
    Ok(Json(serde_json::json!({"status": "ok"})))
}

/// `POST /api/channels/{id}/test` — sends a synthetic notification through
/// the live sink so an operator can validate config without waiting for a
/// real status transition.
pub async fn test(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sent = state.dispatcher.test_channel(id).await?;
    if !sent {
        return Err(ApiError::NotFound("unknown or disabled channel"));
    }
    Ok(Json(serde_json::json!({"status": "ok"})))
}
