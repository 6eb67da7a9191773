//! Read API: probe configs (§4.12) — list, create, get, update, delete,
//! set-enabled, run-now.

use crate::db;
use crate::db::models::ProbeConfigRow;
use crate::db::probe_configs::ConfigFilter;
use crate::web::error::ApiError;
use crate::web::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use std::collections::BTreeSet;

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub watcher_id: Option<i64>,
    pub group_prefix: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ProbeConfigRow>>, ApiError> {
    let filter = ConfigFilter {
        watcher_id: query.watcher_id,
        group_prefix: query.group_prefix,
        keywords: query.keywords,
    };
    Ok(Json(db::probe_configs::list(&state.pool, &filter).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ProbeConfigRow>, ApiError> {
    db::probe_configs::find_by_id(&state.pool, id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("unknown probe config"))
}

#[derive(Debug, Deserialize)]
pub struct ConfigBody {
    pub probe_type_id: i64,
    pub watcher_id: Option<i64>,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub arguments: serde_json::Value,
    pub interval: String,
    #[serde(default)]
    pub timeout_seconds: i64,
    #[serde(default)]
    pub group_path: String,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default)]
    pub notification_channels: Vec<i64>,
}

fn default_true() -> bool {
    true
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<ConfigBody>,
) -> Result<Json<ProbeConfigRow>, ApiError> {
    let row = db::probe_configs::create(
        &state.pool,
        db::probe_configs::NewConfig {
            probe_type_id: body.probe_type_id,
            watcher_id: body.watcher_id,
            name: &body.name,
            enabled: body.enabled,
            arguments: &body.arguments,
            interval: &body.interval,
            timeout_seconds: body.timeout_seconds,
            group_path: &body.group_path,
            keywords: &body.keywords,
            notification_channels: &body.notification_channels,
        },
    )
    .await?;
    Ok(Json(row))
}

/// `PUT /api/probe_configs/{id}` — full replace of the mutable fields.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ConfigBody>,
) -> Result<Json<ProbeConfigRow>, ApiError> {
    db::probe_configs::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("unknown probe config"))?;

    sqlx::query(
        "UPDATE probe_configs SET probe_type_id = ?, watcher_id = ?, name = ?, enabled = ?, \
         arguments = ?, interval = ?, timeout_seconds = ?, group_path = ?, keywords = ?, \
         notification_channels = ?, updated_at = ? WHERE id = ?",
    )
    .bind(body.probe_type_id)
    .bind(body.watcher_id)
    .bind(&body.name)
    .bind(body.enabled)
    .bind(serde_json::to_string(&body.arguments)?)
    .bind(&body.interval)
    .bind(body.timeout_seconds)
    .bind(&body.group_path)
    .bind(serde_json::to_string(&body.keywords)?)
    .bind(serde_json::to_string(&body.notification_channels)?)
    .bind(chrono::Utc::now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    db::probe_configs::find_by_id(&state.pool, id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("unknown probe config"))
}

#[derive(Debug, Deserialize)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

pub async fn set_enabled(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<SetEnabledRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !db::probe_configs::set_enabled(&state.pool, id, body.enabled).await? {
        return Err(ApiError::NotFound("unknown probe config"));
    }
    Ok(Json(serde_json::json!({"status": "ok"})))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !db::probe_configs::delete(&state.pool, id).await? {
        return Err(ApiError::NotFound("unknown probe config"));
    }
    Ok(Json(serde_json::json!({"status": "ok"})))
}

/// `POST /api/probe_configs/{id}/run-now`. Attempts to call the owning
/// watcher's `callback_url/trigger/{id}` directly; on any failure (or when
/// no callback URL is advertised) falls back to `next_run_at = now()` so
/// the watcher picks it up on its next poll cycle (§4.12, §9's cyclic-
/// reference break).
pub async fn run_now(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let config = db::probe_configs::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("unknown probe config"))?;

    let callback = match config.watcher_id {
        Some(watcher_id) => db::watchers::find_by_id(&state.pool, watcher_id)
            .await?
            .and_then(|w| w.callback_url),
        None => None,
    };

    let triggered = if let Some(callback_url) = callback {
        let client = reqwest::Client::new();
        let url = format!("{}/trigger/{id}", callback_url.trim_end_matches('/'));
        client.post(url).send().await.is_ok_and(|r| r.status().is_success())
    } else {
        false
    };

    if !triggered {
        db::probe_configs::set_next_run_at(&state.pool, id, Some(chrono::Utc::now())).await?;
    }

    Ok(Json(serde_json::json!({"status": "ok", "triggered_directly": triggered})))
}
