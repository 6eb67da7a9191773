//! Ingestion handlers (§4.7 / C7): the watcher-facing push API.

use crate::db;
use crate::db::models::WatcherRow;
use crate::interval::{self, Interval};
use crate::web::error::ApiError;
use crate::web::state::AppState;
use crate::web::sinks::{Notification, Priority};
use crate::web::status_change;
use crate::wire::{
    AlertRequest, ConfigPayload, HeartbeatRequest, MissedRunRequest, RegisterRequest,
    RegisterResponse, ResultRequest,
};
use axum::extract::{Extension, Path, State};
use axum::Json;

/// `POST /api/push/register`. No authentication header — the body token is
/// stored verbatim on the watcher row (§4.7).
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("watcher name must not be empty".into()));
    }

    let watcher = db::watchers::upsert_on_register(
        &state.pool,
        &body.name,
        &body.token,
        &body.version,
        body.callback_url.as_deref(),
    )
    .await?;

    let mut registered_probes = 0usize;
    for probe_type in &body.probe_types {
        let row = db::probe_types::upsert(
            &state.pool,
            &probe_type.name,
            &probe_type.version,
            &probe_type.description,
            &probe_type.arguments,
        )
        .await?;
        db::probe_types::bind_to_watcher(
            &state.pool,
            watcher.id,
            row.id,
            &probe_type.executable_path,
            probe_type.subcommand.as_deref(),
        )
        .await?;
        registered_probes += 1;
    }

    Ok(Json(RegisterResponse {
        watcher_id: watcher.id,
        registered_probes,
        approved: watcher.approved,
    }))
}

/// `POST /api/push/heartbeat`. `404` if the watcher name is unknown.
pub async fn heartbeat(
    State(state): State<AppState>,
    Json(body): Json<HeartbeatRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = db::watchers::touch_heartbeat(&state.pool, &body.name, &body.version).await?;
    if !updated {
        return Err(ApiError::NotFound("unknown watcher, register again"));
    }
    Ok(Json(serde_json::json!({"status": "ok"})))
}

/// `POST /api/push/result`. Requires an approved watcher token (enforced by
/// [`crate::web::auth::require_watcher_token`]).
pub async fn submit_result(
    State(state): State<AppState>,
    Extension(watcher): Extension<WatcherRow>,
    Json(body): Json<ResultRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let config = db::probe_configs::find_by_id(&state.pool, body.probe_config_id)
        .await?
        .ok_or(ApiError::NotFound("unknown probe config"))?;

    if config.watcher_id != Some(watcher.id) {
        return Err(ApiError::Forbidden("probe config belongs to another watcher"));
    }

    let next_run_at = match interval::parse(&config.interval) {
        Ok(parsed) => interval::derive_next_run(body.next_run, body.executed_at, parsed),
        Err(_) => body.next_run,
    };

    // The insert, the config's next_run_at update, and the status-change
    // lookup must all commit together or not at all (§4.7's ingestion
    // atomicity requirement) — a failed dispatch lookup must not leave a
    // result recorded with no chance of notifying on it.
    let mut tx = state.pool.begin().await?;

    db::results::insert(
        &mut *tx,
        db::results::NewResult {
            probe_config_id: body.probe_config_id,
            watcher_id: Some(watcher.id),
            status: body.status,
            message: &body.message,
            metrics: body.metrics.as_ref(),
            data: body.data.as_ref(),
            duration_ms: body.duration_ms,
            next_run_at,
            scheduled_at: body.scheduled_at,
            executed_at: body.executed_at,
        },
    )
    .await?;

    db::probe_configs::record_execution(&mut *tx, config.id, body.executed_at, next_run_at)
        .await?;

    status_change::evaluate(&mut tx, &state.dispatcher, &config, body.status).await?;

    tx.commit().await?;

    Ok(Json(serde_json::json!({"status": "ok"})))
}

/// `POST /api/push/alert` — external-source path, unauthenticated
/// (§4.7: "no authentication header" mirrors register's openness here by
/// design, since the source is identified by name rather than a watcher).
pub async fn alert(
    State(state): State<AppState>,
    Json(body): Json<AlertRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let config = db::probe_configs::find_or_create_external_alert_config(&state.pool, &body.source).await?;

    db::results::insert(
        &state.pool,
        db::results::NewResult {
            probe_config_id: config.id,
            watcher_id: None,
            status: body.status,
            message: &body.message,
            metrics: None,
            data: body.data.as_ref(),
            duration_ms: 0,
            next_run_at: None,
            scheduled_at: chrono::Utc::now(),
            executed_at: chrono::Utc::now(),
        },
    )
    .await?;

    let channel_ids = config.channel_ids();
    if body.status == crate::contract::Status::Critical && !channel_ids.is_empty() {
        let notification = Notification {
            probe_name: body.source.clone(),
            old_status: None,
            new_status: body.status,
            message: body.message.clone(),
            priority: Priority::Urgent,
        };
        state.dispatcher.dispatch(&channel_ids, notification).await;
    }

    Ok(Json(serde_json::json!({"status": "ok"})))
}

/// `GET /api/push/configs/{watcher}` — all enabled configs assigned to
/// that watcher, joined with the binding so the watcher can run them
/// without another round trip.
pub async fn get_configs(
    State(state): State<AppState>,
    Extension(watcher): Extension<WatcherRow>,
    Path(watcher_name): Path<String>,
) -> Result<Json<Vec<ConfigPayload>>, ApiError> {
    if watcher.name != watcher_name {
        return Err(ApiError::NotFound("unknown watcher"));
    }
    let rows = db::probe_configs::runnable_for_watcher(&state.pool, &watcher_name).await?;
    Ok(Json(rows.iter().map(ConfigPayload::from).collect()))
}

/// `POST /api/push/missed_run` — see [`MissedRunRequest`]'s doc comment for
/// why the watcher, not the server, is the one reporting this.
pub async fn missed_run(
    State(state): State<AppState>,
    Extension(watcher): Extension<WatcherRow>,
    Json(body): Json<MissedRunRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let config = db::probe_configs::find_by_id(&state.pool, body.probe_config_id)
        .await?
        .ok_or(ApiError::NotFound("unknown probe config"))?;

    if config.watcher_id != Some(watcher.id) {
        return Err(ApiError::Forbidden("probe config belongs to another watcher"));
    }

    db::missed_runs::record(
        &state.pool,
        body.probe_config_id,
        body.scheduled_at,
        db::missed_runs::Reason::WatcherDown,
    )
    .await?;
    Ok(Json(serde_json::json!({"status": "ok"})))
}
