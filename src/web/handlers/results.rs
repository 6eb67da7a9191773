//! Read API: results (§4.12) — list (filtered), latest per config,
//! aggregate status counts.

use crate::contract::Status;
use crate::db;
use crate::db::models::ProbeResultRow;
use crate::db::results::{ResultFilter, StatusCount};
use crate::web::error::ApiError;
use crate::web::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

const DEFAULT_LIMIT: i64 = 200;

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub probe_config_id: Option<i64>,
    #[serde(default)]
    pub status: Vec<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ProbeResultRow>>, ApiError> {
    let statuses = query
        .status
        .iter()
        .filter_map(|s| s.parse::<Status>().ok())
        .collect();

    let filter = ResultFilter {
        probe_config_id: query.probe_config_id,
        statuses,
        since: query.since,
    };
    let rows = db::results::list(&state.pool, &filter, query.limit.unwrap_or(DEFAULT_LIMIT)).await?;
    Ok(Json(rows))
}

pub async fn latest(State(state): State<AppState>) -> Result<Json<Vec<ProbeResultRow>>, ApiError> {
    Ok(Json(db::results::latest_per_config(&state.pool).await?))
}

pub async fn aggregate(State(state): State<AppState>) -> Result<Json<Vec<StatusCount>>, ApiError> {
    Ok(Json(db::results::aggregate_status_counts(&state.pool).await?))
}
