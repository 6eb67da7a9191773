//! Read API: probe types (§4.12) — list, optionally filtered by watcher.

use crate::db;
use crate::db::models::ProbeTypeRow;
use crate::web::error::ApiError;
use crate::web::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub watcher_id: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ProbeTypeRow>>, ApiError> {
    Ok(Json(db::probe_types::list(&state.pool, query.watcher_id).await?))
}
