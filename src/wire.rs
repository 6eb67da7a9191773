//! Wire formats (§6): the JSON bodies exchanged between watcher and web
//! service over HTTP. Shared by both sides so the schema is defined once.

use crate::contract::{ArgumentSchema, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterProbeType {
    pub name: String,
    pub version: String,
    pub description: String,
    pub arguments: ArgumentSchema,
    pub executable_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcommand: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub version: String,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub probe_types: Vec<RegisterProbeType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub watcher_id: i64,
    pub registered_probes: usize,
    pub approved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRequest {
    pub watcher: String,
    pub probe_config_id: i64,
    pub status: Status,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub duration_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
    pub scheduled_at: DateTime<Utc>,
    pub executed_at: DateTime<Utc>,
}

/// Reported by a watcher at startup when its schedule shows a config was
/// due more than one interval ago (§4.4 missed-run detection). The
/// `missed_runs` table is server-owned (§3); the watcher is simply the
/// natural place to detect the gap, since it is the one reconstructing
/// its schedule from scratch on every start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissedRunRequest {
    pub watcher: String,
    pub probe_config_id: i64,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRequest {
    pub source: String,
    pub status: Status,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// One entry in the `GET /api/push/configs/{watcher}` response: enough for
/// the watcher to schedule and execute the probe without another round
/// trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigPayload {
    pub id: i64,
    pub name: String,
    pub probe_type_name: String,
    pub executable_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcommand: Option<String>,
    pub arguments: BTreeMap<String, serde_json::Value>,
    pub interval: String,
    pub timeout_seconds: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_executed_at: Option<DateTime<Utc>>,
}

impl From<&crate::db::models::RunnableConfigRow> for ConfigPayload {
    fn from(row: &crate::db::models::RunnableConfigRow) -> Self {
        let arguments = row
            .arguments_map()
            .into_iter()
            .collect::<BTreeMap<_, _>>();
        Self {
            id: row.id,
            name: row.name.clone(),
            probe_type_name: row.probe_type_name.clone(),
            executable_path: row.executable_path.clone(),
            subcommand: row.subcommand.clone(),
            arguments,
            interval: row.interval.clone(),
            timeout_seconds: row.timeout_seconds,
            next_run_at: row.next_run_at,
            last_executed_at: row.last_executed_at,
        }
    }
}
