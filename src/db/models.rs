//! Row types. JSON-valued columns are kept as raw `String` here; callers
//! that need typed access parse them explicitly (see `json` helpers below).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WatcherRow {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub approved: bool,
    pub paused: bool,
    pub version: String,
    pub callback_url: Option<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProbeTypeRow {
    pub id: i64,
    pub name: String,
    pub version: String,
    pub description: String,
    pub arguments: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WatcherProbeTypeRow {
    pub watcher_id: i64,
    pub probe_type_id: i64,
    pub executable_path: String,
    pub subcommand: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProbeConfigRow {
    pub id: i64,
    pub probe_type_id: i64,
    pub watcher_id: Option<i64>,
    pub name: String,
    pub enabled: bool,
    pub arguments: String,
    pub interval: String,
    pub timeout_seconds: i64,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub group_path: String,
    pub keywords: String,
    pub notification_channels: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProbeConfigRow {
    #[must_use]
    pub fn keywords_set(&self) -> std::collections::BTreeSet<String> {
        serde_json::from_str(&self.keywords).unwrap_or_default()
    }

    #[must_use]
    pub fn channel_ids(&self) -> Vec<i64> {
        serde_json::from_str(&self.notification_channels).unwrap_or_default()
    }

    #[must_use]
    pub fn arguments_map(&self) -> serde_json::Map<String, serde_json::Value> {
        serde_json::from_str(&self.arguments).unwrap_or_default()
    }
}

/// A config joined with its watcher-type binding, as returned to a watcher
/// polling `GET /api/push/configs/{watcher}` — it needs `executable_path`
/// and `subcommand` to run the probe at all.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RunnableConfigRow {
    pub id: i64,
    pub probe_type_id: i64,
    pub watcher_id: Option<i64>,
    pub name: String,
    pub enabled: bool,
    pub arguments: String,
    pub interval: String,
    pub timeout_seconds: i64,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub group_path: String,
    pub keywords: String,
    pub notification_channels: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub executable_path: String,
    pub subcommand: Option<String>,
    pub probe_type_name: String,
}

impl RunnableConfigRow {
    #[must_use]
    pub fn arguments_map(&self) -> serde_json::Map<String, serde_json::Value> {
        serde_json::from_str(&self.arguments).unwrap_or_default()
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProbeResultRow {
    pub id: i64,
    pub probe_config_id: i64,
    pub watcher_id: Option<i64>,
    pub status: String,
    pub message: String,
    pub metrics: Option<String>,
    pub data: Option<String>,
    pub duration_ms: i64,
    pub next_run_at: Option<DateTime<Utc>>,
    pub scheduled_at: DateTime<Utc>,
    pub executed_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationChannelRow {
    pub id: i64,
    pub name: String,
    #[sqlx(rename = "type")]
    pub channel_type: String,
    pub config: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MissedRunRow {
    pub id: i64,
    pub probe_config_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub reason: String,
}
