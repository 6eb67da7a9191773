//! Missed-run breadcrumbs (§3 "Missed Run", §4.4 startup detection).
//! Diagnostic only — runs are never backfilled.

use super::models::MissedRunRow;
use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    WatcherDown,
    Timeout,
    Error,
}

impl Reason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WatcherDown => "watcher_down",
            Self::Timeout => "timeout",
            Self::Error => "error",
        }
    }
}

pub async fn record(
    pool: &SqlitePool,
    probe_config_id: i64,
    scheduled_at: DateTime<Utc>,
    reason: Reason,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO missed_runs (probe_config_id, scheduled_at, reason) VALUES (?, ?, ?)",
    )
    .bind(probe_config_id)
    .bind(scheduled_at)
    .bind(reason.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_for_config(pool: &SqlitePool, probe_config_id: i64) -> Result<Vec<MissedRunRow>> {
    let rows = sqlx::query_as::<_, MissedRunRow>(
        "SELECT * FROM missed_runs WHERE probe_config_id = ? ORDER BY scheduled_at DESC",
    )
    .bind(probe_config_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
