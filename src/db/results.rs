//! Probe result storage (§3 "Probe Result", §4.7 ingestion, §4.8
//! status-change detection, §4.12 read API).
//!
//! Append-only: rows are never updated or deleted individually (config
//! deletion cascades per §3's ownership rule).

use super::models::ProbeResultRow;
use crate::contract::Status;
use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool};

pub struct NewResult<'a> {
    pub probe_config_id: i64,
    pub watcher_id: Option<i64>,
    pub status: Status,
    pub message: &'a str,
    pub metrics: Option<&'a serde_json::Value>,
    pub data: Option<&'a serde_json::Value>,
    pub duration_ms: i64,
    pub next_run_at: Option<DateTime<Utc>>,
    pub scheduled_at: DateTime<Utc>,
    pub executed_at: DateTime<Utc>,
}

/// Generic over the executor so callers can run this inside a transaction
/// (§4.7's ingestion atomicity requirement) or directly against the pool.
pub async fn insert<'e, E>(executor: E, new: NewResult<'_>) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let metrics_json = new.metrics.map(serde_json::to_string).transpose()?;
    let data_json = new.data.map(serde_json::to_string).transpose()?;
    let recorded_at = Utc::now();

    sqlx::query(
        "INSERT INTO probe_results (probe_config_id, watcher_id, status, message, metrics, \
         data, duration_ms, next_run_at, scheduled_at, executed_at, recorded_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(new.probe_config_id)
    .bind(new.watcher_id)
    .bind(new.status.as_str())
    .bind(new.message)
    .bind(&metrics_json)
    .bind(&data_json)
    .bind(new.duration_ms)
    .bind(new.next_run_at)
    .bind(new.scheduled_at)
    .bind(new.executed_at)
    .bind(recorded_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<ProbeResultRow>> {
    let row = sqlx::query_as::<_, ProbeResultRow>("SELECT * FROM probe_results WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// The most recent result for a config ordered by `executed_at DESC`
/// (watcher-assigned, monotone within a watcher per §5), `offset` rows in —
/// `offset=0` is "latest", `offset=1` is "previous", matching §4.8 step 1.
pub async fn nth_most_recent<'e, E>(
    executor: E,
    probe_config_id: i64,
    offset: i64,
) -> Result<Option<ProbeResultRow>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, ProbeResultRow>(
        "SELECT * FROM probe_results WHERE probe_config_id = ? \
         ORDER BY executed_at DESC LIMIT 1 OFFSET ?",
    )
    .bind(probe_config_id)
    .bind(offset)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

#[derive(Debug, Default)]
pub struct ResultFilter {
    pub probe_config_id: Option<i64>,
    pub statuses: Vec<Status>,
    pub since: Option<DateTime<Utc>>,
}

pub async fn list(pool: &SqlitePool, filter: &ResultFilter, limit: i64) -> Result<Vec<ProbeResultRow>> {
    let mut rows = sqlx::query_as::<_, ProbeResultRow>(
        "SELECT * FROM probe_results ORDER BY executed_at DESC LIMIT ?",
    )
    .bind(limit.max(1))
    .fetch_all(pool)
    .await?;

    if let Some(id) = filter.probe_config_id {
        rows.retain(|r| r.probe_config_id == id);
    }
    if !filter.statuses.is_empty() {
        let wanted: Vec<&str> = filter.statuses.iter().map(|s| s.as_str()).collect();
        rows.retain(|r| wanted.contains(&r.status.as_str()));
    }
    if let Some(since) = filter.since {
        rows.retain(|r| r.executed_at >= since);
    }

    Ok(rows)
}

/// One row per config: its latest result, for the read API's dashboard
/// view (§4.12 "latest per config").
pub async fn latest_per_config(pool: &SqlitePool) -> Result<Vec<ProbeResultRow>> {
    let rows = sqlx::query_as::<_, ProbeResultRow>(
        "SELECT r.* FROM probe_results r \
         INNER JOIN ( \
             SELECT probe_config_id, MAX(executed_at) AS max_executed_at \
             FROM probe_results GROUP BY probe_config_id \
         ) latest ON latest.probe_config_id = r.probe_config_id \
             AND latest.max_executed_at = r.executed_at",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Aggregate status counts across the latest result per config, for the
/// read API's fleet-summary view (§4.12).
pub async fn aggregate_status_counts(pool: &SqlitePool) -> Result<Vec<StatusCount>> {
    let latest = latest_per_config(pool).await?;
    let mut counts: std::collections::BTreeMap<String, i64> = std::collections::BTreeMap::new();
    for row in latest {
        *counts.entry(row.status).or_insert(0) += 1;
    }
    Ok(counts
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool_for_tests;
    use std::collections::BTreeSet;

    async fn make_config(pool: &SqlitePool) -> i64 {
        let pt = crate::db::probe_types::upsert(
            pool,
            "disk-space",
            "1.0.0",
            "d",
            &crate::contract::ArgumentSchema::default(),
        )
        .await
        .unwrap();
        crate::db::probe_configs::create(
            pool,
            crate::db::probe_configs::NewConfig {
                probe_type_id: pt.id,
                watcher_id: None,
                name: "root-disk",
                enabled: true,
                arguments: &serde_json::json!({}),
                interval: "5m",
                timeout_seconds: 0,
                group_path: "",
                keywords: &BTreeSet::new(),
                notification_channels: &[],
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn ordering_is_by_executed_at_descending() {
        let pool = memory_pool_for_tests().await;
        let config_id = make_config(&pool).await;

        let t0: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        let t1: DateTime<Utc> = "2024-01-01T00:05:00Z".parse().unwrap();

        insert(
            &pool,
            NewResult {
                probe_config_id: config_id,
                watcher_id: None,
                status: Status::Ok,
                message: "first",
                metrics: None,
                data: None,
                duration_ms: 5,
                next_run_at: None,
                scheduled_at: t0,
                executed_at: t0,
            },
        )
        .await
        .unwrap();

        insert(
            &pool,
            NewResult {
                probe_config_id: config_id,
                watcher_id: None,
                status: Status::Critical,
                message: "second",
                metrics: None,
                data: None,
                duration_ms: 5,
                next_run_at: None,
                scheduled_at: t1,
                executed_at: t1,
            },
        )
        .await
        .unwrap();

        let latest = nth_most_recent(&pool, config_id, 0).await.unwrap().unwrap();
        assert_eq!(latest.message, "second");
        let previous = nth_most_recent(&pool, config_id, 1).await.unwrap().unwrap();
        assert_eq!(previous.message, "first");
    }
}
