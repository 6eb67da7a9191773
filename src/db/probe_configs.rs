//! Probe config CRUD (§3 "Probe Config", §4.7 `get-configs`, §4.12 read
//! API, §4.4 scheduler reload source).

use super::models::{ProbeConfigRow, RunnableConfigRow};
use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool};
use std::collections::BTreeSet;

pub const EXTERNAL_ALERT_PROBE_NAME: &str = "external-alert";
pub const EXTERNAL_ALERT_PROBE_VERSION: &str = "1.0.0";

pub struct NewConfig<'a> {
    pub probe_type_id: i64,
    pub watcher_id: Option<i64>,
    pub name: &'a str,
    pub enabled: bool,
    pub arguments: &'a serde_json::Value,
    pub interval: &'a str,
    pub timeout_seconds: i64,
    pub group_path: &'a str,
    pub keywords: &'a BTreeSet<String>,
    pub notification_channels: &'a [i64],
}

pub async fn create(pool: &SqlitePool, new: NewConfig<'_>) -> Result<ProbeConfigRow> {
    let now = Utc::now();
    let arguments_json = serde_json::to_string(new.arguments)?;
    let keywords_json = serde_json::to_string(new.keywords)?;
    let channels_json = serde_json::to_string(new.notification_channels)?;

    let id = sqlx::query(
        "INSERT INTO probe_configs (probe_type_id, watcher_id, name, enabled, arguments, \
         interval, timeout_seconds, next_run_at, last_executed_at, group_path, keywords, \
         notification_channels, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?, ?, ?, ?)",
    )
    .bind(new.probe_type_id)
    .bind(new.watcher_id)
    .bind(new.name)
    .bind(new.enabled)
    .bind(&arguments_json)
    .bind(new.interval)
    .bind(new.timeout_seconds)
    .bind(new.group_path)
    .bind(&keywords_json)
    .bind(&channels_json)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| crate::error::Error::msg("config vanished after insert"))
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<ProbeConfigRow>> {
    let row = sqlx::query_as::<_, ProbeConfigRow>("SELECT * FROM probe_configs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<ProbeConfigRow>> {
    let row = sqlx::query_as::<_, ProbeConfigRow>("SELECT * FROM probe_configs WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

#[derive(Debug, Default)]
pub struct ConfigFilter {
    pub watcher_id: Option<i64>,
    pub group_prefix: Option<String>,
    pub keywords: Vec<String>,
}

pub async fn list(pool: &SqlitePool, filter: &ConfigFilter) -> Result<Vec<ProbeConfigRow>> {
    let mut rows = sqlx::query_as::<_, ProbeConfigRow>("SELECT * FROM probe_configs ORDER BY id")
        .fetch_all(pool)
        .await?;

    if let Some(wid) = filter.watcher_id {
        rows.retain(|r| r.watcher_id == Some(wid));
    }
    if let Some(prefix) = &filter.group_prefix {
        rows.retain(|r| r.group_path.starts_with(prefix.as_str()));
    }
    if !filter.keywords.is_empty() {
        let wanted: BTreeSet<&str> = filter.keywords.iter().map(String::as_str).collect();
        rows.retain(|r| {
            let have = r.keywords_set();
            wanted.iter().any(|k| have.contains(*k))
        });
    }

    Ok(rows)
}

/// All enabled configs bound to `watcher_name`, joined with the
/// watcher-type binding so the watcher receives `executable_path` and
/// `subcommand` — the payload of `GET /api/push/configs/{watcher}`.
pub async fn runnable_for_watcher(
    pool: &SqlitePool,
    watcher_name: &str,
) -> Result<Vec<RunnableConfigRow>> {
    let rows = sqlx::query_as::<_, RunnableConfigRow>(
        "SELECT pc.id, pc.probe_type_id, pc.watcher_id, pc.name, pc.enabled, pc.arguments, \
                pc.interval, pc.timeout_seconds, pc.next_run_at, pc.last_executed_at, \
                pc.group_path, pc.keywords, pc.notification_channels, pc.created_at, \
                pc.updated_at, wpt.executable_path, wpt.subcommand, pt.name AS probe_type_name \
         FROM probe_configs pc \
         JOIN watchers w ON w.id = pc.watcher_id \
         JOIN watcher_probe_types wpt ON wpt.watcher_id = pc.watcher_id \
            AND wpt.probe_type_id = pc.probe_type_id \
         JOIN probe_types pt ON pt.id = pc.probe_type_id \
         WHERE w.name = ? AND pc.enabled = 1",
    )
    .bind(watcher_name)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn set_enabled(pool: &SqlitePool, id: i64, enabled: bool) -> Result<bool> {
    let result = sqlx::query("UPDATE probe_configs SET enabled = ?, updated_at = ? WHERE id = ?")
        .bind(enabled)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_next_run_at(
    pool: &SqlitePool,
    id: i64,
    next_run_at: Option<DateTime<Utc>>,
) -> Result<()> {
    sqlx::query("UPDATE probe_configs SET next_run_at = ?, updated_at = ? WHERE id = ?")
        .bind(next_run_at)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Generic over the executor so callers can run this inside the same
/// transaction as the result insert it follows (§4.7's ingestion
/// atomicity requirement).
pub async fn record_execution<'e, E>(
    executor: E,
    id: i64,
    executed_at: DateTime<Utc>,
    next_run_at: Option<DateTime<Utc>>,
) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE probe_configs SET last_executed_at = ?, next_run_at = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(executed_at)
    .bind(next_run_at)
    .bind(Utc::now())
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM probe_configs WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Looks up (or creates) the watcher-less config backing an external
/// alert source (§4.7 `POST /api/push/alert`). Creates the
/// `external-alert` probe type on first use.
pub async fn find_or_create_external_alert_config(
    pool: &SqlitePool,
    source: &str,
) -> Result<ProbeConfigRow> {
    if let Some(existing) = find_by_name(pool, source).await? {
        if existing.watcher_id.is_none() {
            return Ok(existing);
        }
    }

    let probe_type = super::probe_types::upsert(
        pool,
        EXTERNAL_ALERT_PROBE_NAME,
        EXTERNAL_ALERT_PROBE_VERSION,
        "synthetic probe type backing externally-sourced alerts",
        &crate::contract::ArgumentSchema::default(),
    )
    .await?;

    create(
        pool,
        NewConfig {
            probe_type_id: probe_type.id,
            watcher_id: None,
            name: source,
            enabled: true,
            arguments: &serde_json::json!({}),
            interval: "0",
            timeout_seconds: 0,
            group_path: "external",
            keywords: &BTreeSet::new(),
            notification_channels: &[],
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool_for_tests;

    #[tokio::test]
    async fn external_alert_config_is_created_once() {
        let pool = memory_pool_for_tests().await;
        let a = find_or_create_external_alert_config(&pool, "ci").await.unwrap();
        let b = find_or_create_external_alert_config(&pool, "ci").await.unwrap();
        assert_eq!(a.id, b.id);
        assert!(a.watcher_id.is_none());
    }

    #[tokio::test]
    async fn keyword_filter_matches_intersection() {
        let pool = memory_pool_for_tests().await;
        let pt = crate::db::probe_types::upsert(
            &pool,
            "disk-space",
            "1.0.0",
            "d",
            &crate::contract::ArgumentSchema::default(),
        )
        .await
        .unwrap();

        let mut kw = BTreeSet::new();
        kw.insert("prod".to_string());
        kw.insert("disk".to_string());

        create(
            &pool,
            NewConfig {
                probe_type_id: pt.id,
                watcher_id: None,
                name: "root-disk",
                enabled: true,
                arguments: &serde_json::json!({}),
                interval: "5m",
                timeout_seconds: 0,
                group_path: "hosts/a",
                keywords: &kw,
                notification_channels: &[],
            },
        )
        .await
        .unwrap();

        let filter = ConfigFilter {
            keywords: vec!["prod".to_string()],
            ..Default::default()
        };
        let found = list(&pool, &filter).await.unwrap();
        assert_eq!(found.len(), 1);

        let filter = ConfigFilter {
            keywords: vec!["staging".to_string()],
            ..Default::default()
        };
        assert!(list(&pool, &filter).await.unwrap().is_empty());
    }
}
