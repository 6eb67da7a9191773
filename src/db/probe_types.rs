//! Probe type and watcher-probe-type binding CRUD (§3, §4.7 register).

use super::models::{ProbeTypeRow, WatcherProbeTypeRow};
use crate::contract::ArgumentSchema;
use crate::error::Result;
use sqlx::SqlitePool;

/// Upserts a probe type by `(name, version)`. The pair is immutable once
/// created; `description`/`arguments` are updated on conflict (§3: "a new
/// version is a new row", but the same version re-describing itself is a
/// silent update of mutable fields per the Conflict row in spec §7).
pub async fn upsert(
    pool: &SqlitePool,
    name: &str,
    version: &str,
    description: &str,
    arguments: &ArgumentSchema,
) -> Result<ProbeTypeRow> {
    let arguments_json = serde_json::to_string(arguments)?;

    sqlx::query(
        "INSERT INTO probe_types (name, version, description, arguments) VALUES (?, ?, ?, ?) \
         ON CONFLICT(name, version) DO UPDATE SET description = excluded.description, \
         arguments = excluded.arguments",
    )
    .bind(name)
    .bind(version)
    .bind(description)
    .bind(&arguments_json)
    .execute(pool)
    .await?;

    find_by_name_version(pool, name, version)
        .await?
        .ok_or_else(|| crate::error::Error::msg("probe type vanished after upsert"))
}

pub async fn find_by_name_version(
    pool: &SqlitePool,
    name: &str,
    version: &str,
) -> Result<Option<ProbeTypeRow>> {
    let row = sqlx::query_as::<_, ProbeTypeRow>(
        "SELECT * FROM probe_types WHERE name = ? AND version = ?",
    )
    .bind(name)
    .bind(version)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<ProbeTypeRow>> {
    let row = sqlx::query_as::<_, ProbeTypeRow>("SELECT * FROM probe_types WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Lists all probe types, optionally restricted to those bound to a given
/// watcher (§4.12's "list (optionally filtered by watcher)").
pub async fn list(pool: &SqlitePool, watcher_id: Option<i64>) -> Result<Vec<ProbeTypeRow>> {
    let rows = if let Some(wid) = watcher_id {
        sqlx::query_as::<_, ProbeTypeRow>(
            "SELECT pt.* FROM probe_types pt \
             JOIN watcher_probe_types wpt ON wpt.probe_type_id = pt.id \
             WHERE wpt.watcher_id = ? ORDER BY pt.name, pt.version",
        )
        .bind(wid)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, ProbeTypeRow>("SELECT * FROM probe_types ORDER BY name, version")
            .fetch_all(pool)
            .await?
    };
    Ok(rows)
}

/// Upserts the `(watcher_id, probe_type_id)` binding with the executable
/// location the watcher advertised.
pub async fn bind_to_watcher(
    pool: &SqlitePool,
    watcher_id: i64,
    probe_type_id: i64,
    executable_path: &str,
    subcommand: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO watcher_probe_types (watcher_id, probe_type_id, executable_path, subcommand) \
         VALUES (?, ?, ?, ?) \
         ON CONFLICT(watcher_id, probe_type_id) DO UPDATE SET \
         executable_path = excluded.executable_path, subcommand = excluded.subcommand",
    )
    .bind(watcher_id)
    .bind(probe_type_id)
    .bind(executable_path)
    .bind(subcommand)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn bindings_for_watcher(
    pool: &SqlitePool,
    watcher_id: i64,
) -> Result<Vec<WatcherProbeTypeRow>> {
    let rows = sqlx::query_as::<_, WatcherProbeTypeRow>(
        "SELECT * FROM watcher_probe_types WHERE watcher_id = ?",
    )
    .bind(watcher_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool_for_tests;

    #[tokio::test]
    async fn upsert_is_keyed_on_name_and_version() {
        let pool = memory_pool_for_tests().await;
        let schema = ArgumentSchema::default();

        upsert(&pool, "disk-space", "1.0.0", "checks disk", &schema).await.unwrap();
        upsert(&pool, "disk-space", "1.0.0", "checks disk v2", &schema).await.unwrap();
        upsert(&pool, "disk-space", "2.0.0", "checks disk", &schema).await.unwrap();

        let all = list(&pool, None).await.unwrap();
        assert_eq!(all.len(), 2);
        let v1 = find_by_name_version(&pool, "disk-space", "1.0.0").await.unwrap().unwrap();
        assert_eq!(v1.description, "checks disk v2");
    }
}
