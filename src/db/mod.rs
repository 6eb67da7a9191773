//! Sqlite-backed store for the web service and the watcher's local
//! schedule cache. JSON-valued columns (`arguments`, `metrics`, `data`,
//! `keywords`, `notification_channels`, `config`) are stored as opaque
//! TEXT and parsed only where a consumer needs typed access, per the
//! design note in spec §9.

pub mod channels;
pub mod missed_runs;
pub mod models;
pub mod probe_configs;
pub mod probe_types;
pub mod results;
pub mod watchers;

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// Opens (creating if absent) the sqlite database at `path` with foreign
/// keys and WAL mode enabled, and a connection pool sized for a
/// single-process server with concurrent readers and writers (watcher
/// pushes and the admin API both hit this pool at once).
pub async fn connect(path: &str) -> Result<SqlitePool> {
    info!(db = %path, "opening store");
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{path}"))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Idempotent schema creation — safe to call on every startup, and the
/// body of the `migrate` CLI subcommand (§11.1 of SPEC_FULL.md).
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS watchers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            token TEXT NOT NULL,
            approved INTEGER NOT NULL DEFAULT 0,
            paused INTEGER NOT NULL DEFAULT 0,
            version TEXT NOT NULL DEFAULT '',
            callback_url TEXT,
            last_seen_at TEXT,
            registered_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS probe_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            version TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            arguments TEXT NOT NULL DEFAULT '{}',
            UNIQUE(name, version)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS watcher_probe_types (
            watcher_id INTEGER NOT NULL REFERENCES watchers(id) ON DELETE CASCADE,
            probe_type_id INTEGER NOT NULL REFERENCES probe_types(id) ON DELETE CASCADE,
            executable_path TEXT NOT NULL,
            subcommand TEXT,
            PRIMARY KEY (watcher_id, probe_type_id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS probe_configs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            probe_type_id INTEGER NOT NULL REFERENCES probe_types(id) ON DELETE CASCADE,
            watcher_id INTEGER REFERENCES watchers(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            arguments TEXT NOT NULL DEFAULT '{}',
            interval TEXT NOT NULL DEFAULT '0',
            timeout_seconds INTEGER NOT NULL DEFAULT 0,
            next_run_at TEXT,
            last_executed_at TEXT,
            group_path TEXT NOT NULL DEFAULT '',
            keywords TEXT NOT NULL DEFAULT '[]',
            notification_channels TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS probe_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            probe_config_id INTEGER NOT NULL REFERENCES probe_configs(id) ON DELETE CASCADE,
            watcher_id INTEGER REFERENCES watchers(id) ON DELETE CASCADE,
            status TEXT NOT NULL,
            message TEXT NOT NULL DEFAULT '',
            metrics TEXT,
            data TEXT,
            duration_ms INTEGER NOT NULL DEFAULT 0,
            next_run_at TEXT,
            scheduled_at TEXT NOT NULL,
            executed_at TEXT NOT NULL,
            recorded_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_results_config_executed \
         ON probe_results (probe_config_id, executed_at DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS notification_channels (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            config TEXT NOT NULL DEFAULT '{}',
            enabled INTEGER NOT NULL DEFAULT 1
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS missed_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            probe_config_id INTEGER NOT NULL REFERENCES probe_configs(id) ON DELETE CASCADE,
            scheduled_at TEXT NOT NULL,
            reason TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    info!("store schema is up to date");
    Ok(())
}

#[cfg(test)]
pub async fn memory_pool_for_tests() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite pool");
    migrate(&pool).await.expect("migrate test pool");
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let pool = memory_pool_for_tests().await;
        migrate(&pool).await.unwrap();
        migrate(&pool).await.unwrap();

        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM watchers")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }
}
