//! Watcher CRUD (§3 "Watcher", §4.7 register/heartbeat, §4.12 read API).

use super::models::WatcherRow;
use crate::error::Result;
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool};

/// Upserts a watcher by `name`. First-seen rows are created with
/// `approved=false`; subsequent calls update token/version/callback/
/// last_seen but never silently flip `approved` — the admin approval gate
/// in §4.7 is a one-way door.
pub async fn upsert_on_register(
    pool: &SqlitePool,
    name: &str,
    token: &str,
    version: &str,
    callback_url: Option<&str>,
) -> Result<WatcherRow> {
    let now = Utc::now();

    if let Some(existing) = find_by_name(pool, name).await? {
        sqlx::query(
            "UPDATE watchers SET token = ?, version = ?, callback_url = ?, last_seen_at = ? \
             WHERE id = ?",
        )
        .bind(token)
        .bind(version)
        .bind(callback_url)
        .bind(now)
        .bind(existing.id)
        .execute(pool)
        .await?;
    } else {
        sqlx::query(
            "INSERT INTO watchers (name, token, approved, paused, version, callback_url, \
             last_seen_at, registered_at) VALUES (?, ?, 0, 0, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(token)
        .bind(version)
        .bind(callback_url)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;
    }

    find_by_name(pool, name)
        .await?
        .ok_or_else(|| crate::error::Error::msg("watcher vanished after upsert"))
}

pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<WatcherRow>> {
    let row = sqlx::query_as::<_, WatcherRow>("SELECT * FROM watchers WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Generic over the executor so the status-change detector can run this
/// inside the same transaction as the result insert it follows.
pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<WatcherRow>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, WatcherRow>("SELECT * FROM watchers WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn find_by_token(pool: &SqlitePool, token: &str) -> Result<Option<WatcherRow>> {
    let row = sqlx::query_as::<_, WatcherRow>("SELECT * FROM watchers WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn touch_heartbeat(pool: &SqlitePool, name: &str, version: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE watchers SET last_seen_at = ?, version = ? WHERE name = ?")
        .bind(Utc::now())
        .bind(version)
        .bind(name)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<WatcherRow>> {
    let rows = sqlx::query_as::<_, WatcherRow>("SELECT * FROM watchers ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM watchers WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Toggles `paused`. Per §4.7, unpausing a previously-unapproved watcher is
/// also the approval gesture — set `approved=true` the first time it is
/// unpaused.
pub async fn set_paused(pool: &SqlitePool, id: i64, paused: bool) -> Result<Option<WatcherRow>> {
    let Some(watcher) = find_by_id(pool, id).await? else {
        return Ok(None);
    };

    if paused {
        sqlx::query("UPDATE watchers SET paused = 1 WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
    } else {
        sqlx::query("UPDATE watchers SET paused = 0, approved = 1 WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
    }

    find_by_id(pool, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool_for_tests;

    #[tokio::test]
    async fn first_register_is_unapproved_second_never_reapproves() {
        let pool = memory_pool_for_tests().await;

        let w = upsert_on_register(&pool, "alpha", "tok1", "1.0.0", None)
            .await
            .unwrap();
        assert!(!w.approved);

        sqlx::query("UPDATE watchers SET approved = 1 WHERE id = ?")
            .bind(w.id)
            .execute(&pool)
            .await
            .unwrap();

        let w2 = upsert_on_register(&pool, "alpha", "tok2", "1.1.0", Some("http://h:1"))
            .await
            .unwrap();
        assert_eq!(w2.id, w.id);
        assert!(w2.approved, "register must not clear an existing approval");
        assert_eq!(w2.token, "tok2");
        assert_eq!(w2.callback_url.as_deref(), Some("http://h:1"));
    }

    #[tokio::test]
    async fn idempotent_registration_produces_one_row() {
        let pool = memory_pool_for_tests().await;
        upsert_on_register(&pool, "beta", "t", "1.0.0", None).await.unwrap();
        upsert_on_register(&pool, "beta", "t", "1.0.0", None).await.unwrap();
        assert_eq!(list(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unpause_approves_on_first_transition() {
        let pool = memory_pool_for_tests().await;
        let w = upsert_on_register(&pool, "gamma", "t", "1.0.0", None).await.unwrap();
        assert!(!w.approved);

        let updated = set_paused(&pool, w.id, false).await.unwrap().unwrap();
        assert!(updated.approved);
        assert!(!updated.paused);
    }
}
