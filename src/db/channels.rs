//! Notification channel CRUD (§3 "Notification Channel", §4.12).

use super::models::NotificationChannelRow;
use crate::error::Result;
use sqlx::SqlitePool;

pub async fn create(
    pool: &SqlitePool,
    name: &str,
    channel_type: &str,
    config: &serde_json::Value,
    enabled: bool,
) -> Result<NotificationChannelRow> {
    let config_json = serde_json::to_string(config)?;
    let id = sqlx::query(
        "INSERT INTO notification_channels (name, type, config, enabled) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(channel_type)
    .bind(&config_json)
    .bind(enabled)
    .execute(pool)
    .await?
    .last_insert_rowid();

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| crate::error::Error::msg("channel vanished after insert"))
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<NotificationChannelRow>> {
    let row =
        sqlx::query_as::<_, NotificationChannelRow>("SELECT * FROM notification_channels WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(row)
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<NotificationChannelRow>> {
    let rows = sqlx::query_as::<_, NotificationChannelRow>(
        "SELECT * FROM notification_channels ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find_many(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<NotificationChannelRow>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let all = list(pool).await?;
    Ok(all.into_iter().filter(|c| ids.contains(&c.id)).collect())
}

pub async fn update(
    pool: &SqlitePool,
    id: i64,
    name: &str,
    channel_type: &str,
    config: &serde_json::Value,
    enabled: bool,
) -> Result<bool> {
    let config_json = serde_json::to_string(config)?;
    let result = sqlx::query(
        "UPDATE notification_channels SET name = ?, type = ?, config = ?, enabled = ? WHERE id = ?",
    )
    .bind(name)
    .bind(channel_type)
    .bind(&config_json)
    .bind(enabled)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM notification_channels WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
