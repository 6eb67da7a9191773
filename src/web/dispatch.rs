//! Notification dispatcher (§4.9): an id → sink mapping reloaded from the
//! store, invoked per channel in parallel, fire-and-log so a sink failure
//! never blocks result ingestion.

use crate::web::sinks::{self, Notification, Sink};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::warn;

pub struct Dispatcher {
    pool: SqlitePool,
    sinks: RwLock<HashMap<i64, Box<dyn Sink>>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            sinks: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuilds the id → sink map from `notification_channels`. Channels
    /// with an unrecognized type or malformed config are logged and
    /// dropped rather than failing the reload outright.
    pub async fn reload(&self) -> crate::error::Result<()> {
        let channels = crate::db::channels::list(&self.pool).await?;
        let mut built = HashMap::new();

        for channel in channels {
            if !channel.enabled {
                continue;
            }
            let Ok(config) = serde_json::from_str::<serde_json::Value>(&channel.config) else {
                warn!(channel_id = channel.id, "channel config is not valid JSON, skipping");
                continue;
            };
            match sinks::build(&channel.channel_type, &config) {
                Some(sink) => {
                    built.insert(channel.id, sink);
                }
                None => warn!(channel_id = channel.id, channel_type = %channel.channel_type, "unrecognized channel type, skipping"),
            }
        }

        *self.sinks.write().await = built;
        Ok(())
    }

    /// Sends `notification` to every channel in `channel_ids`, in parallel,
    /// never propagating a sink failure to the caller.
    pub async fn dispatch(&self, channel_ids: &[i64], notification: Notification) {
        let sinks = self.sinks.read().await;
        let mut tasks = Vec::new();

        for &id in channel_ids {
            let Some(sink) = sinks.get(&id) else {
                warn!(channel_id = id, "dispatch requested unknown or disabled channel");
                continue;
            };
            let notification = notification.clone();
            let sink_type = sink.sink_type();
            tasks.push(async move {
                if let Err(e) = sink.send(&notification).await {
                    warn!(channel_id = id, sink_type, error = %e, "notification send failed");
                }
            });
        }

        futures::future::join_all(tasks).await;
    }

    pub async fn test_channel(&self, channel_id: i64) -> crate::error::Result<bool> {
        let sinks = self.sinks.read().await;
        let Some(sink) = sinks.get(&channel_id) else {
            return Ok(false);
        };
        let notification = Notification {
            probe_name: "test".to_string(),
            old_status: None,
            new_status: crate::contract::Status::Ok,
            message: "test notification from the read API".to_string(),
            priority: sinks::Priority::Normal,
        };
        sink.send(&notification).await?;
        Ok(true)
    }
}
