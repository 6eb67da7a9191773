//! Pushover sink (§6): posts to the Pushover messages API, mapping the
//! synthesized priority to Pushover's `-2..2` scale.

use super::{Notification, Priority, Sink};
use async_trait::async_trait;
use serde::Deserialize;

const PUSHOVER_API: &str = "https://api.pushover.net/1/messages.json";

#[derive(Debug, Clone, Deserialize)]
struct Config {
    user_key: String,
    app_token: String,
}

pub struct PushoverSink {
    config: Config,
    http: reqwest::Client,
}

impl PushoverSink {
    #[must_use]
    pub fn from_config(value: &serde_json::Value) -> Option<Self> {
        let config: Config = serde_json::from_value(value.clone()).ok()?;
        Some(Self {
            config,
            http: reqwest::Client::new(),
        })
    }
}

fn pushover_priority(priority: Priority) -> i32 {
    match priority {
        Priority::Urgent => 1,
        Priority::High => 0,
        Priority::Normal => -1,
    }
}

#[async_trait]
impl Sink for PushoverSink {
    async fn send(&self, notification: &Notification) -> crate::error::Result<()> {
        let title = format!(
            "[{}] {}",
            notification.new_status, notification.probe_name
        );

        self.http
            .post(PUSHOVER_API)
            .form(&[
                ("token", self.config.app_token.as_str()),
                ("user", self.config.user_key.as_str()),
                ("title", title.as_str()),
                ("message", notification.message.as_str()),
                ("priority", &pushover_priority(notification.priority).to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "pushover"
    }
}
