//! ntfy.sh sink (§6): posts the notification body to a topic URL, with the
//! synthesized priority translated to ntfy's `X-Priority` header scale.

use super::{Notification, Priority, Sink};
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
struct Config {
    url: String,
    #[serde(default)]
    access_token: Option<String>,
}

pub struct NtfySink {
    config: Config,
    http: reqwest::Client,
}

impl NtfySink {
    #[must_use]
    pub fn from_config(value: &serde_json::Value) -> Option<Self> {
        let config: Config = serde_json::from_value(value.clone()).ok()?;
        Some(Self {
            config,
            http: reqwest::Client::new(),
        })
    }
}

fn ntfy_priority(priority: Priority) -> &'static str {
    match priority {
        Priority::Urgent => "urgent",
        Priority::High => "high",
        Priority::Normal => "default",
    }
}

#[async_trait]
impl Sink for NtfySink {
    async fn send(&self, notification: &Notification) -> crate::error::Result<()> {
        let title = format!(
            "[{}] {}",
            notification.new_status, notification.probe_name
        );

        let mut request = self
            .http
            .post(&self.config.url)
            .header("Title", title)
            .header("Priority", ntfy_priority(notification.priority))
            .body(notification.message.clone());

        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }

        request.send().await?.error_for_status()?;
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "ntfy"
    }
}
