//! Notification sinks (§4.9 / §9 "Dynamic dispatch"): polymorphic over
//! `{Send, Type}` and modeled as a trait object rather than reflection over
//! concrete sink types.

pub mod ntfy;
pub mod pushover;

use async_trait::async_trait;

/// One transition synthesized by the status-change detector (§4.8).
#[derive(Debug, Clone)]
pub struct Notification {
    pub probe_name: String,
    pub old_status: Option<crate::contract::Status>,
    pub new_status: crate::contract::Status,
    pub message: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Normal,
    High,
    Urgent,
}

#[async_trait]
pub trait Sink: Send + Sync {
    async fn send(&self, notification: &Notification) -> crate::error::Result<()>;
    fn sink_type(&self) -> &'static str;
}

/// Builds a sink from a channel row's `(type, config)` pair. Returns `None`
/// for an unrecognized type, which the dispatcher logs and skips.
#[must_use]
pub fn build(channel_type: &str, config: &serde_json::Value) -> Option<Box<dyn Sink>> {
    match channel_type {
        "ntfy" => ntfy::NtfySink::from_config(config).map(|s| Box::new(s) as Box<dyn Sink>),
        "pushover" => {
            pushover::PushoverSink::from_config(config).map(|s| Box::new(s) as Box<dyn Sink>)
        }
        _ => None,
    }
}
