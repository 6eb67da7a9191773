//! Push client (§4.5 / C5): register, heartbeat, fetch configs, submit
//! results with bounded exponential retry.

use crate::contract::Status;
use crate::wire::{
    AlertRequest, ConfigPayload, HeartbeatRequest, MissedRunRequest, RegisterRequest,
    RegisterResponse, ResultRequest,
};
use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Delay schedule for `SubmitResult` retries (§4.5's table): attempts at
/// t ≈ 0, 1, 2, 5, 10 seconds — 5 attempts total, 4 retry delays.
const RETRY_DELAYS: [Duration; 4] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(5),
    Duration::from_secs(10),
];

pub struct PushClient {
    http: reqwest::Client,
    server_url: String,
    watcher_name: String,
    token: String,
    /// Set whenever a call observes a transport failure or exhausts its
    /// retry budget; the next successful contact re-sends `Register`
    /// (SPEC_FULL.md §12, the re-registration open-question decision).
    needs_reregister: AtomicBool,
}

impl PushClient {
    #[must_use]
    pub fn new(server_url: String, watcher_name: String, token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            server_url,
            watcher_name,
            token,
            needs_reregister: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn needs_reregister(&self) -> bool {
        self.needs_reregister.load(Ordering::Relaxed)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server_url.trim_end_matches('/'))
    }

    pub async fn register(
        &self,
        version: &str,
        callback_url: Option<String>,
        probe_types: Vec<crate::wire::RegisterProbeType>,
    ) -> crate::error::Result<RegisterResponse> {
        let body = RegisterRequest {
            name: self.watcher_name.clone(),
            version: version.to_string(),
            token: self.token.clone(),
            callback_url,
            probe_types,
        };

        let response = self
            .http
            .post(self.url("/api/push/register"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: RegisterResponse = response.json().await?;
        self.needs_reregister.store(false, Ordering::Relaxed);
        info!(watcher_id = parsed.watcher_id, approved = parsed.approved, "registered");
        Ok(parsed)
    }

    pub async fn heartbeat(&self, version: &str) -> crate::error::Result<()> {
        let body = HeartbeatRequest {
            name: self.watcher_name.clone(),
            version: version.to_string(),
        };

        let result = self
            .http
            .post(self.url("/api/push/heartbeat"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => {
                self.needs_reregister.store(true, Ordering::Relaxed);
                Err(crate::error::Error::msg(format!(
                    "heartbeat rejected: {}",
                    resp.status()
                )))
            }
            Err(e) => {
                self.needs_reregister.store(true, Ordering::Relaxed);
                Err(e.into())
            }
        }
    }

    pub async fn get_configs(&self) -> crate::error::Result<Vec<ConfigPayload>> {
        let response = self
            .http
            .get(self.url(&format!("/api/push/configs/{}", self.watcher_name)))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;
        let configs: Vec<ConfigPayload> = response.json().await?;
        Ok(configs)
    }

    /// Submits one result with the bounded retry schedule of §4.5: abort
    /// immediately on cancellation or a non-transient 4xx (anything but
    /// 408/429); otherwise retry 5xx/transport failures on the schedule
    /// above, then drop with a warning.
    pub async fn submit_result(&self, result: &ResultRequest, cancel: &CancellationToken) {
        let mut attempt = 0usize;
        loop {
            if cancel.is_cancelled() {
                warn!(probe_config_id = result.probe_config_id, "result submission aborted by shutdown");
                return;
            }

            let outcome = self
                .http
                .post(self.url("/api/push/result"))
                .bearer_auth(&self.token)
                .json(result)
                .send()
                .await;

            match outcome {
                Ok(resp) if resp.status().is_success() => {
                    debug!(probe_config_id = result.probe_config_id, attempt, "result submitted");
                    self.needs_reregister.store(false, Ordering::Relaxed);
                    return;
                }
                Ok(resp) => {
                    let status = resp.status();
                    if is_permanent_client_error(status) {
                        warn!(probe_config_id = result.probe_config_id, %status, "result rejected permanently");
                        return;
                    }
                    warn!(probe_config_id = result.probe_config_id, %status, attempt, "result submission failed, may retry");
                }
                Err(e) => {
                    self.needs_reregister.store(true, Ordering::Relaxed);
                    warn!(probe_config_id = result.probe_config_id, error = %e, attempt, "result submission transport error");
                }
            }

            let Some(delay) = RETRY_DELAYS.get(attempt) else {
                warn!(probe_config_id = result.probe_config_id, "result submission retries exhausted, dropping");
                return;
            };
            attempt += 1;

            tokio::select! {
                () = tokio::time::sleep(*delay) => {}
                () = cancel.cancelled() => {
                    warn!(probe_config_id = result.probe_config_id, "result submission aborted during backoff");
                    return;
                }
            }
        }
    }

    pub async fn submit_missed_run(&self, probe_config_id: i64, scheduled_at: chrono::DateTime<chrono::Utc>) {
        let body = MissedRunRequest {
            watcher: self.watcher_name.clone(),
            probe_config_id,
            scheduled_at,
        };
        if let Err(e) = self
            .http
            .post(self.url("/api/push/missed_run"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
        {
            warn!(error = %e, "failed to report missed run (best effort)");
        }
    }

    pub async fn submit_alert(
        &self,
        source: &str,
        status: Status,
        message: &str,
        data: Option<serde_json::Value>,
    ) -> crate::error::Result<()> {
        let body = AlertRequest {
            source: source.to_string(),
            status,
            message: message.to_string(),
            data,
        };
        self.http
            .post(self.url("/api/push/alert"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

fn is_permanent_client_error(status: StatusCode) -> bool {
    status.is_client_error() && status != StatusCode::REQUEST_TIMEOUT && status != StatusCode::TOO_MANY_REQUESTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_4xx_are_408_and_429_only() {
        assert!(!is_permanent_client_error(StatusCode::REQUEST_TIMEOUT));
        assert!(!is_permanent_client_error(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_permanent_client_error(StatusCode::BAD_REQUEST));
        assert!(is_permanent_client_error(StatusCode::FORBIDDEN));
        assert!(is_permanent_client_error(StatusCode::NOT_FOUND));
        assert!(!is_permanent_client_error(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn retry_schedule_has_four_delays_for_five_attempts() {
        assert_eq!(RETRY_DELAYS.len(), 4);
        let total: Duration = RETRY_DELAYS.iter().sum();
        assert_eq!(total, Duration::from_secs(18));
    }
}
