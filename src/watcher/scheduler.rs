//! Scheduler (§4.4 / C4): one background task per probe config, reloaded
//! atomically whenever the server's config set changes.

use crate::interval::{self, Interval};
use crate::watcher::executor::Executor;
use crate::watcher::push_client::PushClient;
use crate::wire::{ConfigPayload, ResultRequest};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A config's bound but not-yet-run delay before it is first due, so that a
/// fleet of configs that all register at once doesn't all fire in the same
/// instant (§4.4's jitter note).
fn initial_jitter(config_id: i64) -> std::time::Duration {
    std::time::Duration::from_secs((config_id.rem_euclid(10)) as u64)
}

struct RunningConfig {
    config: ConfigPayload,
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

pub struct Scheduler {
    watcher_name: String,
    executor: Executor,
    push_client: Arc<PushClient>,
    shutdown: CancellationToken,
    running: RwLock<HashMap<i64, RunningConfig>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        watcher_name: String,
        executor: Executor,
        push_client: Arc<PushClient>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            watcher_name,
            executor,
            push_client,
            shutdown,
            running: RwLock::new(HashMap::new()),
        }
    }

    /// Replaces the scheduled config set: configs absent from `configs` are
    /// cancelled, configs present are (re)started from scratch so that
    /// interval/argument edits on the server take effect immediately. This
    /// is the atomic-reload operation of §4.4.
    pub async fn reload(self: &Arc<Self>, configs: Vec<ConfigPayload>) {
        self.detect_missed_runs(&configs).await;

        let incoming_ids: std::collections::HashSet<i64> = configs.iter().map(|c| c.id).collect();

        let mut running = self.running.write().await;
        running.retain(|id, running_config| {
            if incoming_ids.contains(id) {
                true
            } else {
                running_config.cancel.cancel();
                running_config.handle.abort();
                false
            }
        });

        for config in configs {
            if let Some(existing) = running.remove(&config.id) {
                existing.cancel.cancel();
                existing.handle.abort();
            }
            let cancel = self.shutdown.child_token();
            let scheduler = Arc::clone(self);
            let handle = tokio::spawn(run_config_loop(scheduler, config.clone(), cancel.clone()));
            running.insert(config.id, RunningConfig { config, handle, cancel });
        }

        info!(count = running.len(), "scheduler reloaded");
    }

    /// Looks up the cached snapshot for a config id, for the trigger-now
    /// path of §4.6's `POST /trigger/{id}`.
    pub async fn snapshot(&self, config_id: i64) -> Option<ConfigPayload> {
        self.running.read().await.get(&config_id).map(|r| r.config.clone())
    }

    /// Runs one config immediately, out of band from its normal schedule.
    pub async fn trigger_now(&self, config: &ConfigPayload) {
        let scheduled_at = Utc::now();
        self.execute_and_submit(config, scheduled_at).await;
    }

    /// Runs `config` and pushes the result, returning the `(executed_at,
    /// explicit next_run)` pair the caller needs to derive the next
    /// schedule point with the same precedence the server applies when it
    /// records the result: an explicit `next_run` from the probe's own
    /// output wins; otherwise the caller falls back to
    /// `executed_at + interval`. `None` means the run never happened
    /// (cancelled before admission).
    async fn execute_and_submit(
        &self,
        config: &ConfigPayload,
        scheduled_at: DateTime<Utc>,
    ) -> Option<(DateTime<Utc>, Option<DateTime<Utc>>)> {
        let execution = self.executor.execute(config, &self.shutdown).await?;
        let executed_at = Utc::now();
        let next_run = execution.output.next_run;

        let result = ResultRequest {
            watcher: self.watcher_name.clone(),
            probe_config_id: config.id,
            status: execution.output.status,
            message: execution.output.message,
            metrics: execution.output.metrics,
            data: execution.output.data,
            duration_ms: i64::try_from(execution.duration.as_millis()).unwrap_or(i64::MAX),
            next_run,
            scheduled_at,
            executed_at,
        };

        self.push_client.submit_result(&result, &self.shutdown).await;
        Some((executed_at, next_run))
    }

    /// At startup (or reload), for every config with a non-null
    /// `last_executed_at`, computes `elapsed / interval`; if that ratio
    /// exceeds 1, one interval's worth of runs was missed while the
    /// watcher was down. Diagnostic only — reports via the push client so
    /// the server can record it in `missed_runs` (§4.4, §3 ownership split
    /// — see the design note on `MissedRunRequest`); runs are not
    /// backfilled.
    async fn detect_missed_runs(&self, configs: &[ConfigPayload]) {
        let now = Utc::now();
        for config in configs {
            let Ok(Interval::Duration(step)) = interval::parse(&config.interval) else {
                continue;
            };
            let Some(last_executed_at) = config.last_executed_at else {
                continue;
            };
            let Ok(step) = chrono::Duration::from_std(step) else {
                continue;
            };
            if step.is_zero() {
                continue;
            }
            let elapsed = now - last_executed_at;
            if elapsed.num_milliseconds() as f64 / step.num_milliseconds() as f64 > 1.0 {
                let scheduled_at = last_executed_at + step;
                warn!(probe_config_id = config.id, %scheduled_at, "missed run detected at startup");
                self.push_client.submit_missed_run(config.id, scheduled_at).await;
            }
        }
    }
}

async fn run_config_loop(scheduler: Arc<Scheduler>, config: ConfigPayload, cancel: CancellationToken) {
    let mut next_due = next_run_for(&config);

    loop {
        let now = Utc::now();
        let delay = if next_due > now {
            (next_due - now).to_std().unwrap_or_default()
        } else {
            std::time::Duration::ZERO
        };

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = cancel.cancelled() => return,
        }

        let scheduled_at = next_due;
        let Some((executed_at, explicit_next_run)) =
            scheduler.execute_and_submit(&config, scheduled_at).await
        else {
            return;
        };

        // Prefer the probe's own reported next_run over the raw interval,
        // the same precedence the server applies when it records the
        // result (spec §4.4) and `next_run_for` applies at startup.
        next_due = match explicit_next_run {
            Some(explicit) => explicit,
            None => match interval::parse(&config.interval) {
                Ok(Interval::Duration(step)) => {
                    let Ok(step) = chrono::Duration::from_std(step) else { return };
                    executed_at + step
                }
                // No interval (the external-alert sentinel): this config
                // runs once per trigger/dispatch, not on a recurring timer.
                Ok(Interval::None) | Err(_) => return,
            },
        };
    }
}

fn next_run_for(config: &ConfigPayload) -> DateTime<Utc> {
    if let Some(next_run_at) = config.next_run_at {
        return next_run_at;
    }
    if let (Some(last_executed_at), Ok(Interval::Duration(step))) =
        (config.last_executed_at, interval::parse(&config.interval))
    {
        if let Ok(step) = chrono::Duration::from_std(step) {
            return last_executed_at + step;
        }
    }
    Utc::now() + chrono::Duration::from_std(initial_jitter(config.id)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn config(id: i64, interval: &str, next_run_at: Option<DateTime<Utc>>, last_executed_at: Option<DateTime<Utc>>) -> ConfigPayload {
        ConfigPayload {
            id,
            name: "test".into(),
            probe_type_name: "test".into(),
            executable_path: "/bin/true".into(),
            subcommand: None,
            arguments: BTreeMap::new(),
            interval: interval.into(),
            timeout_seconds: 30,
            next_run_at,
            last_executed_at,
        }
    }

    #[test]
    fn never_run_config_uses_jittered_near_term_schedule() {
        let cfg = config(3, "5m", None, None);
        let due = next_run_for(&cfg);
        let now = Utc::now();
        assert!(due >= now);
        assert!(due <= now + chrono::Duration::seconds(10));
    }

    #[test]
    fn explicit_next_run_at_wins_over_derivation() {
        let explicit = Utc::now() + chrono::Duration::hours(1);
        let cfg = config(1, "5m", Some(explicit), Some(Utc::now()));
        assert_eq!(next_run_for(&cfg), explicit);
    }

    #[test]
    fn derives_from_last_executed_plus_interval_when_next_run_absent() {
        let last = "2024-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let cfg = config(1, "10m", None, Some(last));
        assert_eq!(next_run_for(&cfg), last + chrono::Duration::minutes(10));
    }

    #[test]
    fn jitter_is_bounded_and_keyed_on_id() {
        assert_eq!(initial_jitter(0), std::time::Duration::from_secs(0));
        assert_eq!(initial_jitter(7), std::time::Duration::from_secs(7));
        assert_eq!(initial_jitter(23), std::time::Duration::from_secs(3));
    }
}
