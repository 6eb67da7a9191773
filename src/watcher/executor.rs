//! Executor (§4.3 / C3): bounded-concurrency subprocess runner with
//! timeout + SIGTERM/SIGKILL escalation.

use crate::contract::{render_value, sanitize_env_key, RunOutput, Status};
use crate::wire::ConfigPayload;
use chrono::{DateTime, Utc};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const GRACE_PERIOD: Duration = Duration::from_secs(5);
const STDERR_TAIL_LIMIT: usize = 10_000;

/// Globally bounds how many probe subprocesses may run at once. Contention
/// here is intentional (§5 "Shared resources").
#[derive(Clone)]
pub struct Executor {
    admission: Arc<Semaphore>,
}

pub struct Execution {
    pub output: RunOutput,
    pub duration: Duration,
}

impl Executor {
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            admission: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Runs one probe to completion. Returns `None` if cancellation fires
    /// before admission is granted, leaving no side effects (§4.3).
    pub async fn execute(
        &self,
        config: &ConfigPayload,
        cancel: &CancellationToken,
    ) -> Option<Execution> {
        let _permit = tokio::select! {
            permit = self.admission.acquire() => permit.ok()?,
            () = cancel.cancelled() => return None,
        };

        let started = std::time::Instant::now();
        let output = run_subprocess(config, cancel).await;
        let duration = started.elapsed();

        Some(Execution { output, duration })
    }
}

fn compose_command(config: &ConfigPayload) -> Command {
    let mut cmd = Command::new(&config.executable_path);
    if let Some(sub) = &config.subcommand {
        cmd.arg(sub);
    }
    for (key, value) in &config.arguments {
        cmd.arg(format!("--{key}={}", render_value(value)));
    }
    for (key, value) in &config.arguments {
        let sanitized = sanitize_env_key(key);
        if !sanitized.is_empty() {
            cmd.env(format!("PROBE_{sanitized}"), render_value(value));
        }
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd
}

async fn run_subprocess(config: &ConfigPayload, cancel: &CancellationToken) -> RunOutput {
    let timeout = if config.timeout_seconds <= 0 {
        DEFAULT_TIMEOUT
    } else {
        Duration::from_secs(config.timeout_seconds as u64)
    };

    let mut child = match compose_command(config).spawn() {
        Ok(child) => child,
        Err(e) => return RunOutput::unknown(format!("failed to spawn probe: {e}")),
    };

    let pid = child.id();

    tokio::select! {
        result = tokio::time::timeout(timeout, child.wait_with_output()) => match result {
            Ok(Ok(output)) => interpret_output(output),
            Ok(Err(e)) => RunOutput::unknown(format!("failed to wait for probe: {e}")),
            Err(_elapsed) => {
                warn!(probe = %config.name, timeout_secs = timeout.as_secs(), "probe timed out");
                escalate(pid).await;
                RunOutput::unknown(format!(
                    "probe timed out after {} seconds",
                    timeout.as_secs()
                ))
            }
        },
        () = cancel.cancelled() => {
            escalate(pid).await;
            RunOutput::unknown("probe cancelled by shutdown")
        }
    }
}

/// Sends a termination signal, waits a grace period, then force-kills —
/// the escalation sequence of §4.3 step 3 / §5's cancellation semantics.
async fn escalate(pid: Option<u32>) {
    let Some(pid) = pid else { return };

    #[cfg(unix)]
    {
        // SAFETY: pid was obtained from a live tokio::process::Child we
        // own; sending a signal to it has no memory-safety implications.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
        tokio::time::sleep(GRACE_PERIOD).await;
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGKILL);
        }
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        tokio::time::sleep(GRACE_PERIOD).await;
    }
}

fn interpret_output(output: std::process::Output) -> RunOutput {
    if let Ok(parsed) = serde_json::from_slice::<RunOutput>(&output.stdout) {
        return parsed;
    }

    if output.status.success() {
        return RunOutput::unknown("probe exited 0 but stdout was not valid JSON");
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let tail: String = stderr.chars().rev().take(STDERR_TAIL_LIMIT).collect::<String>()
        .chars()
        .rev()
        .collect();

    debug!(status = ?output.status, "probe exited non-zero with unparseable stdout");
    RunOutput {
        status: Status::Unknown,
        message: format!("probe exited with {}: {tail}", output.status),
        metrics: None,
        data: None,
        next_run: None,
    }
}

/// Combines the executor's raw output with scheduling metadata into the
/// tuple the push client submits, per §4.3's final paragraph.
pub struct ExecutionRecord {
    pub config_id: i64,
    pub output: RunOutput,
    pub scheduled_at: DateTime<Utc>,
    pub executed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn config_for(executable_path: &str, timeout_seconds: i64) -> ConfigPayload {
        ConfigPayload {
            id: 1,
            name: "test-probe".into(),
            probe_type_name: "test".into(),
            executable_path: executable_path.into(),
            subcommand: None,
            arguments: BTreeMap::new(),
            interval: "1m".into(),
            timeout_seconds,
            next_run_at: None,
            last_executed_at: None,
        }
    }

    #[tokio::test]
    async fn argv_and_env_both_carry_arguments() {
        let mut args = BTreeMap::new();
        args.insert("path".to_string(), serde_json::json!("/"));
        args.insert("min-free".to_string(), serde_json::json!(10));
        let config = ConfigPayload {
            arguments: args,
            ..config_for("/bin/sh", 5)
        };

        let cmd = compose_command(&config);
        let std_cmd = cmd.as_std();
        let argv: Vec<String> = std_cmd
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert!(argv.contains(&"--path=/".to_string()));
        assert!(argv.contains(&"--min-free=10".to_string()));

        let envs: Vec<(String, String)> = std_cmd
            .get_envs()
            .filter_map(|(k, v)| Some((k.to_string_lossy().to_string(), v?.to_string_lossy().to_string())))
            .collect();
        assert!(envs.contains(&("PROBE_PATH".to_string(), "/".to_string())));
        assert!(envs.contains(&("PROBE_MIN_FREE".to_string(), "10".to_string())));
    }

    #[tokio::test]
    async fn non_json_stdout_on_failure_becomes_unknown_with_stderr_tail() {
        let config = config_for("/bin/sh", 5);
        let mut cmd = compose_command(&config);
        cmd.arg("-c").arg("echo not-json; echo oops-stderr 1>&2; exit 1");
        let output = cmd.output().await.unwrap();
        let result = interpret_output(output);
        assert_eq!(result.status, Status::Unknown);
        assert!(result.message.contains("oops-stderr"));
    }

    #[tokio::test]
    async fn parseable_stdout_passes_through_unchanged_regardless_of_exit_code() {
        let config = config_for("/bin/sh", 5);
        let mut cmd = compose_command(&config);
        cmd.arg("-c").arg(r#"echo '{"status":"ok","message":"fine"}'; exit 1"#);
        let output = cmd.output().await.unwrap();
        let result = interpret_output(output);
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.message, "fine");
    }

    #[tokio::test]
    async fn timeout_escalation_returns_unknown_within_budget() {
        let config = config_for("/bin/sh", 1);
        let cancel = CancellationToken::new();
        let mut cmd = compose_command(&config);
        cmd.arg("-c").arg("sleep 300");
        let mut child = cmd.spawn().unwrap();
        let pid = child.id();

        let started = std::time::Instant::now();
        let output = tokio::select! {
            result = tokio::time::timeout(Duration::from_secs(1), child.wait()) => {
                match result {
                    Err(_elapsed) => {
                        escalate(pid).await;
                        RunOutput::unknown("probe timed out after 1 seconds")
                    }
                    Ok(_) => panic!("expected timeout"),
                }
            }
            () = cancel.cancelled() => unreachable!(),
        };
        let _ = child.kill().await;
        assert_eq!(output.status, Status::Unknown);
        assert!(started.elapsed() < Duration::from_secs(7));
    }
}
