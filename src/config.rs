//! Process configuration (§10.3 of SPEC_FULL.md): CLI flags layered over
//! environment variables, assembled once at startup and threaded down as
//! an explicit value rather than read from ambient globals mid-request.

use std::env;

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Configuration for the `web` subcommand.
#[derive(Debug, Clone)]
pub struct WebConfig {
    pub database_path: String,
    pub admin_token: String,
    pub bind_addr: String,
}

impl WebConfig {
    pub fn from_env_and_args(
        database_path: Option<String>,
        admin_token: Option<String>,
        bind_addr: Option<String>,
    ) -> crate::error::Result<Self> {
        let _ = dotenvy::dotenv();

        let admin_token = admin_token
            .or_else(|| env::var("AUTH_TOKEN").ok())
            .ok_or_else(|| crate::error::Error::msg("AUTH_TOKEN must be set (env or --admin-token)"))?;

        Ok(Self {
            database_path: database_path
                .unwrap_or_else(|| env_or("DATABASE_PATH", "monitor.db")),
            admin_token,
            bind_addr: bind_addr.unwrap_or_else(|| env_or("BIND_ADDR", "0.0.0.0:8080")),
        })
    }
}

/// Configuration for the `watcher` subcommand. The watcher holds no
/// durable state of its own beyond the per-name token file (§3
/// Ownership) — everything else here is reconstructed from the server on
/// every start via register + `GetConfigs`.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub name: String,
    pub server_url: String,
    pub probes_dir: String,
    pub api_port: u16,
    pub max_concurrent: usize,
    /// Reverse URL the web service may call to trigger this watcher
    /// directly (§3's Callback URL / §4.6). Absent when the watcher isn't
    /// reachable from the server, in which case the server falls back to
    /// `next_run_at = now()` (§9's cyclic-reference note).
    pub callback_url: Option<String>,
}

impl WatcherConfig {
    pub fn from_env_and_args(
        name: String,
        server_url: Option<String>,
        probes_dir: Option<String>,
        api_port: Option<u16>,
        max_concurrent: Option<usize>,
        callback_url: Option<String>,
    ) -> crate::error::Result<Self> {
        let _ = dotenvy::dotenv();

        let server_url = server_url
            .or_else(|| env::var("SERVER_URL").ok())
            .ok_or_else(|| crate::error::Error::msg("server URL must be set (env SERVER_URL or --server-url)"))?;

        Ok(Self {
            name,
            server_url,
            probes_dir: probes_dir.unwrap_or_else(|| env_or("PROBES_DIR", "./probes")),
            api_port: api_port.unwrap_or(9090),
            max_concurrent: max_concurrent.unwrap_or(10),
            // §6: "WATCHER_URL (web-to-watcher reverse URL when colocated)" —
            // this is the server's inbound path to us, not our outbound
            // target, so it backs `callback_url`, not `server_url`.
            callback_url: callback_url.or_else(|| env::var("WATCHER_URL").ok()),
        })
    }
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
