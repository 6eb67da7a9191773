//! Watcher runtime: wires discovery, scheduling, pushing, and the local
//! trigger API together, and owns the lifetime of the whole watcher
//! process from startup through graceful shutdown (§4, §5's cancellation
//! semantics).

use crate::config::WatcherConfig;
use crate::watcher::executor::Executor;
use crate::watcher::push_client::PushClient;
use crate::watcher::scheduler::Scheduler;
use crate::watcher::{registry, trigger_api};
use crate::token_store;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_secs(60);

pub struct WatcherHandle {
    pub token: String,
    pub callback_advertised: bool,
    probes_dir: PathBuf,
    version: String,
    scheduler: Arc<Scheduler>,
    push_client: Arc<PushClient>,
}

impl WatcherHandle {
    pub async fn reload(&self) -> crate::error::Result<()> {
        let configs = self.push_client.get_configs().await?;
        self.scheduler.reload(configs).await;
        Ok(())
    }

    pub async fn trigger(&self, config_id: i64) -> crate::error::Result<bool> {
        let Some(config) = self.scheduler.snapshot(config_id).await else {
            return Ok(false);
        };
        self.scheduler.trigger_now(&config).await;
        Ok(true)
    }

    pub async fn rediscover_and_register(&self) -> crate::error::Result<usize> {
        let probe_types = registry::discover(&self.probes_dir).await?;
        let count = probe_types.len();
        self.push_client
            .register(&self.version, None, probe_types)
            .await?;
        self.reload().await?;
        Ok(count)
    }
}

/// Runs the watcher subcommand to completion: registers, reloads the
/// schedule, starts the heartbeat/poll loops and the local trigger API, and
/// blocks until `shutdown` fires.
pub async fn run(config: WatcherConfig, version: &str, shutdown: CancellationToken) -> crate::error::Result<()> {
    let token = token_store::load_or_create(&config.name).await?;
    let probes_dir = PathBuf::from(&config.probes_dir);

    let probe_types = registry::discover(&probes_dir).await?;
    info!(count = probe_types.len(), "discovered probe types");

    let push_client = Arc::new(PushClient::new(
        config.server_url.clone(),
        config.name.clone(),
        token.clone(),
    ));

    let registration = push_client
        .register(version, config.callback_url.clone(), probe_types)
        .await?;
    info!(
        watcher_id = registration.watcher_id,
        approved = registration.approved,
        "registered with server"
    );

    let executor = Executor::new(config.max_concurrent);
    let scheduler = Arc::new(Scheduler::new(
        config.name.clone(),
        executor,
        Arc::clone(&push_client),
        shutdown.clone(),
    ));

    let configs = push_client.get_configs().await?;
    scheduler.reload(configs).await;

    let handle = Arc::new(WatcherHandle {
        token,
        callback_advertised: config.callback_url.is_some(),
        probes_dir,
        version: version.to_string(),
        scheduler: Arc::clone(&scheduler),
        push_client: Arc::clone(&push_client),
    });

    let heartbeat_task = tokio::spawn(heartbeat_loop(
        Arc::clone(&push_client),
        Arc::clone(&handle),
        version.to_string(),
        shutdown.clone(),
    ));

    let addr = format!("0.0.0.0:{}", config.api_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "local trigger api listening");

    let app = trigger_api::router(Arc::clone(&handle));
    let server_shutdown = shutdown.clone();
    let server_task = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            error!(error = %e, "trigger api server exited with error");
        }
    });

    shutdown.cancelled().await;
    info!("shutdown signal received, draining watcher");

    let _ = server_task.await;
    let _ = heartbeat_task.await;
    Ok(())
}

/// Heartbeats on a fixed interval and polls for config changes, per §4.5's
/// "next tick retries" policy for heartbeat failures: no in-call retry, the
/// next tick simply tries again. A heartbeat failure also marks the push
/// client for re-registration, picked up on the following successful tick
/// (SPEC_FULL.md §12's re-registration decision).
async fn heartbeat_loop(
    push_client: Arc<PushClient>,
    handle: Arc<WatcherHandle>,
    version: String,
    shutdown: CancellationToken,
) {
    let mut heartbeat_ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    let mut poll_ticker = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = heartbeat_ticker.tick() => {
                if push_client.needs_reregister() {
                    if let Err(e) = handle.rediscover_and_register().await {
                        warn!(error = %e, "re-registration attempt failed");
                        continue;
                    }
                }
                if let Err(e) = push_client.heartbeat(&version).await {
                    warn!(error = %e, "heartbeat failed, next tick will retry");
                }
            }
            _ = poll_ticker.tick() => {
                if let Err(e) = handle.reload().await {
                    warn!(error = %e, "periodic config poll failed");
                }
            }
            () = shutdown.cancelled() => return,
        }
    }
}
