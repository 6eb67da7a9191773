//! Web service control plane (§5, §7): ingests watcher-submitted results,
//! detects status transitions, dispatches notifications, and exposes the
//! read/admin API.

pub mod auth;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod router;
pub mod sinks;
pub mod state;
pub mod status_change;

use crate::config::WebConfig;
use crate::db;
use state::AppState;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Connects the store, loads the notification dispatcher, binds
/// `bind_addr`, and serves until `shutdown` fires. Drains in-flight
/// requests for up to 30s before returning (§5's graceful-shutdown note).
pub async fn run(config: WebConfig, shutdown: CancellationToken) -> crate::error::Result<()> {
    let pool = db::connect(&config.database_path).await?;
    db::migrate(&pool).await?;

    let state = AppState::new(pool, config.admin_token.clone());
    state.dispatcher.reload().await?;

    let app = router::build(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "web service listening");

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown.cancelled().await;
        info!("shutdown signal received, draining in-flight requests");
    });

    if tokio::time::timeout(DRAIN_TIMEOUT, serve).await.is_err() {
        tracing::warn!("drain timeout elapsed, forcing shutdown");
    }

    Ok(())
}
