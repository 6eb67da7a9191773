use clap::Parser;
use monitor::cli::{Cli, Command};
use monitor::config::{self, WatcherConfig, WebConfig};
use monitor::{db, token_store, watcher, web};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Watcher {
            name,
            server_url,
            probes_dir,
            api_port,
            max_concurrent,
            callback_url,
        } => {
            let config = WatcherConfig::from_env_and_args(
                name,
                server_url,
                probes_dir,
                api_port,
                max_concurrent,
                callback_url,
            )?;
            let shutdown = install_shutdown_handler();
            watcher::runtime::run(config, env!("CARGO_PKG_VERSION"), shutdown).await?;
        }
        Command::Web {
            database_path,
            admin_token,
            bind_addr,
        } => {
            let config = WebConfig::from_env_and_args(database_path, admin_token, bind_addr)?;
            let shutdown = install_shutdown_handler();
            web::run(config, shutdown).await?;
        }
        Command::Migrate { database_path } => {
            let database_path = database_path.unwrap_or_else(|| {
                std::env::var("DATABASE_PATH").unwrap_or_else(|_| "monitor.db".to_string())
            });
            let pool = db::connect(&database_path).await?;
            db::migrate(&pool).await?;
            info!(db = %database_path, "schema is up to date");
        }
        Command::Install { name, probes_dir } => {
            let probes_dir = probes_dir.unwrap_or_else(|| "./probes".to_string());
            let path = std::path::Path::new(&probes_dir);
            if !path.is_dir() {
                anyhow::bail!("probes directory {probes_dir} does not exist");
            }
            token_store::load_or_create(&name).await?;
            println!("watcher '{name}' is ready: token stored, probes directory verified.");
            println!("next: wrap this binary with your OS service manager (see README for the LaunchAgent/systemd templates).");
        }
        Command::Uninstall { name } => {
            token_store::remove(&name).await?;
            println!("removed token for watcher '{name}'.");
        }
    }

    Ok(())
}

/// Derives a root [`CancellationToken`] from SIGINT/SIGTERM so every
/// suspension point downstream (timers, subprocess waits, HTTP calls) has a
/// cancellable path (§5).
fn install_shutdown_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let watched = token.clone();

    tokio::spawn(async move {
        let ctrl_c = async {
            let _ = tokio::signal::ctrl_c().await;
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => error!(error = %e, "failed to install SIGTERM handler"),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => info!("received SIGINT"),
            () = terminate => info!("received SIGTERM"),
        }

        watched.cancel();
    });

    token
}
