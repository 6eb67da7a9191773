//! CLI surface (§6, §11.2 of SPEC_FULL.md): `watcher`, `web`, `migrate`,
//! `install`, `uninstall`, plus `--version` from `clap`'s `command(version)`.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "monitor", version, about = "Personal-infrastructure monitoring fabric")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the watcher agent: discover probes, schedule, execute, push results.
    Watcher {
        /// Stable identity this watcher registers under.
        #[arg(long)]
        name: String,
        #[arg(long)]
        server_url: Option<String>,
        #[arg(long)]
        probes_dir: Option<String>,
        #[arg(long)]
        api_port: Option<u16>,
        #[arg(long)]
        max_concurrent: Option<usize>,
        #[arg(long)]
        callback_url: Option<String>,
    },
    /// Run the web service control plane.
    Web {
        #[arg(long)]
        database_path: Option<String>,
        #[arg(long)]
        admin_token: Option<String>,
        #[arg(long)]
        bind_addr: Option<String>,
    },
    /// Idempotently create the store schema, then exit.
    Migrate {
        #[arg(long)]
        database_path: Option<String>,
    },
    /// Validate the environment for a watcher deployment and print next
    /// steps. Writes nothing itself — the OS service descriptor is
    /// generated by the installer wrapper, not the core (§1 scope).
    Install {
        #[arg(long)]
        name: String,
        #[arg(long)]
        probes_dir: Option<String>,
    },
    /// Remove the persisted token file for a watcher name.
    Uninstall {
        #[arg(long)]
        name: String,
    },
}
