//! warpd — the WarpGrid scheduler daemon.
//!
//! Single binary that assembles the scheduler lifecycle:
//! - Scheduler store (redb)
//! - Leader election (standalone: single member)
//! - Resource-manager driver (local)
//! - REST API + Prometheus gauges
//!
//! # Usage
//!
//! ```text
//! warpd standalone --config /etc/warpgrid/warpd.toml --port 8443
//! warpd transitions
//! ```

mod config;
mod driver;
mod election;
mod standalone;
mod storage;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use warpgrid_lifecycle::transition_graph;

use crate::config::DaemonConfig;

#[derive(Parser)]
#[command(name = "warpd", about = "WarpGrid scheduler daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single scheduler replica with a local election and driver.
    Standalone {
        /// Path to warpd.toml. Built-in defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on.
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Max time to wait for registration, e.g. `1m`.
        #[arg(long)]
        registration_delay_limit: Option<String>,

        /// Max time to lead before failing over, e.g. `1d`.
        #[arg(long)]
        leading_time_limit: Option<String>,
    },

    /// Print the legal lifecycle transitions.
    Transitions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,warpd=debug,warpgrid=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Standalone {
            config,
            port,
            data_dir,
            registration_delay_limit,
            leading_time_limit,
        } => {
            let mut daemon_config = match &config {
                Some(path) => {
                    info!(path = ?path, "loading configuration");
                    DaemonConfig::from_file(path)?
                }
                None => DaemonConfig::default(),
            };

            // Flags override the file.
            if let Some(port) = port {
                daemon_config.http.port = port;
            }
            if let Some(data_dir) = data_dir {
                daemon_config.scheduler.data_dir = data_dir;
            }
            if let Some(limit) = registration_delay_limit {
                daemon_config.leading.registration_delay_limit = limit;
            }
            if let Some(limit) = leading_time_limit {
                daemon_config.leading.leading_time_limit = limit;
            }

            standalone::run_standalone(daemon_config).await
        }
        Command::Transitions => {
            for t in transition_graph() {
                let action = t.action.map(|a| format!("{a:?}")).unwrap_or_default();
                println!("{:<28} -> {:<28} {}", t.from, t.to, action);
            }
            Ok(())
        }
    }
}
