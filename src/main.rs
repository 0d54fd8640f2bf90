//! # yt-relay - Main Entry Point
//!
//! `yt-relay serve --config relay.yaml` loads and validates the configuration, installs
//! logging (and the Prometheus recorder when enabled), then serves until SIGINT or
//! SIGTERM. Configuration problems exit with a non-zero status before any socket is bound.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use yt_relay::gateway::server::shutdown_signal;
use yt_relay::observability::init_logging;
use yt_relay::{Conf, RelayServer};

#[derive(Debug, Parser)]
#[command(name = "yt-relay", version, about = "Caching, whitelisting relay for the YouTube Data API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the relay server
    Serve {
        /// Path to the YAML configuration file
        #[arg(short, long, env = "YT_RELAY_CONFIG", default_value = "config/relay.yaml")]
        config: PathBuf,

        /// Override the configured bind address
        #[arg(long)]
        address: Option<String>,

        /// Override the configured bind port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, address, port } => serve(config, address, port).await,
    }
}

async fn serve(path: PathBuf, address: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut conf = Conf::load_from_file(&path)
        .await
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;

    if let Some(address) = address {
        conf.address = address;
    }
    if let Some(port) = port {
        conf.port = port;
    }

    init_logging(&conf.logging, &conf.app_name).context("failed to initialize logging")?;

    info!("🚀 Starting {}", conf.app_name);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        cache_enabled = conf.cache.is_enabled,
        redis = ?conf.redis.as_ref().map(|r| r.kind),
        metrics = conf.metrics.enabled,
        "📋 Configuration loaded"
    );

    let server = RelayServer::from_config(&conf).map_err(|e| {
        error!("Failed to build relay: {}", e);
        e
    })?;

    server.start(shutdown_signal()).await?;

    info!("✅ yt-relay shutdown complete");
    Ok(())
}
