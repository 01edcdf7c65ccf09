//! Lifeline CLI
//!
//! Runs the connectivity monitor against a backend and serves the status and
//! retry surface.

use std::path::PathBuf;

use clap::Parser;
use lifeline::{load_config, Config, LifelineBuilder};
use tracing::Level;

#[derive(Parser)]
#[command(name = "lifeline")]
#[command(about = "Resilient RPC client with offline fallback")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config file)
    #[arg(long)]
    base_url: Option<String>,

    /// Status surface port (overrides config file)
    #[arg(long)]
    status_port: Option<u16>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, base_url={:?}, status_port={:?}, log_level={:?}",
        args.config,
        args.base_url,
        args.status_port,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    if let Some(base_url) = args.base_url {
        config.backend.base_url = base_url;
    }
    if let Some(status_port) = args.status_port {
        config.status.port = status_port;
    }

    tracing::info!("Starting lifeline");
    tracing::debug!(
        "Backend: {}, probe interval: {}s, forced fallback: {}",
        config.backend.base_url,
        config.connectivity.probe_interval_seconds,
        config.connectivity.force_fallback
    );

    LifelineBuilder::new(config).build()?.start().await?;

    Ok(())
}
