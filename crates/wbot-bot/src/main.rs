//! Wallet bot session service - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

/// Wallet bot session service
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via WBOT_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Wallet address to connect on startup
    #[arg(short, long)]
    address: Option<String>,

    /// Start with simulation mode enabled
    #[arg(long)]
    simulate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Determine config path: CLI arg > WBOT_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("WBOT_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    let (config, found) = wbot_bot::AppConfig::from_file_or_default(&config_path)?;

    wbot_telemetry::init_logging_with_level(config.telemetry.log_level.as_deref())?;

    info!("Starting wallet bot v{}", env!("CARGO_PKG_VERSION"));
    if found {
        info!(config_path = %config_path, "Configuration loaded");
    } else {
        warn!(config_path = %config_path, "Config file not found, using defaults");
    }

    let app = wbot_bot::Application::new(config)?;
    app.run(args.address, args.simulate).await?;

    Ok(())
}
