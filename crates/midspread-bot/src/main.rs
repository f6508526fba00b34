//! Midspread market maker - entry point.
//!
//! Runs the quote loop against the paper venue: live public Kraken market
//! data with a simulated account.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Midspread market maker
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via MIDSPREAD_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    midspread_telemetry::init_logging()?;

    info!("Starting midspread v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > MIDSPREAD_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("MIDSPREAD_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = midspread_bot::AppConfig::from_file(&config_path)?;
    info!(
        market1 = %config.market1,
        market2 = %config.market2,
        stacking = ?config.stacking_path(),
        "Configuration loaded"
    );

    let app = midspread_bot::Application::paper(config)?;
    app.run().await?;

    Ok(())
}
