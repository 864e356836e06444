//! Pulse Oracle - Token Analysis and Signal Engine
//!
//! Discovers tokens, derives indicators and tracks AI-driven signals.

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use pulse_oracle::adapters::cli;
use pulse_oracle::config::load_config;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (API keys go here, not in oracle.toml)
    dotenvy::dotenv().ok();

    let app = cli::init();

    // A broken config is reported by the command itself
    let configured_level = load_config(app.command.config_path()).ok().map(|c| c.logging.level);
    init_logging(app.verbose, app.debug, configured_level)?;

    cli::execute(app).await
}

/// RUST_LOG wins, then --debug / --verbose, then [logging].level
fn init_logging(verbose: bool, debug: bool, configured_level: Option<String>) -> Result<()> {
    let fallback = if debug {
        "debug".to_string()
    } else if verbose {
        "info".to_string()
    } else {
        configured_level.unwrap_or_else(|| "warn".to_string())
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    fmt().with_env_filter(filter).with_target(false).init();
    Ok(())
}
