//! Flowise Relay - Main entry point.

use anyhow::Result;
use relay_channels::start_server;
use relay_common::config::Config;
use relay_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load_with_env()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Flowise Relay v{}", env!("CARGO_PKG_VERSION"));

    if config.bot.credentials_configured() {
        tracing::info!(app_id = %config.bot.app_id, "Bot Framework credentials configured");
    } else {
        tracing::warn!("No Bot Framework credentials, outbound auth disabled (emulator mode)");
    }

    // Start the HTTP server
    start_server(&config).await
}
