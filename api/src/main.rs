//! Orderwire API server binary.
//!
//! Entry point for the WebSocket fan-out server.

use anyhow::Context;
use orderwire_api::{AppState, Server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,orderwire_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().context("invalid ORDERWIRE_* configuration")?;
    let state = AppState::new(config.clone());

    tracing::info!(
        "Starting Orderwire API server on {}:{}",
        config.host,
        config.port
    );

    let server = Server::new(config, state);
    server.run().await?;

    Ok(())
}
