//! # Catalog Gateway - Main Entry Point
//!
//! Loads configuration, initializes logging, and serves the gateway until
//! a shutdown signal arrives. The config file path comes from the first
//! CLI argument or `GATEWAY_CONFIG`; with neither, defaults plus
//! environment overrides apply.

use anyhow::Context;
use catalog_gateway::{CatalogConfig, GatewayServer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("Starting catalog gateway");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = load_config().await?;
    let server = GatewayServer::new(config)
        .await
        .context("Failed to initialize gateway")?;

    server.run().await.context("Gateway server failed")?;

    info!("Catalog gateway shutdown complete");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_gateway=info,tower_http=info".into()),
        )
        .init();
}

async fn load_config() -> anyhow::Result<CatalogConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("GATEWAY_CONFIG").ok());

    match path {
        Some(path) => {
            info!("Loading configuration from {}", path);
            CatalogConfig::load_from_file(&path)
                .await
                .with_context(|| format!("Failed to load config from {}", path))
        }
        None => {
            info!("No config file given, using defaults with environment overrides");
            let mut config = CatalogConfig::default();
            config.apply_env_overrides().context("Invalid environment override")?;
            config.validate().context("Invalid configuration")?;
            Ok(config)
        }
    }
}
