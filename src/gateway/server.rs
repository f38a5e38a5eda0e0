//! # HTTP Server Module
//!
//! Server wiring: application state construction from configuration, the
//! axum router, and the serve loop with graceful shutdown.

use super::{admin, handlers};
use crate::caching::stores::{MemoryStoreConfig, RedisStoreConfig};
use crate::caching::{CacheManager, CacheStore, MemoryStore, RedisStore};
use crate::catalog::{ListingAggregator, UpstreamClient};
use crate::core::config::{CatalogConfig, StoreBackend};
use crate::core::error::{CatalogError, CatalogResult};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared server state
#[derive(Clone)]
pub struct AppState {
    /// Listing aggregator
    pub aggregator: Arc<ListingAggregator>,

    /// Cache manager, shared with the aggregator
    pub cache: Arc<CacheManager>,

    /// Service configuration
    pub config: Arc<CatalogConfig>,
}

impl AppState {
    /// Build the full component graph from configuration.
    pub async fn from_config(config: CatalogConfig) -> CatalogResult<Self> {
        let store: Arc<dyn CacheStore> = match config.cache.store {
            StoreBackend::Memory => Arc::new(MemoryStore::new(MemoryStoreConfig {
                max_entries: config.cache.memory.max_entries,
                cleanup_interval: config.cache.memory.cleanup_interval,
            })),
            StoreBackend::Redis => Arc::new(
                RedisStore::new(RedisStoreConfig {
                    url: config.cache.redis.url.clone(),
                    key_prefix: config.cache.redis.key_prefix.clone(),
                    max_retries: config.cache.redis.max_retries,
                    retry_delay: config.cache.redis.retry_delay,
                })
                .await
                .map_err(|e| CatalogError::config(format!("Failed to connect to Redis: {}", e)))?,
            ),
        };

        let cache = Arc::new(CacheManager::new(store));
        let upstream = Arc::new(UpstreamClient::new(config.upstream.clone())?);
        let aggregator = Arc::new(ListingAggregator::new(
            upstream,
            cache.clone(),
            config.cache.clone(),
            config.images.clone(),
        ));

        Ok(Self {
            aggregator,
            cache,
            config: Arc::new(config),
        })
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let enable_compression = state.config.server.enable_compression;
    let enable_cors = state.config.server.enable_cors;

    let mut router = Router::new()
        .route("/products", get(handlers::list_products))
        .route("/health", get(admin::health))
        .merge(admin::admin_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_compression {
        router = router.layer(CompressionLayer::new());
    }
    if enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
}

/// The catalog gateway server
pub struct GatewayServer {
    state: AppState,
}

impl GatewayServer {
    pub async fn new(config: CatalogConfig) -> CatalogResult<Self> {
        config.validate()?;
        let state = AppState::from_config(config).await?;
        Ok(Self { state })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until a shutdown signal arrives.
    pub async fn run(self) -> CatalogResult<()> {
        let addr: SocketAddr = self
            .state
            .config
            .server
            .bind_address
            .parse()
            .map_err(|e| CatalogError::config(format!("Invalid bind address: {}", e)))?;

        let app = router(self.state);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| CatalogError::internal(format!("Failed to bind {}: {}", addr, e)))?;

        info!("Catalog gateway listening on {}", addr);

        let shutdown = CancellationToken::new();
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                signal_token.cancel();
            }
        });

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| CatalogError::internal(format!("Server error: {}", e)))?;

        info!("Catalog gateway shutdown complete");
        Ok(())
    }
}
