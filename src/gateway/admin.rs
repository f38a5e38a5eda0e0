//! # Admin Interface
//!
//! Health and cache-management endpoints: statistics, namespace version
//! bumps (the out-of-band invalidation signal), and prefix flushes (the
//! secondary invalidation path).

use super::server::AppState;
use crate::caching::CacheManagerStats;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tracing::{info, warn};

/// Admin router, merged into the main application router.
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/admin/cache/stats", get(cache_stats))
        .route("/admin/cache/bump", post(bump_namespace))
        .route("/admin/cache/flush", post(flush_namespace))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cache_healthy: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub store: &'static str,
    pub namespace: String,
    pub namespace_version: u64,
    pub stats: CacheManagerStats,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct InvalidationResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let cache_healthy = state.cache.health_check().await;
    Json(HealthResponse {
        status: "ok",
        cache_healthy,
        timestamp: chrono::Utc::now(),
    })
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    let namespace = state.config.cache.namespace.clone();
    let namespace_version = state.cache.namespace_version(&namespace).await;
    let stats = state.cache.stats().await;

    Json(CacheStatsResponse {
        store: state.cache.store_name(),
        namespace,
        namespace_version,
        stats,
        timestamp: chrono::Utc::now(),
    })
}

/// Bump the namespace version, stranding every previously cached listing.
pub async fn bump_namespace(State(state): State<AppState>) -> Json<InvalidationResponse> {
    let namespace = &state.config.cache.namespace;

    match state.cache.bump_namespace(namespace).await {
        Ok(version) => {
            info!("Namespace {} bumped to version {}", namespace, version);
            Json(InvalidationResponse {
                success: true,
                message: format!("Namespace {} bumped", namespace),
                namespace_version: Some(version),
                removed: None,
                timestamp: chrono::Utc::now(),
            })
        }
        Err(e) => {
            warn!("Namespace bump failed for {}: {}", namespace, e);
            Json(InvalidationResponse {
                success: false,
                message: format!("Namespace bump failed: {}", e),
                namespace_version: None,
                removed: None,
                timestamp: chrono::Utc::now(),
            })
        }
    }
}

/// Physically delete every key of the namespace, across all versions.
pub async fn flush_namespace(State(state): State<AppState>) -> Json<InvalidationResponse> {
    let namespace = &state.config.cache.namespace;

    match state.cache.flush_namespace(namespace).await {
        Ok(removed) => {
            info!("Flushed {} entries from namespace {}", removed, namespace);
            Json(InvalidationResponse {
                success: true,
                message: format!("Namespace {} flushed", namespace),
                namespace_version: None,
                removed: Some(removed),
                timestamp: chrono::Utc::now(),
            })
        }
        Err(e) => {
            warn!("Namespace flush failed for {}: {}", namespace, e);
            Json(InvalidationResponse {
                success: false,
                message: format!("Namespace flush failed: {}", e),
                namespace_version: None,
                removed: None,
                timestamp: chrono::Utc::now(),
            })
        }
    }
}
