//! # Cache Manager
//!
//! Best-effort facade over a [`CacheStore`]. Every error path degrades to
//! "act as if the cache were empty": reads that fail are misses, writes
//! that fail are logged and swallowed, and undecodable payloads are deleted
//! so the next aggregation overwrites them cleanly.

use super::stores::CacheStoreStats;
use super::{CacheResult, CacheStore};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Cache manager statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManagerStats {
    /// Total cache hits
    pub hits: u64,

    /// Total cache misses
    pub misses: u64,

    /// Cache hit ratio
    pub hit_ratio: f64,

    /// Total get operations
    pub operations: u64,

    /// Underlying store statistics
    pub store: CacheStoreStats,

    /// Statistics collection start time
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl Default for CacheManagerStats {
    fn default() -> Self {
        Self {
            hits: 0,
            misses: 0,
            hit_ratio: 0.0,
            operations: 0,
            store: CacheStoreStats::default(),
            start_time: chrono::Utc::now(),
        }
    }
}

/// Best-effort cache facade with namespace version bookkeeping.
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
    stats: Arc<RwLock<CacheManagerStats>>,
}

impl CacheManager {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            stats: Arc::new(RwLock::new(CacheManagerStats::default())),
        }
    }

    /// Name of the backing store, for diagnostic headers.
    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Get and deserialize a cached value.
    ///
    /// Store errors are treated as misses. Payloads that fail to decode —
    /// including values stored as a JSON string wrapping the document — are
    /// deleted and treated as misses, so a corrupt entry heals itself.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = match self.store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.record_get(false).await;
                return None;
            }
            Err(e) => {
                warn!("Cache read failed for key {}: {}", key, e);
                self.record_get(false).await;
                return None;
            }
        };

        match decode_payload::<T>(&bytes) {
            Some(value) => {
                self.record_get(true).await;
                Some(value)
            }
            None => {
                warn!("Deleting undecodable cache entry for key {}", key);
                if let Err(e) = self.store.delete(key).await {
                    warn!("Failed to delete corrupt cache entry {}: {}", key, e);
                }
                self.record_get(false).await;
                None
            }
        }
    }

    /// Serialize and store a value. A cache write failure must never abort
    /// the caller's primary flow, so failures are logged and swallowed.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Cache serialization failed for key {}: {}", key, e);
                return;
            }
        };

        if let Err(e) = self.store.set(key, &bytes, ttl).await {
            warn!("Cache write failed for key {}: {}", key, e);
        } else {
            debug!("Cached key {} with TTL {:?}", key, ttl);
        }
    }

    /// Delete a key; errors are swallowed.
    pub async fn delete(&self, key: &str) -> bool {
        match self.store.delete(key).await {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!("Cache delete failed for key {}: {}", key, e);
                false
            }
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.store.exists(key).await.unwrap_or(false)
    }

    /// Read-through helper: serve from cache, otherwise invoke `producer`
    /// and cache a non-empty result. Store failures degrade to calling the
    /// producer directly without caching.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
    ) -> Result<Option<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        if let Some(cached) = self.get_json::<T>(key).await {
            return Ok(Some(cached));
        }

        let produced = producer().await?;
        if let Some(value) = &produced {
            self.set_json(key, value, ttl).await;
        }
        Ok(produced)
    }

    /// Current version of a namespace; 0 when the counter is unset or the
    /// store is unreachable.
    pub async fn namespace_version(&self, namespace: &str) -> u64 {
        match self.store.get(&version_key(namespace)).await {
            Ok(Some(bytes)) => std::str::from_utf8(&bytes)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0),
            Ok(None) => 0,
            Err(e) => {
                warn!("Namespace version read failed for {}: {}", namespace, e);
                0
            }
        }
    }

    /// Bump a namespace version, stranding every key built with the old
    /// version. Returns the new version.
    pub async fn bump_namespace(&self, namespace: &str) -> CacheResult<u64> {
        let version = self.store.incr(&version_key(namespace)).await?;
        debug!("Namespace {} bumped to version {}", namespace, version);
        Ok(version)
    }

    /// Delete every key of a namespace by prefix. The secondary
    /// invalidation path next to version bumping.
    pub async fn flush_namespace(&self, namespace: &str) -> CacheResult<usize> {
        self.store.clear_prefix(&format!("{}:", namespace)).await
    }

    pub async fn stats(&self) -> CacheManagerStats {
        let mut stats = self.stats.read().await.clone();
        if let Ok(store_stats) = self.store.stats().await {
            stats.store = store_stats;
        }
        if stats.operations > 0 {
            stats.hit_ratio = stats.hits as f64 / stats.operations as f64;
        }
        stats
    }

    pub async fn health_check(&self) -> bool {
        self.store.health_check().await.unwrap_or(false)
    }

    async fn record_get(&self, hit: bool) {
        let mut stats = self.stats.write().await;
        stats.operations += 1;
        if hit {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
    }
}

fn version_key(namespace: &str) -> String {
    format!("ns:{}:version", namespace)
}

/// Decode a stored payload, tolerating both a plain JSON document and a
/// JSON string wrapping one.
fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    if let Ok(value) = serde_json::from_slice::<T>(bytes) {
        return Some(value);
    }
    let wrapped: String = serde_json::from_slice(bytes).ok()?;
    serde_json::from_str(&wrapped).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caching::stores::{MemoryStore, MemoryStoreConfig};

    fn manager() -> CacheManager {
        CacheManager::new(Arc::new(MemoryStore::new(MemoryStoreConfig::default())))
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        total: u64,
    }

    #[tokio::test]
    async fn test_json_roundtrip() {
        let cache = manager();
        let value = Payload { total: 42 };

        cache.set_json("k", &value, Duration::from_secs(60)).await;
        assert_eq!(cache.get_json::<Payload>("k").await, Some(value));
    }

    #[tokio::test]
    async fn test_string_wrapped_payload_decodes() {
        let cache = manager();
        // a value stored as a JSON string wrapping the document
        let wrapped = serde_json::to_vec(&"{\"total\":7}").unwrap();
        cache.store.set("k", &wrapped, Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get_json::<Payload>("k").await, Some(Payload { total: 7 }));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_deleted() {
        let cache = manager();
        cache.store.set("k", b"not json at all", Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get_json::<Payload>("k").await, None);
        assert!(!cache.exists("k").await);
    }

    #[tokio::test]
    async fn test_get_or_set_produces_on_miss_and_caches() {
        let cache = manager();

        let result: Result<Option<Payload>, &str> = cache
            .get_or_set("k", Duration::from_secs(60), || async {
                Ok(Some(Payload { total: 9 }))
            })
            .await;
        assert_eq!(result.unwrap(), Some(Payload { total: 9 }));

        // second call must not invoke the producer
        let result: Result<Option<Payload>, &str> = cache
            .get_or_set("k", Duration::from_secs(60), || async {
                panic!("producer must not run on a hit")
            })
            .await;
        assert_eq!(result.unwrap(), Some(Payload { total: 9 }));
    }

    #[tokio::test]
    async fn test_namespace_version_bump() {
        let cache = manager();

        assert_eq!(cache.namespace_version("products").await, 0);
        assert_eq!(cache.bump_namespace("products").await.unwrap(), 1);
        assert_eq!(cache.namespace_version("products").await, 1);
    }

    #[tokio::test]
    async fn test_bump_makes_old_key_unreachable_without_deletion() {
        let cache = manager();
        let keys = crate::caching::CacheKeyBuilder::new("products");

        let version = cache.namespace_version("products").await;
        let key = keys.build(version, &[("slug", Some("tees".to_string()))]);
        cache.set_json(&key, &Payload { total: 1 }, Duration::from_secs(60)).await;

        cache.bump_namespace("products").await.unwrap();
        let new_version = cache.namespace_version("products").await;
        let new_key = keys.build(new_version, &[("slug", Some("tees".to_string()))]);

        assert_ne!(key, new_key);
        // the old entry still physically exists; it is simply unreachable
        assert!(cache.exists(&key).await);
        assert_eq!(cache.get_json::<Payload>(&new_key).await, None);
    }

    #[tokio::test]
    async fn test_flush_namespace() {
        let cache = manager();

        cache.set_json("products:v0:a", &Payload { total: 1 }, Duration::from_secs(60)).await;
        cache.set_json("products:v1:b", &Payload { total: 2 }, Duration::from_secs(60)).await;
        cache.set_json("orders:v0:c", &Payload { total: 3 }, Duration::from_secs(60)).await;

        let removed = cache.flush_namespace("products").await.unwrap();
        assert_eq!(removed, 2);
        assert!(cache.exists("orders:v0:c").await);
    }
}
