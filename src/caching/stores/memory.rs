//! # In-Memory Cache Store
//!
//! Process-local cache with TTL support, prefix enumeration, and automatic
//! cleanup of expired entries. Counter entries (namespace versions) never
//! expire.

use super::{CacheStore, CacheStoreStats};
use crate::caching::{now_unix_secs, CacheResult};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, warn};

/// In-memory cache configuration
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Maximum number of entries before eviction kicks in
    pub max_entries: usize,

    /// Cleanup interval for expired entries
    pub cleanup_interval: Duration,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Vec<u8>,
    /// Unix-seconds expiry; `None` for counters, which never expire.
    expires_at: Option<u64>,
}

impl MemoryEntry {
    fn new(value: Vec<u8>, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Some(now_unix_secs() + ttl.as_secs()),
        }
    }

    fn counter(value: u64) -> Self {
        Self {
            value: value.to_string().into_bytes(),
            expires_at: None,
        }
    }

    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => now_unix_secs() > at,
            None => false,
        }
    }
}

/// In-memory cache implementation
pub struct MemoryStore {
    config: MemoryStoreConfig,
    entries: Arc<DashMap<String, MemoryEntry>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    expired_cleanups: Arc<AtomicU64>,
    _cleanup_task: tokio::task::JoinHandle<()>,
}

impl MemoryStore {
    /// Create a new in-memory store with a background cleanup task
    pub fn new(config: MemoryStoreConfig) -> Self {
        let entries: Arc<DashMap<String, MemoryEntry>> = Arc::new(DashMap::new());

        let cleanup_task = {
            let entries = entries.clone();
            let cleanup_interval = config.cleanup_interval;
            tokio::spawn(async move {
                let mut interval = interval(cleanup_interval);
                loop {
                    interval.tick().await;
                    let before = entries.len();
                    entries.retain(|_, entry| !entry.is_expired());
                    let removed = before.saturating_sub(entries.len());
                    if removed > 0 {
                        debug!("Cleaned up {} expired cache entries", removed);
                    }
                }
            })
        };

        Self {
            config,
            entries,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            expired_cleanups: Arc::new(AtomicU64::new(0)),
            _cleanup_task: cleanup_task,
        }
    }

    /// Drop expired entries, then arbitrary ones, when the store is full.
    fn evict_if_full(&self) {
        if self.entries.len() < self.config.max_entries {
            return;
        }

        self.entries.retain(|_, entry| !entry.is_expired());

        if self.entries.len() >= self.config.max_entries {
            let overflow = self.entries.len() + 1 - self.config.max_entries;
            let victims: Vec<String> = self
                .entries
                .iter()
                .filter(|e| e.value().expires_at.is_some())
                .take(overflow)
                .map(|e| e.key().clone())
                .collect();
            for key in &victims {
                self.entries.remove(key);
            }
            warn!("Memory cache full, evicted {} entries", victims.len());
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired() {
                drop(entry);
                self.entries.remove(key);
                self.expired_cleanups.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
            self.hits.fetch_add(1, Ordering::Relaxed);
            Ok(Some(entry.value.clone()))
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            Ok(None)
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.evict_if_full();
        self.entries
            .insert(key.to_string(), MemoryEntry::new(value.to_vec(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        match self.entries.get(key) {
            Some(entry) => Ok(!entry.is_expired()),
            None => Ok(false),
        }
    }

    async fn clear_prefix(&self, prefix: &str) -> CacheResult<usize> {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();

        let mut removed = 0;
        for key in &keys {
            if self.entries.remove(key).is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            debug!("Cleared {} entries with prefix {}", removed, prefix);
        }
        Ok(removed)
    }

    async fn incr(&self, key: &str) -> CacheResult<u64> {
        let mut next = 1u64;
        self.entries
            .entry(key.to_string())
            .and_modify(|entry| {
                let current = std::str::from_utf8(&entry.value)
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(0);
                next = current + 1;
                *entry = MemoryEntry::counter(next);
            })
            .or_insert_with(|| MemoryEntry::counter(1));
        Ok(next)
    }

    async fn stats(&self) -> CacheResult<CacheStoreStats> {
        Ok(CacheStoreStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired_cleanups: self.expired_cleanups.load(Ordering::Relaxed),
        })
    }

    async fn health_check(&self) -> CacheResult<bool> {
        let test_key = "__health_check__";
        let test_value = b"health_check_value";

        self.set(test_key, test_value, Duration::from_secs(1)).await?;
        let retrieved = self.get(test_key).await?;
        self.delete(test_key).await?;

        Ok(retrieved.as_deref() == Some(test_value.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_basic_operations() {
        let store = MemoryStore::new(MemoryStoreConfig::default());

        let key = "test_key";
        let value = b"test_value";
        let ttl = Duration::from_secs(60);

        store.set(key, value, ttl).await.unwrap();
        let result = store.get(key).await.unwrap();
        assert_eq!(result, Some(value.to_vec()));

        assert!(store.exists(key).await.unwrap());

        assert!(store.delete(key).await.unwrap());
        assert!(!store.exists(key).await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let store = MemoryStore::new(MemoryStoreConfig::default());

        // zero-second TTL expires as soon as the clock ticks past the
        // stored second
        store.set("expire_test", b"v", Duration::from_secs(0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let result = store.get("expire_test").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_clear_prefix() {
        let store = MemoryStore::new(MemoryStoreConfig::default());
        let ttl = Duration::from_secs(60);

        store.set("v1:products:a", b"a", ttl).await.unwrap();
        store.set("v1:products:b", b"b", ttl).await.unwrap();
        store.set("v1:orders:c", b"c", ttl).await.unwrap();

        let removed = store.clear_prefix("v1:products:").await.unwrap();
        assert_eq!(removed, 2);
        assert!(!store.exists("v1:products:a").await.unwrap());
        assert!(store.exists("v1:orders:c").await.unwrap());
    }

    #[tokio::test]
    async fn test_incr_counter() {
        let store = MemoryStore::new(MemoryStoreConfig::default());

        assert_eq!(store.incr("ns:products:version").await.unwrap(), 1);
        assert_eq!(store.incr("ns:products:version").await.unwrap(), 2);
        assert_eq!(store.incr("ns:products:version").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_eviction_spares_counters() {
        let config = MemoryStoreConfig {
            max_entries: 3,
            ..Default::default()
        };
        let store = MemoryStore::new(config);

        store.incr("counter").await.unwrap();
        for i in 0..5 {
            let key = format!("key_{}", i);
            store.set(&key, b"v", Duration::from_secs(60)).await.unwrap();
        }

        // counter entries are never chosen as eviction victims
        assert_eq!(store.incr("counter").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_stats() {
        let store = MemoryStore::new(MemoryStoreConfig::default());

        store.set("key1", b"value1", Duration::from_secs(60)).await.unwrap();
        store.get("key1").await.unwrap(); // hit
        store.get("key2").await.unwrap(); // miss

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_health_check() {
        let store = MemoryStore::new(MemoryStoreConfig::default());
        assert!(tokio_test::assert_ok!(store.health_check().await));
    }
}
