//! # Redis Cache Store
//!
//! Redis-backed store shared by all gateway instances. Uses a managed
//! connection with retry-and-reconnect on failure, SCAN-based prefix
//! deletion, and INCR for namespace version counters.

use super::{CacheStore, CacheStoreStats};
use crate::caching::CacheResult;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisResult};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Redis store configuration
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis connection URL
    pub url: String,

    /// Key prefix for all cache entries
    pub key_prefix: String,

    /// Maximum number of retries per operation
    pub max_retries: u32,

    /// Delay between retries
    pub retry_delay: Duration,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: "catalog:".to_string(),
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// Redis cache implementation
pub struct RedisStore {
    config: RedisStoreConfig,
    connection: Arc<RwLock<ConnectionManager>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    connection_errors: Arc<AtomicU64>,
}

impl RedisStore {
    /// Connect to Redis and create the store
    pub async fn new(config: RedisStoreConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.as_str())?;
        let connection = ConnectionManager::new(client).await?;

        info!("Redis cache connected to {}", config.url);

        Ok(Self {
            config,
            connection: Arc::new(RwLock::new(connection)),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            connection_errors: Arc::new(AtomicU64::new(0)),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    async fn connection(&self) -> ConnectionManager {
        self.connection.read().await.clone()
    }

    async fn reconnect(&self) -> CacheResult<()> {
        let client = Client::open(self.config.url.as_str())?;
        let fresh = ConnectionManager::new(client).await?;

        let mut conn = self.connection.write().await;
        *conn = fresh;

        info!("Reconnected to Redis");
        Ok(())
    }

    /// Run a Redis operation, retrying with a fresh connection on failure.
    async fn execute_with_retry<T, F, Fut>(&self, operation: F) -> CacheResult<T>
    where
        F: Fn(ConnectionManager) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let mut attempt = 0;
        loop {
            let conn = self.connection().await;
            match operation(conn).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    self.connection_errors.fetch_add(1, Ordering::Relaxed);
                    if attempt >= self.config.max_retries {
                        return Err(e.into());
                    }
                    attempt += 1;
                    warn!("Redis operation failed (attempt {}): {}", attempt, e);
                    tokio::time::sleep(self.config.retry_delay * attempt).await;
                    if let Err(err) = self.reconnect().await {
                        warn!("Failed to reconnect to Redis: {}", err);
                    }
                }
            }
        }
    }

    /// Collect all keys matching `pattern` via SCAN.
    async fn scan_keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        self.execute_with_retry(|mut conn| {
            let pattern = pattern.to_string();
            async move {
                let mut cursor = 0u64;
                let mut all_keys = Vec::new();

                loop {
                    let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(500)
                        .query_async(&mut conn)
                        .await?;

                    all_keys.extend(keys);

                    if next == 0 {
                        break;
                    }
                    cursor = next;
                }

                Ok::<Vec<String>, redis::RedisError>(all_keys)
            }
        })
        .await
    }
}

#[async_trait::async_trait]
impl CacheStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let full_key = self.full_key(key);

        let result = self
            .execute_with_retry(|mut conn| {
                let key = full_key.clone();
                async move { conn.get::<_, Option<Vec<u8>>>(&key).await }
            })
            .await?;

        match &result {
            Some(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Redis cache hit for key: {}", key);
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Redis cache miss for key: {}", key);
            }
        }

        Ok(result)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let full_key = self.full_key(key);
        let ttl_seconds = ttl.as_secs().max(1);
        let value = value.to_vec();

        self.execute_with_retry(|mut conn| {
            let key = full_key.clone();
            let value = value.clone();
            async move { conn.set_ex::<_, _, ()>(&key, &value, ttl_seconds).await }
        })
        .await?;

        debug!("Set Redis cache key: {} with TTL: {:?}", key, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let full_key = self.full_key(key);

        let deleted: i32 = self
            .execute_with_retry(|mut conn| {
                let key = full_key.clone();
                async move { conn.del(&key).await }
            })
            .await?;

        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let full_key = self.full_key(key);

        let exists: bool = self
            .execute_with_retry(|mut conn| {
                let key = full_key.clone();
                async move { conn.exists(&key).await }
            })
            .await?;

        Ok(exists)
    }

    async fn clear_prefix(&self, prefix: &str) -> CacheResult<usize> {
        let pattern = format!("{}{}*", self.config.key_prefix, prefix);
        let keys = self.scan_keys(&pattern).await?;

        if keys.is_empty() {
            return Ok(0);
        }

        let deleted: usize = self
            .execute_with_retry(|mut conn| {
                let keys = keys.clone();
                async move { conn.del(&keys).await }
            })
            .await?;

        info!("Cleared {} keys with prefix {}", deleted, prefix);
        Ok(deleted)
    }

    async fn incr(&self, key: &str) -> CacheResult<u64> {
        let full_key = self.full_key(key);

        let value: u64 = self
            .execute_with_retry(|mut conn| {
                let key = full_key.clone();
                async move { conn.incr(&key, 1u64).await }
            })
            .await?;

        Ok(value)
    }

    async fn stats(&self) -> CacheResult<CacheStoreStats> {
        let pattern = format!("{}*", self.config.key_prefix);
        let entries = self.scan_keys(&pattern).await.map(|k| k.len()).unwrap_or(0);

        Ok(CacheStoreStats {
            entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired_cleanups: 0, // Redis handles TTL cleanup internally
        })
    }

    async fn health_check(&self) -> CacheResult<bool> {
        let result = self
            .execute_with_retry(|mut conn| async move {
                redis::cmd("PING").query_async::<_, String>(&mut conn).await
            })
            .await;

        match result {
            Ok(response) => Ok(response == "PONG"),
            Err(_) => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RedisStoreConfig {
        RedisStoreConfig {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into()),
            key_prefix: "catalog-test:".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    #[ignore] // Requires a running Redis instance
    async fn test_basic_operations() {
        let store = RedisStore::new(test_config()).await.unwrap();

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
    #[ignore] // Requires a running Redis instance
    async fn test_incr_and_clear_prefix() {
        let store = RedisStore::new(test_config()).await.unwrap();

        let first = store.incr("ns:test:version").await.unwrap();
        let second = store.incr("ns:test:version").await.unwrap();
        assert_eq!(second, first + 1);

        store.set("v1:test:a", b"a", Duration::from_secs(60)).await.unwrap();
        store.set("v1:test:b", b"b", Duration::from_secs(60)).await.unwrap();
        let removed = store.clear_prefix("v1:test:").await.unwrap();
        assert_eq!(removed, 2);

        store.delete("ns:test:version").await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires a running Redis instance
    async fn test_health_check() {
        let store = RedisStore::new(test_config()).await.unwrap();
        assert!(store.health_check().await.unwrap());
    }
}
