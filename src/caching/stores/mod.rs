//! # Cache Stores Module
//!
//! Store implementations behind the [`CacheStore`] trait: a process-local
//! in-memory store and a Redis-backed store safe for concurrent access from
//! many gateway instances.

pub mod memory;
pub mod redis_store;

pub use memory::{MemoryStore, MemoryStoreConfig};
pub use redis_store::{RedisStore, RedisStoreConfig};

use super::CacheResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Trait for cache store implementations.
///
/// Writes are idempotent whole-entry replacements; there is no partial
/// mutation. `incr` is the one exception: an atomic counter used for
/// namespace versions, stored without expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Store name for diagnostics ("memory", "redis").
    fn name(&self) -> &'static str;

    /// Get a value from the cache
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Set a value in the cache with TTL
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Delete a value from the cache
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Check if a key exists in the cache
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Enumerate all keys with the given prefix and delete them,
    /// returning how many were removed
    async fn clear_prefix(&self, prefix: &str) -> CacheResult<usize>;

    /// Atomically increment a non-expiring counter, returning the new value.
    /// A missing counter increments to 1.
    async fn incr(&self, key: &str) -> CacheResult<u64>;

    /// Get cache statistics
    async fn stats(&self) -> CacheResult<CacheStoreStats>;

    /// Perform health check
    async fn health_check(&self) -> CacheResult<bool>;
}

/// Cache store statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStoreStats {
    /// Number of entries
    pub entries: usize,

    /// Number of hits
    pub hits: u64,

    /// Number of misses
    pub misses: u64,

    /// Number of expired entries cleaned up
    pub expired_cleanups: u64,
}
