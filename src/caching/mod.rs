//! # Caching System Module
//!
//! The versioned, TTL-based cache behind the listing aggregator. It supports
//! in-memory and Redis-backed storage, deterministic cache key generation,
//! and generation-counter invalidation via per-namespace versions.
//!
//! ## Architecture
//! 1. **Cache Stores**: in-memory and Redis implementations behind one trait
//! 2. **Cache Manager**: best-effort facade with self-healing reads and
//!    namespace version bookkeeping
//! 3. **Key Builder**: order-independent serialization of a filter set
//!
//! The whole subsystem is best-effort: every error path degrades to "act as
//! if the cache were empty" rather than propagating to callers.

pub mod key;
pub mod manager;
pub mod stores;

pub use key::CacheKeyBuilder;
pub use manager::{CacheManager, CacheManagerStats};
pub use stores::{CacheStore, CacheStoreStats, MemoryStore, RedisStore};

/// Cache operation result
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific error types
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache store error: {message}")]
    Store { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache configuration error: {message}")]
    Configuration { message: String },
}

/// Current wall-clock time as unix seconds.
pub(crate) fn now_unix_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}
