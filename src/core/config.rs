//! # Configuration Module
//!
//! Configuration management for the catalog gateway.
//!
//! ## Key Features
//! - YAML configuration parsing with serde
//! - Environment variable override support (`GATEWAY_*`)
//! - Validation with detailed error messages

use crate::core::error::{CatalogError, CatalogResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Main gateway configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// HTTP server settings
    pub server: ServerSettings,

    /// Upstream commerce API settings
    pub upstream: UpstreamSettings,

    /// Cache store and TTL settings
    pub cache: CacheSettings,

    /// Image-domain allow-list settings
    pub images: ImageSettings,

    /// Client-side coalescer settings
    pub client: ClientSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address, e.g. `0.0.0.0:8080`
    pub bind_address: String,

    /// Enable CORS handling
    pub enable_cors: bool,

    /// Enable response compression
    pub enable_compression: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    /// Base URL of the commerce REST API, e.g. `https://shop.example.com/wp-json/wc/v3`
    pub base_url: String,

    /// Optional API consumer key passed as a query credential
    pub consumer_key: Option<String>,

    /// Optional API consumer secret passed as a query credential
    pub consumer_secret: Option<String>,

    /// Deadline for a single upstream call
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Page size used when walking category children
    pub category_page_size: u64,
}

/// Which store backend holds cached listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Selected store backend
    pub store: StoreBackend,

    /// Redis store settings (used when `store = redis`)
    pub redis: RedisSettings,

    /// In-memory store settings (used when `store = memory`)
    pub memory: MemorySettings,

    /// Logical namespace for listing keys
    pub namespace: String,

    /// TTL for successfully aggregated listings
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,

    /// Short TTL for empty-success results so transient upstream
    /// hiccups self-heal quickly
    #[serde(with = "humantime_serde")]
    pub empty_ttl: Duration,

    /// Age past which a cached listing is served with `is_stale = true`
    #[serde(with = "humantime_serde")]
    pub stale_after: Duration,

    /// Upper bound on items accumulated by a merge-all fetch loop
    pub max_merged_items: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,

    /// Key prefix for all cache entries
    pub key_prefix: String,

    /// Maximum number of retries per operation
    pub max_retries: u32,

    /// Delay between retries
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    /// Maximum number of entries before eviction kicks in
    pub max_entries: usize,

    /// Cleanup interval for expired entries
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    /// Hosts allowed to serve product images; an image whose host is not
    /// listed here is dropped from the converted product.
    pub allowed_hosts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Freshness window for the client-side coalescer cache
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// Window during which stale data may be served after a failed fetch
    #[serde(with = "humantime_serde")]
    pub stale_ttl: Duration,

    /// Upper bound on how long a caller waits for an in-flight fetch
    #[serde(with = "humantime_serde")]
    pub wait_timeout: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            upstream: UpstreamSettings::default(),
            cache: CacheSettings::default(),
            images: ImageSettings::default(),
            client: ClientSettings::default(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            enable_cors: true,
            enable_compression: true,
        }
    }
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/wp-json/wc/v3".to_string(),
            consumer_key: None,
            consumer_secret: None,
            request_timeout: Duration::from_secs(20),
            category_page_size: 100,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            store: StoreBackend::Memory,
            redis: RedisSettings::default(),
            memory: MemorySettings::default(),
            namespace: "products".to_string(),
            default_ttl: Duration::from_secs(600),
            empty_ttl: Duration::from_secs(60),
            stale_after: Duration::from_secs(300),
            max_merged_items: 10_000,
        }
    }
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: "catalog:".to_string(),
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            allowed_hosts: Vec::new(),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            stale_ttl: Duration::from_secs(3600),
            wait_timeout: Duration::from_secs(5),
        }
    }
}

impl CatalogConfig {
    /// Load configuration from a YAML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> CatalogResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CatalogError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: CatalogConfig = serde_yaml::from_str(&content)
            .map_err(|e| CatalogError::config(format!("Failed to parse config: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    ///
    /// Environment variables follow the pattern: GATEWAY_<SECTION>_<FIELD>
    /// For example: GATEWAY_UPSTREAM_BASE_URL=https://shop.example.com/wp-json/wc/v3
    pub fn apply_env_overrides(&mut self) -> CatalogResult<()> {
        use std::env;

        if let Ok(addr) = env::var("GATEWAY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }

        if let Ok(url) = env::var("GATEWAY_UPSTREAM_BASE_URL") {
            self.upstream.base_url = url;
        }

        if let Ok(key) = env::var("GATEWAY_UPSTREAM_CONSUMER_KEY") {
            self.upstream.consumer_key = Some(key);
        }

        if let Ok(secret) = env::var("GATEWAY_UPSTREAM_CONSUMER_SECRET") {
            self.upstream.consumer_secret = Some(secret);
        }

        if let Ok(timeout) = env::var("GATEWAY_UPSTREAM_TIMEOUT") {
            self.upstream.request_timeout = humantime::parse_duration(&timeout)
                .map_err(|e| CatalogError::config(format!("Invalid GATEWAY_UPSTREAM_TIMEOUT: {}", e)))?;
        }

        if let Ok(store) = env::var("GATEWAY_CACHE_STORE") {
            self.cache.store = match store.to_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                "redis" => StoreBackend::Redis,
                other => {
                    return Err(CatalogError::config(format!(
                        "Invalid GATEWAY_CACHE_STORE: {}",
                        other
                    )))
                }
            };
        }

        if let Ok(url) = env::var("GATEWAY_REDIS_URL") {
            self.cache.redis.url = url;
        }

        if let Ok(ttl) = env::var("GATEWAY_CACHE_DEFAULT_TTL") {
            self.cache.default_ttl = humantime::parse_duration(&ttl)
                .map_err(|e| CatalogError::config(format!("Invalid GATEWAY_CACHE_DEFAULT_TTL: {}", e)))?;
        }

        if let Ok(ttl) = env::var("GATEWAY_CACHE_EMPTY_TTL") {
            self.cache.empty_ttl = humantime::parse_duration(&ttl)
                .map_err(|e| CatalogError::config(format!("Invalid GATEWAY_CACHE_EMPTY_TTL: {}", e)))?;
        }

        if let Ok(hosts) = env::var("GATEWAY_IMAGE_ALLOWED_HOSTS") {
            self.images.allowed_hosts = hosts
                .split(',')
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .collect();
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> CatalogResult<()> {
        Url::parse(&self.upstream.base_url)
            .map_err(|e| CatalogError::config(format!("Invalid upstream base_url: {}", e)))?;

        if self.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(CatalogError::config(format!(
                "Invalid server bind_address: {}",
                self.server.bind_address
            )));
        }

        if self.cache.namespace.is_empty() {
            return Err(CatalogError::config("Cache namespace cannot be empty"));
        }

        if self.upstream.category_page_size == 0 || self.upstream.category_page_size > 100 {
            return Err(CatalogError::config(
                "upstream.category_page_size must be in 1..=100",
            ));
        }

        if self.cache.max_merged_items == 0 {
            return Err(CatalogError::config("cache.max_merged_items must be positive"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CatalogConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let mut config = CatalogConfig::default();
        config.upstream.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_from_file_with_env_semantics() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "upstream:\n  base_url: \"https://shop.example.com/wp-json/wc/v3\"\ncache:\n  empty_ttl: \"30s\"\n"
        )
        .unwrap();

        let config = CatalogConfig::load_from_file(file.path()).await.unwrap();
        assert_eq!(
            config.upstream.base_url,
            "https://shop.example.com/wp-json/wc/v3"
        );
        assert_eq!(config.cache.empty_ttl, Duration::from_secs(30));
    }

    #[test]
    fn test_yaml_roundtrip_with_partial_file() {
        let yaml = r#"
upstream:
  base_url: "https://shop.example.com/wp-json/wc/v3"
  request_timeout: "10s"
cache:
  store: memory
  default_ttl: "5m"
images:
  allowed_hosts: ["cdn.example.com"]
"#;
        let config: CatalogConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.upstream.request_timeout, Duration::from_secs(10));
        assert_eq!(config.cache.default_ttl, Duration::from_secs(300));
        assert_eq!(config.images.allowed_hosts, vec!["cdn.example.com"]);
        // untouched sections fall back to defaults
        assert_eq!(config.cache.namespace, "products");
        assert!(config.validate().is_ok());
    }
}
