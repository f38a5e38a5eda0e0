//! # Catalog Client
//!
//! Typed client over the gateway's listing endpoint. Every call goes
//! through the request coalescer, and the boundary never surfaces an
//! error: callers always receive a renderable [`Listing`].

use super::coalescer::{CoalescerConfig, RequestCoalescer};
use crate::core::config::ClientSettings;
use crate::core::error::{CatalogError, CatalogResult};
use crate::core::types::{Listing, ListingQuery};
use reqwest::StatusCode;
use url::Url;

pub struct CatalogClient {
    http: reqwest::Client,
    base_url: Url,
    cache: RequestCoalescer<Listing>,
}

impl CatalogClient {
    pub fn new(base_url: &str, config: CoalescerConfig) -> CatalogResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| CatalogError::config(format!("Invalid gateway base_url: {}", e)))?;

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| CatalogError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            cache: RequestCoalescer::new(config),
        })
    }

    /// Build a client from the shared service configuration.
    pub fn from_settings(base_url: &str, settings: ClientSettings) -> CatalogResult<Self> {
        Self::new(base_url, settings.into())
    }

    /// Fetch a product listing. Concurrent identical calls coalesce into
    /// one request; failures fall back to stale data or an empty listing.
    pub async fn products(&self, query: &ListingQuery) -> Listing {
        let pairs = query_pairs(query);
        let key = cache_key(&pairs);

        self.cache
            .fetch(&key, || async { self.fetch_listing(&pairs).await })
            .await
    }

    async fn fetch_listing(&self, pairs: &[(&'static str, String)]) -> CatalogResult<Listing> {
        let url = self
            .base_url
            .join("products")
            .map_err(|e| CatalogError::config(format!("Invalid products URL: {}", e)))?;

        let response = self.http.get(url).query(pairs).send().await?;

        if response.status() == StatusCode::NO_CONTENT {
            // nothing matched after filtering; an empty listing renders fine
            return Ok(Listing::default());
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::upstream(status, body));
        }

        Ok(response.json().await?)
    }
}

/// Query pairs for every set parameter, in wire order.
fn query_pairs(query: &ListingQuery) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();

    if let Some(v) = query.per_page {
        pairs.push(("per_page", v.to_string()));
    }
    if let Some(v) = query.page {
        pairs.push(("page", v.to_string()));
    }
    if let Some(v) = &query.search {
        pairs.push(("search", v.clone()));
    }
    if let Some(v) = &query.orderby {
        pairs.push(("orderby", v.clone()));
    }
    if let Some(v) = &query.order {
        pairs.push(("order", v.clone()));
    }
    if let Some(v) = &query.slug {
        pairs.push(("slug", v.clone()));
    }
    if let Some(v) = &query.category {
        pairs.push(("category", v.clone()));
    }
    if let Some(v) = query.on_sale {
        pairs.push(("on_sale", v.to_string()));
    }
    if let Some(v) = query.price_min {
        pairs.push(("price_min", v.to_string()));
    }
    if let Some(v) = query.price_max {
        pairs.push(("price_max", v.to_string()));
    }
    if let Some(v) = query.merge {
        pairs.push(("merge", v.to_string()));
    }
    if let Some(v) = query.require_images {
        pairs.push(("require_images", v.to_string()));
    }
    if let Some(v) = query.refresh {
        pairs.push(("refresh", v.to_string()));
    }
    if let Some(v) = &query.fields {
        pairs.push(("_fields", v.clone()));
    }

    pairs
}

/// Deterministic per-process cache key: sorted `name=value` pairs.
fn cache_key(pairs: &[(&'static str, String)]) -> String {
    let mut parts: Vec<String> = pairs
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect();
    parts.sort_unstable();
    parts.join("&")
}
