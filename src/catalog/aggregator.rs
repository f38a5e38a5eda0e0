//! # Product Listing Aggregator
//!
//! The orchestrator behind the listing endpoint. One request flows
//! RESOLVE_CATEGORY → BUILD_KEY → CACHE_LOOKUP → (HIT | FETCH_LOOP) →
//! STORE → RESPOND. Merge-all mode concatenates every upstream page into a
//! single logical result; single-page mode passes one page through.

use super::categories::{join_ids, CategoryResolver};
use super::upstream::UpstreamClient;
use crate::caching::{now_unix_secs, CacheKeyBuilder, CacheManager};
use crate::core::config::{CacheSettings, ImageSettings};
use crate::core::error::CatalogResult;
use crate::core::types::{
    CachedListing, CategorySelector, Listing, ListingFilters, Product, UpstreamProduct,
};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// The aggregated listing plus everything the HTTP layer needs for its
/// response headers.
#[derive(Debug)]
pub struct AggregatedResponse {
    pub listing: Listing,
    pub cache_hit: bool,
    pub namespace_version: u64,
    pub per_page: u64,
}

/// Outcome of one category resolution strategy.
enum CategoryResolution {
    Found(u64),
    NotFound,
}

/// Category resolution strategies, tried in declared order.
#[derive(Debug, Clone, Copy)]
enum ResolutionStrategy {
    /// The filter already carries a numeric id.
    DirectId,
    /// Look the slug up against the upstream category API.
    SlugLookup,
}

pub struct ListingAggregator {
    upstream: Arc<UpstreamClient>,
    categories: CategoryResolver,
    cache: Arc<CacheManager>,
    keys: CacheKeyBuilder,
    settings: CacheSettings,
    images: ImageSettings,
}

struct FetchedPages {
    items: Vec<UpstreamProduct>,
    total: u64,
    total_pages: u64,
}

impl ListingAggregator {
    pub fn new(
        upstream: Arc<UpstreamClient>,
        cache: Arc<CacheManager>,
        settings: CacheSettings,
        images: ImageSettings,
    ) -> Self {
        Self {
            categories: CategoryResolver::new(upstream.clone()),
            keys: CacheKeyBuilder::new(settings.namespace.clone()),
            upstream,
            cache,
            settings,
            images,
        }
    }

    /// Serve an aggregated listing, from cache when possible.
    pub async fn listing(
        &self,
        filters: &ListingFilters,
        refresh: bool,
    ) -> CatalogResult<AggregatedResponse> {
        let category_ids = self.resolve_category_filter(filters).await;
        let version = self.cache.namespace_version(self.keys.namespace()).await;
        let key = self
            .keys
            .build(version, &filters.key_fields(category_ids.as_deref()));

        if !refresh {
            if let Some(cached) = self.cache.get_json::<CachedListing>(&key).await {
                let age = now_unix_secs().saturating_sub(cached.stored_at);
                let is_stale = age > self.settings.stale_after.as_secs();
                debug!("Cache hit for {} (age {}s, stale: {})", key, age, is_stale);
                return Ok(AggregatedResponse {
                    listing: cached.into_listing(is_stale),
                    cache_hit: true,
                    namespace_version: version,
                    per_page: filters.per_page,
                });
            }
        }

        let fetched = self.fetch_pages(filters, category_ids.as_deref()).await?;
        let raw_count = fetched.items.len();

        let mut items: Vec<Product> = fetched
            .items
            .into_iter()
            .map(Product::from_upstream)
            .collect();
        for item in &mut items {
            item.images.retain(|image| self.image_allowed(&image.src));
        }
        if filters.require_images {
            items.retain(|item| !item.images.is_empty());
        }

        let empty_image_count = items.iter().filter(|item| item.images.is_empty()).count();
        // "empty success": upstream answered, but nothing displayable remains
        let empty_success = items.is_empty() || empty_image_count == items.len();

        if raw_count > 0 {
            let ttl = if empty_success {
                self.settings.empty_ttl
            } else {
                self.settings.default_ttl
            };
            let envelope = CachedListing {
                items: items.clone(),
                total: fetched.total,
                total_pages: fetched.total_pages,
                stored_at: now_unix_secs(),
                empty_image_count,
            };
            self.cache.set_json(&key, &envelope, ttl).await;
        } else {
            debug!("Not caching {}: upstream returned zero raw items", key);
        }

        Ok(AggregatedResponse {
            listing: Listing {
                items,
                total: fetched.total,
                total_pages: fetched.total_pages,
                is_stale: false,
            },
            cache_hit: false,
            namespace_version: version,
            per_page: filters.per_page,
        })
    }

    /// Resolve a category filter into the expanded, comma-joined descendant
    /// id set. `None` means no category constraint reaches the upstream —
    /// either none was requested, or resolution failed and the filter is
    /// dropped rather than failing the whole request.
    async fn resolve_category_filter(&self, filters: &ListingFilters) -> Option<String> {
        let selector = filters.category.as_ref()?;

        let root = match self.resolve_root(selector).await {
            CategoryResolution::Found(id) => id,
            CategoryResolution::NotFound => {
                warn!("Dropping unresolvable category filter: {:?}", selector);
                return None;
            }
        };

        let ids = self.categories.descendant_ids(root).await;
        Some(join_ids(&ids))
    }

    async fn resolve_root(&self, selector: &CategorySelector) -> CategoryResolution {
        for strategy in [ResolutionStrategy::DirectId, ResolutionStrategy::SlugLookup] {
            if let CategoryResolution::Found(id) = self.try_strategy(strategy, selector).await {
                return CategoryResolution::Found(id);
            }
        }
        CategoryResolution::NotFound
    }

    async fn try_strategy(
        &self,
        strategy: ResolutionStrategy,
        selector: &CategorySelector,
    ) -> CategoryResolution {
        match (strategy, selector) {
            (ResolutionStrategy::DirectId, CategorySelector::Id(id)) => {
                CategoryResolution::Found(*id)
            }
            (ResolutionStrategy::SlugLookup, CategorySelector::Slug(slug)) => {
                match self.upstream.category_by_slug(slug).await {
                    Ok(Some(category)) => CategoryResolution::Found(category.id),
                    Ok(None) => CategoryResolution::NotFound,
                    Err(e) => {
                        warn!("Category slug lookup failed for {}: {}", slug, e);
                        CategoryResolution::NotFound
                    }
                }
            }
            _ => CategoryResolution::NotFound,
        }
    }

    /// Fetch the requested page, or in merge-all mode every page first
    /// through last, in strictly increasing page order.
    async fn fetch_pages(
        &self,
        filters: &ListingFilters,
        category_ids: Option<&str>,
    ) -> CatalogResult<FetchedPages> {
        if !filters.merge {
            let batch = self
                .upstream
                .products_page(filters, category_ids, filters.page)
                .await?;
            let total = batch
                .total
                .filter(|t| *t > 0)
                .unwrap_or(batch.items.len() as u64);
            let total_pages = batch
                .total_pages
                .filter(|t| *t > 0)
                .unwrap_or_else(|| pages_for(total, filters.per_page));
            return Ok(FetchedPages {
                items: batch.items,
                total,
                total_pages,
            });
        }

        let mut items = Vec::new();
        let mut total = 0u64;
        let mut total_pages = 0u64; // 0 = not yet discovered
        let mut page = 1u64;

        loop {
            let batch = self
                .upstream
                .products_page(filters, category_ids, page)
                .await?;
            let batch_len = batch.items.len() as u64;
            items.extend(batch.items);

            // pagination totals only update on strictly positive header
            // values, tolerating upstreams that omit them on later pages
            if let Some(t) = batch.total {
                if t > 0 {
                    total = t;
                }
            }
            if let Some(tp) = batch.total_pages {
                if tp > 0 {
                    total_pages = tp;
                }
            }

            if items.len() >= self.settings.max_merged_items {
                warn!(
                    "Merge loop reached the {}-item cap after page {}, stopping early",
                    self.settings.max_merged_items, page
                );
                break;
            }

            page += 1;
            if total_pages > 0 {
                if page > total_pages {
                    break;
                }
            } else if batch_len < filters.per_page {
                // no pagination signal from upstream: a short page is the
                // only termination guarantee
                break;
            }
        }

        let total = if total > 0 { total } else { items.len() as u64 };
        let total_pages = if total_pages > 0 {
            total_pages
        } else {
            pages_for(total, filters.per_page)
        };

        Ok(FetchedPages {
            items,
            total,
            total_pages,
        })
    }

    fn image_allowed(&self, src: &str) -> bool {
        if self.images.allowed_hosts.is_empty() {
            return true;
        }
        let host = match Url::parse(src) {
            Ok(url) => match url.host_str() {
                Some(host) => host.to_string(),
                None => return false,
            },
            Err(_) => return false,
        };
        self.images
            .allowed_hosts
            .iter()
            .any(|allowed| host == *allowed || host.ends_with(&format!(".{}", allowed)))
    }
}

fn pages_for(total: u64, per_page: u64) -> u64 {
    if total == 0 {
        1
    } else {
        (total + per_page - 1) / per_page
    }
}
