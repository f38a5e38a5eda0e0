//! # Core Types Module
//!
//! The catalog data model: raw upstream shapes, the converted internal
//! representation, the validated listing filter set, and the aggregated
//! listing payloads that move between the cache and the HTTP layer.

use serde::{Deserialize, Serialize};

/// Default and maximum page size for upstream batches. Batches are maximized
/// to minimize upstream round-trips.
pub const DEFAULT_PER_PAGE: u64 = 100;
pub const MAX_PER_PAGE: u64 = 100;
pub const MAX_PAGE: u64 = 1000;

/// A product image in the internal representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductImage {
    #[serde(default)]
    pub id: u64,
    pub src: String,
    #[serde(default)]
    pub alt: String,
}

/// A category as returned by the upstream category API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: u64,
    #[serde(default)]
    pub slug: String,
    /// Parent category id; 0 for roots.
    #[serde(default)]
    pub parent: u64,
}

/// Minimal category reference carried on a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

/// A product as returned by the upstream catalog API. Every field is
/// defaulted so `_fields`-restricted responses still deserialize.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamProduct {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub regular_price: String,
    #[serde(default)]
    pub sale_price: String,
    #[serde(default)]
    pub on_sale: bool,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub categories: Vec<CategoryRef>,
}

/// The internal catalog representation served to storefront callers.
///
/// `price` and `origin_price` are carried as the upstream's string values,
/// unmodified, so downstream discount math stays correct. A zero
/// `origin_price` must be guarded by callers doing that math, not here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub origin_price: String,
    #[serde(default)]
    pub on_sale: bool,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub categories: Vec<CategoryRef>,
}

impl Product {
    /// Convert a raw upstream product into the internal representation.
    pub fn from_upstream(raw: UpstreamProduct) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            slug: raw.slug,
            permalink: raw.permalink,
            price: raw.price,
            origin_price: raw.regular_price,
            on_sale: raw.on_sale,
            images: raw.images,
            categories: raw.categories,
        }
    }
}

/// Raw listing query parameters as they arrive on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingQuery {
    pub per_page: Option<u64>,
    pub page: Option<u64>,
    pub search: Option<String>,
    pub orderby: Option<String>,
    pub order: Option<String>,
    pub slug: Option<String>,
    pub category: Option<String>,
    pub on_sale: Option<bool>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub merge: Option<bool>,
    pub require_images: Option<bool>,
    pub no304: Option<bool>,
    pub refresh: Option<bool>,
    #[serde(rename = "_fields")]
    pub fields: Option<String>,
}

impl ListingQuery {
    /// Validate and clamp into the internal filter set.
    pub fn filters(&self) -> ListingFilters {
        ListingFilters::from_query(self)
    }

    pub fn refresh(&self) -> bool {
        self.refresh.unwrap_or(false)
    }

    pub fn no304(&self) -> bool {
        self.no304.unwrap_or(false)
    }
}

/// A category filter, either a numeric id or a slug to be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategorySelector {
    Id(u64),
    Slug(String),
}

/// The validated, clamped filter set. Clamping happens here, before any
/// cache key is built, so equivalent out-of-range inputs collapse to the
/// same canonical key.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingFilters {
    pub per_page: u64,
    pub page: u64,
    pub search: Option<String>,
    pub orderby: Option<String>,
    pub order: Option<String>,
    pub slug: Option<String>,
    pub category: Option<CategorySelector>,
    pub on_sale: Option<bool>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub merge: bool,
    pub require_images: bool,
    /// Canonicalized `_fields` selection (sorted, deduplicated).
    pub fields: Option<String>,
}

impl Default for ListingFilters {
    fn default() -> Self {
        Self::from_query(&ListingQuery::default())
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl ListingFilters {
    pub fn from_query(query: &ListingQuery) -> Self {
        let category = non_empty(&query.category).map(|raw| match raw.parse::<u64>() {
            Ok(id) => CategorySelector::Id(id),
            Err(_) => CategorySelector::Slug(raw),
        });

        let fields = non_empty(&query.fields).map(|raw| {
            let mut names: Vec<&str> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            names.sort_unstable();
            names.dedup();
            names.join(",")
        });

        Self {
            per_page: query.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
            page: query.page.unwrap_or(1).clamp(1, MAX_PAGE),
            search: non_empty(&query.search),
            orderby: non_empty(&query.orderby),
            order: non_empty(&query.order).map(|o| o.to_lowercase()),
            slug: non_empty(&query.slug),
            category,
            on_sale: query.on_sale,
            price_min: query.price_min.map(|p| p.max(0.0)),
            price_max: query.price_max.map(|p| p.max(0.0)),
            merge: query.merge.unwrap_or(false),
            require_images: query.require_images.unwrap_or(false),
            fields,
        }
    }

    /// Fields participating in the cache key. Defaults and absent filters
    /// yield `None` and are omitted; the page number is omitted whenever
    /// merge mode is active, since merge mode always returns the full
    /// first-through-last concatenation.
    pub fn key_fields(&self, category_ids: Option<&str>) -> Vec<(&'static str, Option<String>)> {
        vec![
            (
                "per_page",
                (self.per_page != DEFAULT_PER_PAGE).then(|| self.per_page.to_string()),
            ),
            (
                "page",
                (!self.merge && self.page != 1).then(|| self.page.to_string()),
            ),
            ("search", self.search.clone()),
            ("orderby", self.orderby.clone()),
            ("order", self.order.clone()),
            ("slug", self.slug.clone()),
            ("category", category_ids.map(str::to_string)),
            ("on_sale", self.on_sale.map(|b| b.to_string())),
            ("price_min", self.price_min.map(|p| p.to_string())),
            ("price_max", self.price_max.map(|p| p.to_string())),
            ("merge", self.merge.then(|| "true".to_string())),
            (
                "require_images",
                self.require_images.then(|| "true".to_string()),
            ),
            ("fields", self.fields.clone()),
        ]
    }
}

/// The aggregated listing payload served to callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub items: Vec<Product>,
    pub total: u64,
    pub total_pages: u64,
    pub is_stale: bool,
}

/// The envelope stored in the cache. `stored_at` judges soft staleness
/// independently of the store's own TTL expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedListing {
    pub items: Vec<Product>,
    pub total: u64,
    pub total_pages: u64,
    pub stored_at: u64,
    #[serde(default)]
    pub empty_image_count: usize,
}

impl CachedListing {
    pub fn into_listing(self, is_stale: bool) -> Listing {
        Listing {
            items: self.items,
            total: self.total,
            total_pages: self.total_pages,
            is_stale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_page_and_page_clamping() {
        let query = ListingQuery {
            per_page: Some(5000),
            page: Some(0),
            ..Default::default()
        };
        let filters = query.filters();
        assert_eq!(filters.per_page, MAX_PER_PAGE);
        assert_eq!(filters.page, 1);
    }

    #[test]
    fn test_negative_prices_clamp_to_zero() {
        let query = ListingQuery {
            price_min: Some(-10.0),
            price_max: Some(-1.0),
            ..Default::default()
        };
        let filters = query.filters();
        assert_eq!(filters.price_min, Some(0.0));
        assert_eq!(filters.price_max, Some(0.0));
    }

    #[test]
    fn test_numeric_category_parses_as_id() {
        let query = ListingQuery {
            category: Some("42".to_string()),
            ..Default::default()
        };
        assert_eq!(query.filters().category, Some(CategorySelector::Id(42)));

        let query = ListingQuery {
            category: Some("hoodies".to_string()),
            ..Default::default()
        };
        assert_eq!(
            query.filters().category,
            Some(CategorySelector::Slug("hoodies".to_string()))
        );
    }

    #[test]
    fn test_fields_canonicalized() {
        let query = ListingQuery {
            fields: Some("name, id,price,name".to_string()),
            ..Default::default()
        };
        assert_eq!(query.filters().fields, Some("id,name,price".to_string()));
    }

    #[test]
    fn test_price_fields_preserved_through_conversion() {
        let raw = UpstreamProduct {
            id: 7,
            price: "19.99".to_string(),
            regular_price: "39.99".to_string(),
            ..Default::default()
        };
        let product = Product::from_upstream(raw);
        assert_eq!(product.price, "19.99");
        assert_eq!(product.origin_price, "39.99");
    }
}
