//! # Upstream Client
//!
//! HTTP client for the upstream commerce REST API. Every call runs under an
//! explicit deadline; a timeout is treated like any other upstream failure.
//! Pagination totals are read from `X-WP-Total` / `X-WP-TotalPages`
//! response headers, with `X-Total` / `X-TotalPages` accepted as fallback.

use crate::core::config::UpstreamSettings;
use crate::core::error::{CatalogError, CatalogResult};
use crate::core::types::{CategoryNode, ListingFilters, UpstreamProduct};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;
use url::Url;

/// One upstream page of products plus the pagination totals announced in
/// its headers, when present.
#[derive(Debug)]
pub struct UpstreamPage {
    pub items: Vec<UpstreamProduct>,
    pub total: Option<u64>,
    pub total_pages: Option<u64>,
}

/// Client for the upstream catalog and category endpoints.
pub struct UpstreamClient {
    http: Client,
    base_url: Url,
    config: UpstreamSettings,
}

impl UpstreamClient {
    pub fn new(config: UpstreamSettings) -> CatalogResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| CatalogError::config(format!("Invalid upstream base_url: {}", e)))?;

        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CatalogError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    /// Fetch one page of products matching the given filters.
    ///
    /// `category_ids` is the already-expanded, comma-joined descendant set;
    /// it overrides any category selector on the filters.
    pub async fn products_page(
        &self,
        filters: &ListingFilters,
        category_ids: Option<&str>,
        page: u64,
    ) -> CatalogResult<UpstreamPage> {
        let url = self.endpoint("products")?;
        let mut request = self
            .http
            .get(url)
            .query(&[("per_page", filters.per_page.to_string()), ("page", page.to_string())]);

        if let Some(search) = &filters.search {
            request = request.query(&[("search", search)]);
        }
        if let Some(orderby) = &filters.orderby {
            request = request.query(&[("orderby", orderby)]);
        }
        if let Some(order) = &filters.order {
            request = request.query(&[("order", order)]);
        }
        if let Some(slug) = &filters.slug {
            request = request.query(&[("slug", slug)]);
        }
        if let Some(ids) = category_ids {
            request = request.query(&[("category", ids)]);
        }
        if let Some(on_sale) = filters.on_sale {
            request = request.query(&[("on_sale", on_sale.to_string())]);
        }
        if let Some(min) = filters.price_min {
            request = request.query(&[("min_price", min.to_string())]);
        }
        if let Some(max) = filters.price_max {
            request = request.query(&[("max_price", max.to_string())]);
        }
        if let Some(fields) = &filters.fields {
            request = request.query(&[("_fields", fields)]);
        }

        let response = self.send(request).await?;
        let headers = response.headers().clone();
        let items: Vec<UpstreamProduct> = response.json().await?;

        let total = count_header(&headers, "x-wp-total").or_else(|| count_header(&headers, "x-total"));
        let total_pages =
            count_header(&headers, "x-wp-totalpages").or_else(|| count_header(&headers, "x-totalpages"));

        debug!(
            "Upstream page {} returned {} items (total: {:?}, pages: {:?})",
            page,
            items.len(),
            total,
            total_pages
        );

        Ok(UpstreamPage {
            items,
            total,
            total_pages,
        })
    }

    /// Look up a category by slug. `Ok(None)` means the slug is unknown.
    pub async fn category_by_slug(&self, slug: &str) -> CatalogResult<Option<CategoryNode>> {
        let url = self.endpoint("products/categories")?;
        let request = self.http.get(url).query(&[("slug", slug), ("per_page", "1")]);

        let response = self.send(request).await?;
        let mut categories: Vec<CategoryNode> = response.json().await?;

        Ok(if categories.is_empty() {
            None
        } else {
            Some(categories.remove(0))
        })
    }

    /// Fetch one page of a category's direct children.
    pub async fn child_categories(&self, parent: u64, page: u64) -> CatalogResult<Vec<CategoryNode>> {
        let url = self.endpoint("products/categories")?;
        let request = self.http.get(url).query(&[
            ("parent", parent.to_string()),
            ("per_page", self.config.category_page_size.to_string()),
            ("page", page.to_string()),
        ]);

        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    pub fn category_page_size(&self) -> u64 {
        self.config.category_page_size
    }

    fn endpoint(&self, path: &str) -> CatalogResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| CatalogError::config("Upstream base_url cannot be a base"))?;
            segments.pop_if_empty();
            for segment in path.split('/') {
                segments.push(segment);
            }
        }
        Ok(url)
    }

    /// Send a request under the configured deadline and map error statuses,
    /// preserving the upstream status code.
    async fn send(&self, request: RequestBuilder) -> CatalogResult<Response> {
        let request = self.authorize(request);

        let response = tokio::time::timeout(self.config.request_timeout, request.send())
            .await
            .map_err(|_| CatalogError::Timeout {
                timeout_ms: self.config.request_timeout.as_millis() as u64,
            })??;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.trim().chars().take(200).collect();
            return Err(CatalogError::upstream(status.as_u16(), message));
        }

        Ok(response)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.config.consumer_key, &self.config.consumer_secret) {
            (Some(key), Some(secret)) => {
                request.query(&[("consumer_key", key), ("consumer_secret", secret)])
            }
            _ => request,
        }
    }
}

fn count_header(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}
