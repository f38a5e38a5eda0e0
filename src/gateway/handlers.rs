//! # Listing Endpoint Handler
//!
//! `GET /products`: validates and clamps the query, runs the aggregator,
//! and emits the response contract — a weak content-hash ETag honored via
//! `If-None-Match`, `204 No Content` when nothing displayable remains after
//! filtering, and freshness plus diagnostic headers on every outcome.

use super::server::AppState;
use crate::catalog::AggregatedResponse;
use crate::core::error::CatalogResult;
use crate::core::types::ListingQuery;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use sha2::{Digest, Sha256};

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
    request_headers: HeaderMap,
) -> CatalogResult<Response> {
    let filters = query.filters();
    let out = state.aggregator.listing(&filters, query.refresh()).await?;

    let mut headers = diagnostic_headers(&state, &out);

    if out.listing.items.is_empty() {
        // deliberate signal, distinct from "200 with an empty array"
        return Ok((StatusCode::NO_CONTENT, headers).into_response());
    }

    // hash the exact bytes that will be sent, not the raw cached payload,
    // so the ETag always reflects the converted representation
    let body = Bytes::from(serde_json::to_vec(&out.listing)?);
    let etag = weak_etag(&body);
    insert_header(&mut headers, "etag", etag.clone());

    if !query.no304() && if_none_match_matches(&request_headers, &etag) {
        return Ok((StatusCode::NOT_MODIFIED, headers).into_response());
    }

    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Ok((StatusCode::OK, headers, body).into_response())
}

/// Freshness and diagnostic headers shared by every listing outcome.
fn diagnostic_headers(state: &AppState, out: &AggregatedResponse) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let ttl = state.config.cache.default_ttl.as_secs();

    insert_header(
        &mut headers,
        "x-cache",
        if out.cache_hit { "hit" } else { "miss" }.to_string(),
    );
    insert_header(&mut headers, "x-cache-store", state.cache.store_name().to_string());
    insert_header(
        &mut headers,
        "x-cache-namespace-version",
        out.namespace_version.to_string(),
    );
    insert_header(&mut headers, "x-wc-total", out.listing.total.to_string());
    insert_header(
        &mut headers,
        "x-wc-total-pages",
        out.listing.total_pages.to_string(),
    );
    insert_header(&mut headers, "x-wc-batch-per_page", out.per_page.to_string());
    insert_header(
        &mut headers,
        "cache-control",
        format!("public, s-maxage={}, stale-while-revalidate={}", ttl, ttl * 2),
    );
    insert_header(
        &mut headers,
        "cdn-cache-control",
        format!(
            "public, s-maxage={}, stale-while-revalidate={}",
            ttl * 2,
            ttl * 4
        ),
    );

    headers
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: String) {
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(name, value);
    }
}

/// Weak ETag over a content hash of the exact response body.
fn weak_etag(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("W/\"{}\"", hex::encode(hasher.finalize()))
}

fn if_none_match_matches(headers: &HeaderMap, etag: &str) -> bool {
    let Some(value) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };

    value
        .split(',')
        .map(str::trim)
        .any(|candidate| candidate == etag || candidate == "*")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weak_etag_is_stable_and_weak() {
        let a = weak_etag(b"{\"items\":[]}");
        let b = weak_etag(b"{\"items\":[]}");
        assert_eq!(a, b);
        assert!(a.starts_with("W/\""));
        assert_eq!(a.len(), "W/\"\"".len() + 64); // 64 hex chars inside the quotes
    }

    #[test]
    fn test_if_none_match_list_and_wildcard() {
        let etag = "W/\"abc\"";
        let mut headers = HeaderMap::new();

        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("W/\"abc\""));
        assert!(if_none_match_matches(&headers, etag));

        headers.insert(
            header::IF_NONE_MATCH,
            HeaderValue::from_static("W/\"zzz\", W/\"abc\""),
        );
        assert!(if_none_match_matches(&headers, etag));

        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("*"));
        assert!(if_none_match_matches(&headers, etag));

        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("W/\"zzz\""));
        assert!(!if_none_match_matches(&headers, etag));
    }
}
