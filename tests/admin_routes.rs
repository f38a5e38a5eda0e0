//! Admin-surface tests: cache statistics and the two invalidation paths
//! (version bump and physical prefix flush).

use axum_test::TestServer;
use catalog_gateway::core::config::CatalogConfig;
use catalog_gateway::gateway::{router, AppState};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn test_server(upstream: &MockServer) -> TestServer {
    let mut config = CatalogConfig::default();
    config.upstream.base_url = upstream.uri();
    let state = AppState::from_config(config).await.unwrap();
    TestServer::new(router(state)).unwrap()
}

fn mock_products() -> Mock {
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-wp-total", "1")
                .insert_header("x-wp-totalpages", "1")
                .set_body_json(serde_json::json!([
                    {"id": 1, "name": "a", "slug": "a", "price": "1.00",
                     "images": [{"id": 1, "src": "https://cdn.example.com/a.jpg", "alt": ""}]}
                ])),
        )
}

#[tokio::test]
async fn cache_stats_reflect_traffic() {
    let upstream = MockServer::start().await;
    mock_products().mount(&upstream).await;
    let server = test_server(&upstream).await;

    server.get("/products").await.assert_status_ok();
    server.get("/products").await.assert_status_ok();

    let response = server.get("/admin/cache/stats").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["store"], "memory");
    assert_eq!(body["namespace"], "products");
    // one miss (first request) and one hit (second)
    assert_eq!(body["stats"]["misses"], 1);
    assert_eq!(body["stats"]["hits"], 1);
}

#[tokio::test]
async fn bump_endpoint_advances_the_version() {
    let upstream = MockServer::start().await;
    let server = test_server(&upstream).await;

    let first = server.post("/admin/cache/bump").await;
    first.assert_status_ok();
    let body: serde_json::Value = first.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["namespace_version"], 1);

    let second = server.post("/admin/cache/bump").await;
    let body: serde_json::Value = second.json();
    assert_eq!(body["namespace_version"], 2);
}

#[tokio::test]
async fn flush_endpoint_removes_cached_listings() {
    let upstream = MockServer::start().await;
    mock_products().expect(2).mount(&upstream).await;
    let server = test_server(&upstream).await;

    // populate the cache, then physically flush it
    server.get("/products").await.assert_status_ok();

    let flush = server.post("/admin/cache/flush").await;
    flush.assert_status_ok();
    let body: serde_json::Value = flush.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["removed"], 1);

    // the entry is gone, so the next request goes upstream again
    let after = server.get("/products").await;
    assert_eq!(after.header("x-cache"), "miss");
}
