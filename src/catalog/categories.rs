//! # Category Tree Resolver
//!
//! Expands a category into the closed set of itself plus all descendants,
//! so a category filter means "category or any descendant". The traversal
//! is an explicit worklist with a visited set and hard depth/node ceilings;
//! malformed upstream data (cycles, runaway trees) cannot loop or recurse
//! unboundedly.

use super::upstream::UpstreamClient;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Maximum traversal depth below the root category.
const MAX_DEPTH: usize = 20;

/// Maximum number of distinct category ids collected per expansion.
const MAX_NODES: usize = 2_000;

pub struct CategoryResolver {
    upstream: Arc<UpstreamClient>,
}

impl CategoryResolver {
    pub fn new(upstream: Arc<UpstreamClient>) -> Self {
        Self { upstream }
    }

    /// Resolve `{root} ∪ descendants(root)`.
    ///
    /// Level-synchronized worklist traversal: each depth level's child
    /// fetches run concurrently. A child-fetch failure at any depth keeps
    /// whatever that branch has already discovered; partial results are
    /// acceptable, total failure of the filter is not.
    pub async fn descendant_ids(&self, root: u64) -> Vec<u64> {
        let mut visited: HashSet<u64> = HashSet::from([root]);
        let mut ids = vec![root];
        let mut frontier = vec![root];
        let mut depth = 0;

        while !frontier.is_empty() {
            if depth >= MAX_DEPTH {
                warn!("Category {} exceeds max depth {}, pruning", root, MAX_DEPTH);
                break;
            }

            let batches = futures::future::join_all(
                frontier.iter().map(|parent| self.children_of(*parent)),
            )
            .await;

            let mut next = Vec::new();
            for child in batches.into_iter().flatten() {
                if !visited.insert(child.id) {
                    // already seen; covers cyclic parent links
                    continue;
                }
                ids.push(child.id);
                next.push(child.id);

                if ids.len() >= MAX_NODES {
                    warn!(
                        "Category {} expansion hit the {}-node ceiling",
                        root, MAX_NODES
                    );
                    return ids;
                }
            }

            frontier = next;
            depth += 1;
        }

        debug!("Category {} expanded to {} ids", root, ids.len());
        ids
    }

    /// All direct children of a category, paged until a short page. Fetch
    /// failures log and return the pages collected so far.
    async fn children_of(&self, parent: u64) -> Vec<crate::core::types::CategoryNode> {
        let page_size = self.upstream.category_page_size();
        let mut children = Vec::new();
        let mut page = 1;

        loop {
            match self.upstream.child_categories(parent, page).await {
                Ok(batch) => {
                    let batch_len = batch.len() as u64;
                    children.extend(batch);
                    if batch_len < page_size {
                        break;
                    }
                    page += 1;
                }
                Err(e) => {
                    warn!(
                        "Child-category fetch failed for parent {} page {}: {}",
                        parent, page, e
                    );
                    break;
                }
            }
        }

        children
    }
}

/// Join an id set into the single category filter value the upstream
/// query expects.
pub fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::UpstreamSettings;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn resolver_for(server: &MockServer) -> CategoryResolver {
        let upstream = UpstreamClient::new(UpstreamSettings {
            base_url: server.uri(),
            ..Default::default()
        })
        .unwrap();
        CategoryResolver::new(Arc::new(upstream))
    }

    fn mock_children(parent: &str, children: serde_json::Value) -> Mock {
        Mock::given(method("GET"))
            .and(path("/products/categories"))
            .and(query_param("parent", parent))
            .respond_with(ResponseTemplate::new(200).set_body_json(children))
    }

    #[tokio::test]
    async fn test_tree_expansion() {
        // A(1) -> {B(2), C(3)}, B -> {D(4)}
        let server = MockServer::start().await;
        mock_children("1", serde_json::json!([
            {"id": 2, "slug": "b", "parent": 1},
            {"id": 3, "slug": "c", "parent": 1}
        ]))
        .mount(&server)
        .await;
        mock_children("2", serde_json::json!([{"id": 4, "slug": "d", "parent": 2}]))
            .mount(&server)
            .await;
        mock_children("3", serde_json::json!([])).mount(&server).await;
        mock_children("4", serde_json::json!([])).mount(&server).await;

        let resolver = resolver_for(&server).await;
        let mut ids = resolver.descendant_ids(1).await;
        ids.sort_unstable();

        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_cycle_terminates() {
        // A(1) -> B(2), B -> A(1): the visited set breaks the cycle
        let server = MockServer::start().await;
        mock_children("1", serde_json::json!([{"id": 2, "slug": "b", "parent": 1}]))
            .mount(&server)
            .await;
        mock_children("2", serde_json::json!([{"id": 1, "slug": "a", "parent": 2}]))
            .mount(&server)
            .await;

        let resolver = resolver_for(&server).await;
        let mut ids = resolver.descendant_ids(1).await;
        ids.sort_unstable();

        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_branch_failure_keeps_partial_results() {
        // A(1) -> {B(2), C(3)}; fetching children of B fails
        let server = MockServer::start().await;
        mock_children("1", serde_json::json!([
            {"id": 2, "slug": "b", "parent": 1},
            {"id": 3, "slug": "c", "parent": 1}
        ]))
        .mount(&server)
        .await;
        Mock::given(method("GET"))
            .and(path("/products/categories"))
            .and(query_param("parent", "2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mock_children("3", serde_json::json!([])).mount(&server).await;

        let resolver = resolver_for(&server).await;
        let mut ids = resolver.descendant_ids(1).await;
        ids.sort_unstable();

        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_join_ids() {
        assert_eq!(join_ids(&[1, 2, 3]), "1,2,3");
        assert_eq!(join_ids(&[7]), "7");
    }
}
