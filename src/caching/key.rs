//! # Cache Key Builder
//!
//! Deterministic, order-independent serialization of a filter set into a
//! cache key. Two logically identical requests must produce the same key
//! regardless of field order, so fields are sorted before serialization and
//! absent fields are omitted entirely.

/// Builds namespace-versioned cache keys.
///
/// Keys have the shape `{namespace}:v{version}:name=value:name=value`,
/// with names sorted lexicographically. The namespace comes first so a
/// whole namespace can be flushed by prefix; the version is embedded so a
/// version bump strands every previously stored key without enumeration.
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    namespace: String,
}

impl CacheKeyBuilder {
    pub fn new<S: Into<String>>(namespace: S) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Prefix matching every key of this namespace, across all versions.
    pub fn namespace_prefix(&self) -> String {
        format!("{}:", self.namespace)
    }

    /// Build a key from the given fields. Fields with a `None` value are
    /// dropped; the rest are sorted by name and serialized as `name=value`
    /// pairs with percent-encoded values.
    pub fn build(&self, version: u64, fields: &[(&str, Option<String>)]) -> String {
        let mut present: Vec<(&str, &str)> = fields
            .iter()
            .filter_map(|(name, value)| value.as_deref().map(|v| (*name, v)))
            .collect();
        present.sort_by(|a, b| a.0.cmp(b.0));

        let mut key = format!("{}:v{}", self.namespace, version);
        for (name, value) in present {
            key.push(':');
            key.push_str(name);
            key.push('=');
            key.push_str(&urlencoding::encode(value));
        }
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ListingQuery;

    #[test]
    fn test_field_order_does_not_matter() {
        let builder = CacheKeyBuilder::new("products");

        let a = builder.build(
            3,
            &[
                ("search", Some("shoes".to_string())),
                ("on_sale", Some("true".to_string())),
            ],
        );
        let b = builder.build(
            3,
            &[
                ("on_sale", Some("true".to_string())),
                ("search", Some("shoes".to_string())),
            ],
        );

        assert_eq!(a, b);
        assert_eq!(a, "products:v3:on_sale=true:search=shoes");
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let builder = CacheKeyBuilder::new("products");

        let sparse = builder.build(1, &[("search", None), ("slug", Some("tees".to_string()))]);
        let minimal = builder.build(1, &[("slug", Some("tees".to_string()))]);

        assert_eq!(sparse, minimal);
    }

    #[test]
    fn test_version_changes_the_key() {
        let builder = CacheKeyBuilder::new("products");
        let fields = [("slug", Some("tees".to_string()))];

        assert_ne!(builder.build(1, &fields), builder.build(2, &fields));
    }

    #[test]
    fn test_values_are_encoded() {
        let builder = CacheKeyBuilder::new("products");
        let key = builder.build(1, &[("search", Some("blue shoes".to_string()))]);
        assert_eq!(key, "products:v1:search=blue%20shoes");
    }

    #[test]
    fn test_omitted_filter_equals_explicit_default() {
        let builder = CacheKeyBuilder::new("products");

        let omitted = ListingQuery::default().filters();
        let explicit = ListingQuery {
            per_page: Some(100),
            page: Some(1),
            ..Default::default()
        }
        .filters();

        assert_eq!(
            builder.build(1, &omitted.key_fields(None)),
            builder.build(1, &explicit.key_fields(None)),
        );
    }

    #[test]
    fn test_out_of_range_input_collapses_to_clamped_key() {
        let builder = CacheKeyBuilder::new("products");

        let negative = ListingQuery {
            price_min: Some(-5.0),
            ..Default::default()
        }
        .filters();
        let zero = ListingQuery {
            price_min: Some(0.0),
            ..Default::default()
        }
        .filters();

        assert_eq!(
            builder.build(1, &negative.key_fields(None)),
            builder.build(1, &zero.key_fields(None)),
        );
    }

    #[test]
    fn test_merge_mode_excludes_page() {
        let builder = CacheKeyBuilder::new("products");

        let page_two = ListingQuery {
            merge: Some(true),
            page: Some(2),
            ..Default::default()
        }
        .filters();
        let page_nine = ListingQuery {
            merge: Some(true),
            page: Some(9),
            ..Default::default()
        }
        .filters();

        assert_eq!(
            builder.build(1, &page_two.key_fields(None)),
            builder.build(1, &page_nine.key_fields(None)),
        );
    }
}
