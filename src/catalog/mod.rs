//! # Catalog Module
//!
//! Everything that talks to the upstream commerce API: the paginated
//! upstream client, the category tree resolver, and the listing aggregator
//! that orchestrates cache lookups and multi-page fetches.

pub mod aggregator;
pub mod categories;
pub mod upstream;

pub use aggregator::{AggregatedResponse, ListingAggregator};
pub use categories::CategoryResolver;
pub use upstream::{UpstreamClient, UpstreamPage};
