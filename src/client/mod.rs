//! # Client Module
//!
//! The calling side of the gateway: a process-local request coalescer that
//! deduplicates concurrent identical fetches and falls back to stale data
//! under failure, plus a typed client over the listing endpoint that always
//! returns a renderable value.

pub mod api;
pub mod coalescer;

pub use api::CatalogClient;
pub use coalescer::{CoalescerConfig, RequestCoalescer};
