//! # Gateway Module
//!
//! The HTTP surface: the listing endpoint with its conditional-response
//! contract, health and cache-admin routes, and the server wiring.

pub mod admin;
pub mod handlers;
pub mod server;

pub use server::{router, AppState, GatewayServer};
