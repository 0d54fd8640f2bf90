//! # yt-relay
//!
//! A caching, whitelisting reverse proxy in front of the YouTube Data API v3.
//!
//! Requests for `search`, `videos` and `playlistItems` are checked against configured
//! allow-lists, forwarded upstream on a cache miss, and stored in Redis (single
//! instance, cluster, sentinel-managed primary or a writer/reader replica pool) under a
//! key derived from the normalized request.

/// Configuration and error types
pub mod core;

/// HTTP server and route wiring
pub mod gateway;

/// Identifier allow-lists
pub mod auth;

/// Round-robin selection over replica endpoints
pub mod load_balancing;

/// Structured logging and Prometheus counters
pub mod observability;

/// Cache stores, key derivation, TTL policy and the admission gate
pub mod caching;

/// Upstream video catalog client
pub mod relay;

pub use crate::core::config::Conf;
pub use crate::core::error::{RelayError, RelayResult};
pub use crate::gateway::server::RelayServer;
