//! # Caching System Module
//!
//! This module provides the response cache of the relay: a uniform key-value store
//! contract over several Redis deployment topologies, the TTL policy, the cache key
//! codec, and the per-request admission gate that ties them to the whitelist and the
//! upstream client.
//!
//! ## Architecture
//! 1. **Key Generator**: namespace + normalized request identity → key
//! 2. **Cache Stores**: single, cluster, sentinel, replica pool and in-memory
//! 3. **TTL Policy**: success / error TTL resolution per endpoint
//! 4. **Middleware**: the admission gate deciding hit, forward, persist

pub mod key_generator;
pub mod middleware;
pub mod policy;
pub mod stores;

pub use key_generator::{make_key, request_identity, KeyFormat};
pub use middleware::{AdmissionGate, CacheEntry, CacheStatus};
pub use policy::{TtlDecision, TtlPolicy};
pub use stores::{CacheStore, InMemoryCache, RedisStore};

use crate::core::error::RelayError;

/// Cache operation result
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific error types
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The key is absent or expired; a regular miss, never a connectivity problem
    #[error("cache key not found: {key}")]
    NotFound { key: String },

    #[error("Invalid cache argument: {message}")]
    InvalidArgument { message: String },

    #[error("Cache configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Connection pool error: {message}")]
    Pool { message: String },

    #[error("Cache operation timeout")]
    Timeout,

    #[error("Cache not available: {message}")]
    Unavailable { message: String },
}

impl CacheError {
    pub fn not_found<S: Into<String>>(key: S) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// True for a regular miss
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<CacheError> for RelayError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Configuration { message } => RelayError::config(message),
            CacheError::InvalidArgument { message } => RelayError::invalid_argument(message),
            other => RelayError::internal(format!("Cache error: {}", other)),
        }
    }
}
