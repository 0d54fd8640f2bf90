//! # Cache Stores Module
//!
//! This module provides the uniform key-value contract of the cache and its
//! implementations: one per Redis deployment topology plus an in-memory store.
//!
//! | Store            | Topology                                             |
//! |------------------|------------------------------------------------------|
//! | [`SingleStore`]  | one Redis instance                                   |
//! | [`ClusterStore`] | Redis Cluster, slot-aware client                     |
//! | [`SentinelStore`]| primary discovered through Sentinel                  |
//! | [`ReplicaStore`] | manually sharded writer/reader pools, round-robin    |
//! | [`InMemoryCache`]| process-local map, used by tests                     |

mod commands;
pub mod memory;
pub mod redis_store;
pub mod replica;
pub mod sentinel;

pub use memory::InMemoryCache;
pub use redis_store::{ClusterStore, RedisStore, SingleStore};
pub use replica::ReplicaStore;
pub use sentinel::SentinelStore;

use super::CacheResult;
use async_trait::async_trait;
use std::time::Duration;

/// Trait for cache store implementations
///
/// A zero `ttl` stores the value without expiry. Backend failures are returned as-is;
/// only an absent or expired key yields [`CacheError::NotFound`](super::CacheError::NotFound).
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Unconditional upsert with expiry
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Update only if the key currently exists; returns whether it was applied
    async fn set_if_present(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool>;

    /// Insert only if the key does not exist; returns whether it was applied
    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool>;

    /// Get a value from the cache
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>>;

    /// Delete keys, returning how many existed
    async fn delete(&self, keys: &[&str]) -> CacheResult<u64>;

    /// Short name used in logs
    fn backend_name(&self) -> &'static str;
}
