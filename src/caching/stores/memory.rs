//! # In-Memory Cache Store
//!
//! Process-local [`CacheStore`] backed by a concurrent map. Expiry is checked
//! lazily on access.
//! Used to exercise the admission gate without a Redis deployment.

use super::CacheStore;
use crate::caching::{CacheError, CacheResult};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct StoredValue {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn new(value: &[u8], ttl: Duration) -> Self {
        Self {
            value: value.to_vec(),
            expires_at: (!ttl.is_zero()).then(|| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Snapshot of store activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InMemoryStats {
    pub reads: u64,
    pub writes: u64,
    pub hits: u64,
    pub misses: u64,
}

/// In-memory cache implementation
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: DashMap<String, StoredValue>,
    reads: AtomicU64,
    writes: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remaining lifetime of a live key
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            return None;
        }
        entry
            .expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn stats(&self) -> InMemoryStats {
        InMemoryStats {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(key.to_string(), StoredValue::new(value, ttl));
        Ok(())
    }

    async fn set_if_present(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) if !occupied.get().is_expired() => {
                occupied.insert(StoredValue::new(value, ttl));
                Ok(true)
            }
            Entry::Occupied(occupied) => {
                occupied.remove();
                Ok(false)
            }
            Entry::Vacant(_) => Ok(false),
        }
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) if occupied.get().is_expired() => {
                occupied.insert(StoredValue::new(value, ttl));
                Ok(true)
            }
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new(value, ttl));
                Ok(true)
            }
        }
    }

    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        let live = self
            .entries
            .get(key)
            .filter(|stored| !stored.is_expired())
            .map(|stored| stored.value.clone());

        match live {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.entries.remove_if(key, |_, stored| stored.is_expired());
                Err(CacheError::not_found(key))
            }
        }
    }

    async fn delete(&self, keys: &[&str]) -> CacheResult<u64> {
        self.writes.fetch_add(1, Ordering::Relaxed);

        let removed = keys
            .iter()
            .filter_map(|key| self.entries.remove(*key))
            .filter(|(_, stored)| !stored.is_expired())
            .count();

        Ok(removed as u64)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
