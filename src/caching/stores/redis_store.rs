//! # Redis Cache Store
//!
//! This module provides the Redis-backed cache: one concrete store per deployment
//! topology and the [`RedisStore`] enum that picks among them from configuration.
//!
//! Connections are established lazily on first use, so building a store never
//! touches the network.

use super::commands::{self, SetCondition};
use super::replica::ReplicaStore;
use super::sentinel::SentinelStore;
use super::CacheStore;
use crate::caching::{CacheError, CacheResult};
use crate::core::config::{
    RedisAddress, RedisCluster, RedisService, RedisSingleInstance, RedisTimeouts, RedisType,
};
use crate::core::error::RelayError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::cluster::ClusterClientBuilder;
use redis::cluster_async::ClusterConnection;
use redis::Client;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

/// `redis://` URL of an endpoint, mapped into the cache error space
pub(crate) fn endpoint_url(address: &RedisAddress, password: Option<&str>) -> CacheResult<String> {
    if address.address.is_empty() {
        return Err(CacheError::config("redis address cannot be empty"));
    }

    address.connection_url(password).map_err(|e| match e {
        RelayError::Configuration { message } => CacheError::config(message),
        other => CacheError::config(other.to_string()),
    })
}

/// Store over one Redis instance
pub struct SingleStore {
    client: Client,
    address: String,
    timeouts: RedisTimeouts,
    connection: OnceCell<ConnectionManager>,
}

impl SingleStore {
    pub fn new(instance: &RedisSingleInstance, timeouts: RedisTimeouts) -> CacheResult<Self> {
        let url = endpoint_url(&instance.instance, instance.password.as_deref())?;
        let client = Client::open(url)?;

        Ok(Self {
            client,
            address: instance.instance.to_string(),
            timeouts,
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> CacheResult<ConnectionManager> {
        let conn = self
            .connection
            .get_or_try_init(|| async {
                let conn = commands::with_timeout(
                    self.timeouts.dial,
                    ConnectionManager::new(self.client.clone()),
                )
                .await?;
                info!("Redis cache connected to {}", self.address);
                Ok::<_, CacheError>(conn)
            })
            .await?;

        Ok(conn.clone())
    }
}

#[async_trait]
impl CacheStore for SingleStore {
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        commands::set(&mut conn, &self.timeouts, key, value, ttl, SetCondition::Always).await?;
        Ok(())
    }

    async fn set_if_present(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.connection().await?;
        commands::set(&mut conn, &self.timeouts, key, value, ttl, SetCondition::IfPresent).await
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.connection().await?;
        commands::set(&mut conn, &self.timeouts, key, value, ttl, SetCondition::IfAbsent).await
    }

    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        let mut conn = self.connection().await?;
        commands::get(&mut conn, &self.timeouts, key).await
    }

    async fn delete(&self, keys: &[&str]) -> CacheResult<u64> {
        let mut conn = self.connection().await?;
        commands::delete(&mut conn, &self.timeouts, keys).await
    }

    fn backend_name(&self) -> &'static str {
        "single"
    }
}

/// Store over a Redis Cluster, routing each key to its slot owner
pub struct ClusterStore {
    client: redis::cluster::ClusterClient,
    timeouts: RedisTimeouts,
    connection: OnceCell<ClusterConnection>,
}

impl ClusterStore {
    pub fn new(cluster: &RedisCluster, timeouts: RedisTimeouts) -> CacheResult<Self> {
        if cluster.addresses.is_empty() {
            return Err(CacheError::config("redis cluster addresses cannot be empty"));
        }

        let urls = cluster
            .addresses
            .iter()
            .map(|address| endpoint_url(address, None))
            .collect::<CacheResult<Vec<_>>>()?;

        let mut builder = ClusterClientBuilder::new(urls);
        if let Some(password) = cluster.password.clone().filter(|p| !p.is_empty()) {
            builder = builder.password(password);
        }

        Ok(Self {
            client: builder.build()?,
            timeouts,
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> CacheResult<ClusterConnection> {
        let conn = self
            .connection
            .get_or_try_init(|| async {
                let conn =
                    commands::with_timeout(self.timeouts.dial, self.client.get_async_connection())
                        .await?;
                info!("Redis cluster connection established");
                Ok::<_, CacheError>(conn)
            })
            .await?;

        Ok(conn.clone())
    }
}

#[async_trait]
impl CacheStore for ClusterStore {
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        commands::set(&mut conn, &self.timeouts, key, value, ttl, SetCondition::Always).await?;
        Ok(())
    }

    async fn set_if_present(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.connection().await?;
        commands::set(&mut conn, &self.timeouts, key, value, ttl, SetCondition::IfPresent).await
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.connection().await?;
        commands::set(&mut conn, &self.timeouts, key, value, ttl, SetCondition::IfAbsent).await
    }

    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        let mut conn = self.connection().await?;
        commands::get(&mut conn, &self.timeouts, key).await
    }

    // Keys may live on different slots, so each one is deleted on its own.
    async fn delete(&self, keys: &[&str]) -> CacheResult<u64> {
        let mut conn = self.connection().await?;
        let mut removed = 0;
        for key in keys {
            removed += commands::delete(&mut conn, &self.timeouts, &[*key]).await?;
        }
        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        "cluster"
    }
}

/// Redis-backed cache, one variant per deployment topology
pub enum RedisStore {
    Single(SingleStore),
    Cluster(ClusterStore),
    Sentinel(SentinelStore),
    Replica(ReplicaStore),
}

impl RedisStore {
    /// Build the store selected by `redis.type`
    ///
    /// Fails with a configuration error when the selected topology section is
    /// missing or names no addresses.
    pub fn from_config(service: &RedisService) -> CacheResult<Self> {
        let missing = || CacheError::config(format!("redis.{} must be configured", service.kind));

        let store = match service.kind {
            RedisType::Single => {
                let single = service.single.as_ref().ok_or_else(missing)?;
                Self::Single(SingleStore::new(single, service.timeouts)?)
            }
            RedisType::Cluster => {
                let cluster = service.cluster.as_ref().ok_or_else(missing)?;
                Self::Cluster(ClusterStore::new(cluster, service.timeouts)?)
            }
            RedisType::Sentinel => {
                let sentinel = service.sentinel.as_ref().ok_or_else(missing)?;
                Self::Sentinel(SentinelStore::new(sentinel, service.timeouts)?)
            }
            RedisType::Replica => {
                let replica = service.replica.as_ref().ok_or_else(missing)?;
                Self::Replica(ReplicaStore::new(replica, service.timeouts)?)
            }
        };

        info!("Redis cache store configured: {}", service.kind);
        Ok(store)
    }

    fn inner(&self) -> &dyn CacheStore {
        match self {
            Self::Single(store) => store,
            Self::Cluster(store) => store,
            Self::Sentinel(store) => store,
            Self::Replica(store) => store,
        }
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.inner().set(key, value, ttl).await
    }

    async fn set_if_present(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        self.inner().set_if_present(key, value, ttl).await
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        self.inner().set_if_absent(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        self.inner().get(key).await
    }

    async fn delete(&self, keys: &[&str]) -> CacheResult<u64> {
        self.inner().delete(keys).await
    }

    fn backend_name(&self) -> &'static str {
        self.inner().backend_name()
    }
}
