//! Sentinel-managed primary.
//!
//! The primary address is resolved by asking each sentinel in turn for
//! `SENTINEL get-master-addr-by-name`. The resulting connection is kept until a
//! backend call fails, after which the next call resolves the primary again so a
//! failover is picked up without restarting the relay.
//!
//! At most one discovery runs at a time and no lock is held across it. Calls arriving
//! while it is in flight fail with [`CacheError::Unavailable`] instead of queueing.

use super::commands::{self, SetCondition};
use super::redis_store::endpoint_url;
use super::CacheStore;
use crate::caching::{CacheError, CacheResult};
use crate::core::config::{RedisAddress, RedisSentinel, RedisTimeouts};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

pub struct SentinelStore {
    sentinels: Vec<String>,
    master_name: String,
    password: Option<String>,
    timeouts: RedisTimeouts,
    primary: RwLock<Option<ConnectionManager>>,
    discovering: Mutex<()>,
}

impl SentinelStore {
    pub fn new(sentinel: &RedisSentinel, timeouts: RedisTimeouts) -> CacheResult<Self> {
        if sentinel.addresses.is_empty() {
            return Err(CacheError::config("redis sentinel addresses cannot be empty"));
        }
        if sentinel.master_name.is_empty() {
            return Err(CacheError::config("redis sentinel master name cannot be empty"));
        }

        let sentinels = sentinel
            .addresses
            .iter()
            .map(|address| endpoint_url(address, None))
            .collect::<CacheResult<Vec<_>>>()?;

        Ok(Self {
            sentinels,
            master_name: sentinel.master_name.clone(),
            password: sentinel.password.clone(),
            timeouts,
            primary: RwLock::new(None),
            discovering: Mutex::new(()),
        })
    }

    async fn query_sentinel(&self, url: &str) -> CacheResult<RedisAddress> {
        let client = Client::open(url)?;
        let mut conn =
            commands::with_timeout(self.timeouts.dial, client.get_multiplexed_async_connection())
                .await?;

        let mut cmd = redis::cmd("SENTINEL");
        cmd.arg("get-master-addr-by-name").arg(&self.master_name);

        let reply: Option<(String, u16)> =
            commands::with_timeout(self.timeouts.read, cmd.query_async(&mut conn)).await?;

        reply
            .map(|(host, port)| RedisAddress::new(host, port))
            .ok_or_else(|| CacheError::Unavailable {
                message: format!("sentinel does not know primary {}", self.master_name),
            })
    }

    async fn discover(&self) -> CacheResult<ConnectionManager> {
        for sentinel in &self.sentinels {
            let address = match self.query_sentinel(sentinel).await {
                Ok(address) => address,
                Err(e) => {
                    warn!("Sentinel {} could not resolve primary: {}", sentinel, e);
                    continue;
                }
            };

            let client = Client::open(endpoint_url(&address, self.password.as_deref())?)?;
            match commands::with_timeout(self.timeouts.dial, ConnectionManager::new(client)).await {
                Ok(conn) => {
                    info!("Redis primary {} resolved to {}", self.master_name, address);
                    return Ok(conn);
                }
                Err(e) => warn!("Redis primary {} at {} unreachable: {}", self.master_name, address, e),
            }
        }

        Err(CacheError::Unavailable {
            message: format!("no sentinel could resolve primary {}", self.master_name),
        })
    }

    async fn cached(&self) -> Option<ConnectionManager> {
        self.primary.read().await.clone()
    }

    async fn connection(&self) -> CacheResult<ConnectionManager> {
        if let Some(conn) = self.cached().await {
            return Ok(conn);
        }

        let Ok(_discovery) = self.discovering.try_lock() else {
            return Err(CacheError::Unavailable {
                message: format!("primary {} discovery in progress", self.master_name),
            });
        };

        // a discovery may have completed between the read and the try_lock
        if let Some(conn) = self.cached().await {
            return Ok(conn);
        }

        let conn = self.discover().await?;
        *self.primary.write().await = Some(conn.clone());
        Ok(conn)
    }

    /// Forget the primary after a backend failure
    async fn observe<T>(&self, result: CacheResult<T>) -> CacheResult<T> {
        if let Err(e) = &result {
            if !e.is_not_found() {
                warn!("Redis primary {} call failed, rediscovering: {}", self.master_name, e);
                *self.primary.write().await = None;
            }
        }
        result
    }
}

#[async_trait]
impl CacheStore for SentinelStore {
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let result = commands::set(&mut conn, &self.timeouts, key, value, ttl, SetCondition::Always).await;
        self.observe(result).await.map(|_| ())
    }

    async fn set_if_present(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.connection().await?;
        let result = commands::set(&mut conn, &self.timeouts, key, value, ttl, SetCondition::IfPresent).await;
        self.observe(result).await
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.connection().await?;
        let result = commands::set(&mut conn, &self.timeouts, key, value, ttl, SetCondition::IfAbsent).await;
        self.observe(result).await
    }

    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        let mut conn = self.connection().await?;
        let result = commands::get(&mut conn, &self.timeouts, key).await;
        self.observe(result).await
    }

    async fn delete(&self, keys: &[&str]) -> CacheResult<u64> {
        let mut conn = self.connection().await?;
        let result = commands::delete(&mut conn, &self.timeouts, keys).await;
        self.observe(result).await
    }

    fn backend_name(&self) -> &'static str {
        "sentinel"
    }
}
