//! Manually sharded primary/replica pools.
//!
//! Every write (`SET` variants and `DEL`) goes to one writer and every read to one
//! reader, each chosen round-robin from its own counter. Each address owns a
//! bounded connection pool; failed calls are not retried.

use super::commands::{self, SetCondition};
use super::redis_store::endpoint_url;
use super::CacheStore;
use crate::caching::{CacheError, CacheResult};
use crate::core::config::{RedisAddress, RedisReplicaInstances, RedisTimeouts};
use crate::load_balancing::RoundRobin;
use async_trait::async_trait;
use deadpool_redis::{Pool, PoolConfig, Runtime};
use std::time::Duration;
use tracing::debug;

struct PooledEndpoint {
    address: String,
    pool: Pool,
}

impl PooledEndpoint {
    fn new(
        address: &RedisAddress,
        password: Option<&str>,
        pool_size: usize,
        timeouts: &RedisTimeouts,
    ) -> CacheResult<Self> {
        let mut config = deadpool_redis::Config::from_url(endpoint_url(address, password)?);

        let mut pool_config = PoolConfig::new(pool_size);
        pool_config.timeouts.wait = Some(timeouts.dial);
        pool_config.timeouts.create = Some(timeouts.dial);
        pool_config.timeouts.recycle = Some(timeouts.dial);
        config.pool = Some(pool_config);

        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::config(format!("Cannot create redis pool for {}: {}", address, e)))?;

        Ok(Self {
            address: address.to_string(),
            pool,
        })
    }

    async fn connection(&self) -> CacheResult<deadpool_redis::Connection> {
        self.pool.get().await.map_err(|e| CacheError::Pool {
            message: format!("{}: {}", self.address, e),
        })
    }
}

pub struct ReplicaStore {
    writers: Vec<PooledEndpoint>,
    readers: Vec<PooledEndpoint>,
    write_count: RoundRobin,
    read_count: RoundRobin,
    timeouts: RedisTimeouts,
}

impl ReplicaStore {
    pub fn new(replica: &RedisReplicaInstances, timeouts: RedisTimeouts) -> CacheResult<Self> {
        if replica.writers.is_empty() {
            return Err(CacheError::config("there's no writer redis address provided"));
        }
        if replica.readers.is_empty() {
            return Err(CacheError::config("there's no reader redis address provided"));
        }

        let password = replica.password.as_deref();
        let build = |addresses: &[RedisAddress]| {
            addresses
                .iter()
                .map(|address| PooledEndpoint::new(address, password, replica.pool_size, &timeouts))
                .collect::<CacheResult<Vec<_>>>()
        };

        Ok(Self {
            writers: build(&replica.writers)?,
            readers: build(&replica.readers)?,
            write_count: RoundRobin::new(),
            read_count: RoundRobin::new(),
            timeouts,
        })
    }

    /// Index of the writer serving the next write
    pub(crate) fn next_writer(&self) -> Option<usize> {
        self.write_count.select(self.writers.len())
    }

    /// Index of the reader serving the next read
    pub(crate) fn next_reader(&self) -> Option<usize> {
        self.read_count.select(self.readers.len())
    }

    fn writer(&self) -> CacheResult<&PooledEndpoint> {
        let endpoint = self.next_writer().and_then(|i| self.writers.get(i));
        endpoint.ok_or_else(|| CacheError::Unavailable {
            message: "no redis writer available".to_string(),
        })
    }

    fn reader(&self) -> CacheResult<&PooledEndpoint> {
        let endpoint = self.next_reader().and_then(|i| self.readers.get(i));
        endpoint.ok_or_else(|| CacheError::Unavailable {
            message: "no redis reader available".to_string(),
        })
    }

    async fn write(&self, key: &str, value: &[u8], ttl: Duration, condition: SetCondition) -> CacheResult<bool> {
        let writer = self.writer()?;
        debug!(writer = %writer.address, key = %key, "Replica write");

        let mut conn = writer.connection().await?;
        commands::set(&mut conn, &self.timeouts, key, value, ttl, condition).await
    }
}

#[async_trait]
impl CacheStore for ReplicaStore {
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.write(key, value, ttl, SetCondition::Always).await.map(|_| ())
    }

    async fn set_if_present(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        self.write(key, value, ttl, SetCondition::IfPresent).await
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        self.write(key, value, ttl, SetCondition::IfAbsent).await
    }

    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        let reader = self.reader()?;
        debug!(reader = %reader.address, key = %key, "Replica read");

        let mut conn = reader.connection().await?;
        commands::get(&mut conn, &self.timeouts, key).await
    }

    async fn delete(&self, keys: &[&str]) -> CacheResult<u64> {
        let writer = self.writer()?;
        let mut conn = writer.connection().await?;
        commands::delete(&mut conn, &self.timeouts, keys).await
    }

    fn backend_name(&self) -> &'static str {
        "replica"
    }
}
