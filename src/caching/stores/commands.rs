//! Redis commands shared by every topology, with per-operation timeouts.

use redis::aio::ConnectionLike;
use redis::{Cmd, RedisResult};
use std::future::Future;
use std::time::Duration;

use crate::caching::{CacheError, CacheResult};
use crate::core::config::RedisTimeouts;

/// Conditional flag of a `SET`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SetCondition {
    /// Always write
    Always,
    /// `XX`: only when the key exists
    IfPresent,
    /// `NX`: only when the key is absent
    IfAbsent,
}

pub(crate) fn set_cmd(key: &str, value: &[u8], ttl: Duration, condition: SetCondition) -> Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value);

    if !ttl.is_zero() {
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        cmd.arg("PX").arg(millis);
    }

    match condition {
        SetCondition::Always => {}
        SetCondition::IfPresent => {
            cmd.arg("XX");
        }
        SetCondition::IfAbsent => {
            cmd.arg("NX");
        }
    }

    cmd
}

/// Run a backend future under a deadline
pub(crate) async fn with_timeout<T, F>(limit: Duration, fut: F) -> CacheResult<T>
where
    F: Future<Output = RedisResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(CacheError::from),
        Err(_) => Err(CacheError::Timeout),
    }
}

/// `SET key value [PX ttl] [XX|NX]`, returns whether the write was applied
pub(crate) async fn set<C>(
    conn: &mut C,
    timeouts: &RedisTimeouts,
    key: &str,
    value: &[u8],
    ttl: Duration,
    condition: SetCondition,
) -> CacheResult<bool>
where
    C: ConnectionLike + Send,
{
    let cmd = set_cmd(key, value, ttl, condition);
    let reply: Option<String> = with_timeout(timeouts.write, cmd.query_async(conn)).await?;
    Ok(reply.is_some())
}

pub(crate) async fn get<C>(conn: &mut C, timeouts: &RedisTimeouts, key: &str) -> CacheResult<Vec<u8>>
where
    C: ConnectionLike + Send,
{
    let mut cmd = redis::cmd("GET");
    cmd.arg(key);

    let reply: Option<Vec<u8>> = with_timeout(timeouts.read, cmd.query_async(conn)).await?;
    reply.ok_or_else(|| CacheError::not_found(key))
}

pub(crate) async fn delete<C>(conn: &mut C, timeouts: &RedisTimeouts, keys: &[&str]) -> CacheResult<u64>
where
    C: ConnectionLike + Send,
{
    if keys.is_empty() {
        return Ok(0);
    }

    let mut cmd = redis::cmd("DEL");
    for key in keys {
        cmd.arg(*key);
    }

    with_timeout(timeouts.write, cmd.query_async(conn)).await
}
