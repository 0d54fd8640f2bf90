//! # Configuration Module
//!
//! This module handles loading, overriding and validating the relay configuration.
//!
//! ## Key Features
//! - YAML configuration parsing with serde (camelCase keys)
//! - Environment variable override support
//! - Validation that collects every problem into a single error message
//! - Cache TTLs accept either integer seconds or humantime strings (`"5m"`)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::caching::key_generator::KeyFormat;
use crate::core::error::RelayResult;

/// Main relay configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conf {
    /// Application name, used as the cache key namespace
    pub app_name: String,

    /// Bind address
    #[serde(default = "default_address")]
    pub address: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// YouTube Data API key
    pub api_key: String,

    /// Response cache settings
    #[serde(default)]
    pub cache: CacheSettings,

    /// Redis backend, required when the cache is enabled
    #[serde(default)]
    pub redis: Option<RedisService>,

    /// Identifier allow-lists
    pub whitelists: Whitelists,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Prometheus metrics exposition
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Upstream video catalog client settings
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Conf {
    /// Load configuration from a YAML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> RelayResult<Self> {
        let path = path.as_ref();
        tracing::info!("loading configuration file from {}", path.display());

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| crate::config_error!("Failed to read config file: {}", e))?;

        Self::from_yaml_str(&content)
    }

    /// Parse, override and validate configuration from YAML text
    pub fn from_yaml_str(content: &str) -> RelayResult<Self> {
        let mut config: Conf = serde_yaml::from_str(content)
            .map_err(|e| crate::config_error!("Failed to parse config: {}", e))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    ///
    /// Environment variables follow the pattern: YT_RELAY_<FIELD>
    /// For example: YT_RELAY_PORT=9090
    pub fn apply_env_overrides(&mut self) -> RelayResult<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn apply_overrides<F>(&mut self, lookup: F) -> RelayResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("YT_RELAY_ADDRESS") {
            self.address = addr;
        }

        if let Some(port) = lookup("YT_RELAY_PORT") {
            self.port = port
                .parse()
                .map_err(|e| crate::config_error!("Invalid YT_RELAY_PORT: {}", e))?;
        }

        if let Some(key) = lookup("YT_RELAY_API_KEY") {
            self.api_key = key;
        }

        if let Some(level) = lookup("YT_RELAY_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = lookup("YT_RELAY_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Configuration validation with detailed error messages
    pub fn validate(&self) -> RelayResult<()> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("appName cannot be empty".to_string());
        }

        if self.api_key.is_empty() {
            errors.push("apiKey cannot be empty".to_string());
        }

        if self.address.is_empty() {
            errors.push("address cannot be empty".to_string());
        }

        if self.whitelists.channel_ids.is_empty() {
            errors.push("whitelists.channelIDs cannot be empty".to_string());
        }

        if self.whitelists.playlist_ids.is_empty() {
            errors.push("whitelists.playlistIDs cannot be empty".to_string());
        }

        if self.cache.is_enabled {
            if self.cache.ttl.is_zero() {
                errors.push("cache.ttl must be greater than 0".to_string());
            }
            if self.cache.error_ttl.is_zero() {
                errors.push("cache.errorTtl must be greater than 0".to_string());
            }
            for (api, ttl) in &self.cache.overwrite_ttl {
                if ttl.is_zero() {
                    errors.push(format!("cache.overwriteTtl for '{}' must be greater than 0", api));
                }
            }
            if self.redis.is_none() {
                errors.push("redis must be configured when the cache is enabled".to_string());
            }
        }

        if let Some(ref redis) = self.redis {
            redis.collect_errors(&mut errors);
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => errors.push(format!("Invalid log level: {}", self.logging.level)),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "text" => {}
            _ => errors.push(format!("Invalid log format: {}", self.logging.format)),
        }

        if !self.metrics.path.starts_with('/') {
            errors.push(format!("metrics.path must start with '/': {}", self.metrics.path));
        }

        if Url::parse(&self.upstream.base_url).is_err() {
            errors.push(format!("upstream.baseUrl is not a valid URL: {}", self.upstream.base_url));
        }

        if self.upstream.timeout.is_zero() {
            errors.push("upstream.timeout must be greater than 0".to_string());
        }

        if !errors.is_empty() {
            return Err(crate::config_error!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            ));
        }

        tracing::info!("configuration ok");
        Ok(())
    }
}

/// Response cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    /// Master switch for reading and writing the cache
    pub is_enabled: bool,

    /// TTL for successful responses
    #[serde(with = "duration_serde")]
    pub ttl: Duration,

    /// TTL for failed responses, never overridden per endpoint
    #[serde(with = "duration_serde")]
    pub error_ttl: Duration,

    /// Per-endpoint success TTL overrides, keyed by request path
    #[serde(with = "duration_serde::map")]
    pub overwrite_ttl: HashMap<String, Duration>,

    /// Endpoints that never touch the cache when mapped to `true`
    #[serde(rename = "disabledApis")]
    pub disabled_apis: HashMap<String, bool>,

    /// Separator style of generated cache keys
    pub key_format: KeyFormat,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            is_enabled: false,
            ttl: Duration::from_secs(300),
            error_ttl: Duration::from_secs(30),
            overwrite_ttl: HashMap::new(),
            disabled_apis: HashMap::new(),
            key_format: KeyFormat::default(),
        }
    }
}

/// Identifier allow-lists
///
/// Keys are identifiers, values determine whether the entry is effective.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Whitelists {
    #[serde(rename = "channelIDs", default)]
    pub channel_ids: HashMap<String, bool>,

    #[serde(rename = "playlistIDs", default)]
    pub playlist_ids: HashMap<String, bool>,

    /// Check `snippet.channelId` of every item returned by the videos endpoint
    #[serde(rename = "verifyVideoChannels", default)]
    pub verify_video_channels: bool,
}

/// Redis backend configuration, the section matching `type` must be present
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisService {
    #[serde(rename = "type")]
    pub kind: RedisType,

    #[serde(default)]
    pub cluster: Option<RedisCluster>,

    #[serde(default)]
    pub single: Option<RedisSingleInstance>,

    #[serde(default)]
    pub sentinel: Option<RedisSentinel>,

    #[serde(default)]
    pub replica: Option<RedisReplicaInstances>,

    #[serde(default)]
    pub timeouts: RedisTimeouts,
}

impl RedisService {
    fn collect_errors(&self, errors: &mut Vec<String>) {
        match self.kind {
            RedisType::Cluster => match &self.cluster {
                None => errors.push("redis.cluster must be configured for type cluster".to_string()),
                Some(cluster) if cluster.addresses.is_empty() => {
                    errors.push("redis.cluster.addresses cannot be empty".to_string())
                }
                Some(_) => {}
            },
            RedisType::Single => match &self.single {
                None => errors.push("redis.single must be configured for type single".to_string()),
                Some(single) if single.instance.address.is_empty() => {
                    errors.push("redis.single.instance.address cannot be empty".to_string())
                }
                Some(_) => {}
            },
            RedisType::Sentinel => match &self.sentinel {
                None => errors.push("redis.sentinel must be configured for type sentinel".to_string()),
                Some(sentinel) => {
                    if sentinel.addresses.is_empty() {
                        errors.push("redis.sentinel.addresses cannot be empty".to_string());
                    }
                    if sentinel.master_name.is_empty() {
                        errors.push("redis.sentinel.masterName cannot be empty".to_string());
                    }
                }
            },
            RedisType::Replica => match &self.replica {
                None => errors.push("redis.replica must be configured for type replica".to_string()),
                Some(replica) => {
                    if replica.writers.is_empty() {
                        errors.push("redis.replica.writers cannot be empty".to_string());
                    }
                    if replica.readers.is_empty() {
                        errors.push("redis.replica.readers cannot be empty".to_string());
                    }
                    if replica.pool_size == 0 {
                        errors.push("redis.replica.poolSize must be greater than 0".to_string());
                    }
                }
            },
        }

        if self.timeouts.dial.is_zero() || self.timeouts.read.is_zero() || self.timeouts.write.is_zero() {
            errors.push("redis.timeouts must be greater than 0".to_string());
        }
    }
}

/// Redis deployment topologies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedisType {
    Cluster,
    Single,
    Sentinel,
    Replica,
}

impl std::fmt::Display for RedisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Cluster => "cluster",
            Self::Single => "single",
            Self::Sentinel => "sentinel",
            Self::Replica => "replica",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisCluster {
    #[serde(default)]
    pub addresses: Vec<RedisAddress>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSingleInstance {
    pub instance: RedisAddress,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisSentinel {
    #[serde(default)]
    pub addresses: Vec<RedisAddress>,
    /// Password of the monitored primary
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_master_name")]
    pub master_name: String,
}

fn default_master_name() -> String {
    "mymaster".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisReplicaInstances {
    #[serde(default)]
    pub writers: Vec<RedisAddress>,
    #[serde(default)]
    pub readers: Vec<RedisAddress>,
    #[serde(default)]
    pub password: Option<String>,
    /// Maximum pooled connections per address
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    20
}

/// A single Redis endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisAddress {
    pub address: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
}

fn default_redis_port() -> u16 {
    6379
}

impl RedisAddress {
    pub fn new<S: Into<String>>(address: S, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// `redis://` URL for this endpoint, with the password percent-encoded
    pub fn connection_url(&self, password: Option<&str>) -> RelayResult<String> {
        let mut url = Url::parse(&format!("redis://{}:{}", self.address, self.port))
            .map_err(|e| crate::config_error!("Invalid redis address {}: {}", self, e))?;

        if let Some(password) = password.filter(|p| !p.is_empty()) {
            url.set_password(Some(password))
                .map_err(|_| crate::config_error!("Cannot set password for redis address {}", self))?;
        }

        Ok(url.to_string())
    }
}

impl std::fmt::Display for RedisAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Per-operation timeouts applied to every backend call
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RedisTimeouts {
    #[serde(with = "humantime_serde")]
    pub dial: Duration,
    #[serde(with = "humantime_serde")]
    pub read: Duration,
    #[serde(with = "humantime_serde")]
    pub write: Duration,
}

impl Default for RedisTimeouts {
    fn default() -> Self {
        Self {
            dial: Duration::from_secs(1),
            read: Duration::from_secs(1),
            write: Duration::from_secs(1),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,

    /// Log format (json, text)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Expose Prometheus metrics
    pub enabled: bool,

    /// Metrics endpoint path
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "/metrics".to_string(),
        }
    }
}

/// Upstream video catalog client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpstreamConfig {
    /// Base URL of the YouTube Data API v3
    pub base_url: String,

    /// Whole-request timeout for one upstream call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Durations written either as integer seconds or as humantime strings
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Seconds(u64),
        Text(String),
    }

    impl Repr {
        fn into_duration<E: serde::de::Error>(self) -> Result<Duration, E> {
            match self {
                Repr::Seconds(secs) => Ok(Duration::from_secs(secs)),
                Repr::Text(text) => humantime::parse_duration(&text).map_err(E::custom),
            }
        }
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Repr::deserialize(deserializer)?.into_duration()
    }

    pub mod map {
        use super::Repr;
        use serde::ser::SerializeMap;
        use serde::{Deserialize, Deserializer, Serializer};
        use std::collections::HashMap;
        use std::time::Duration;

        pub fn serialize<S: Serializer>(
            value: &HashMap<String, Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(value.len()))?;
            for (k, v) in value {
                map.serialize_entry(k, &humantime::format_duration(*v).to_string())?;
            }
            map.end()
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<HashMap<String, Duration>, D::Error> {
            HashMap::<String, Repr>::deserialize(deserializer)?
                .into_iter()
                .map(|(k, v)| v.into_duration().map(|d| (k, d)))
                .collect()
        }
    }
}
