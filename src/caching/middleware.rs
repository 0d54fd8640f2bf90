//! # Cache Middleware
//!
//! The admission gate decides, per request, whether to replay a cached response or to
//! forward the request upstream, and whether and for how long the result is stored.
//!
//! ```text
//! disabled endpoint ──────────────────────────────► forward ─► respond
//! key ─► get ─► hit ─► replay (X-Cache: HIT)
//!              └► miss ─► forward ─► persist (ttl | error ttl) ─► respond (X-Cache: MISS)
//! ```
//!
//! Backend failures never fail a request: a failed read is treated as a miss and a
//! failed write is only logged.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Query;
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::key_generator::{request_identity, KeyFormat};
use super::policy::TtlPolicy;
use super::stores::CacheStore;
use super::{CacheError, CacheResult};
use crate::auth::Whitelist;
use crate::core::error::{RelayError, RelayResult};
use crate::observability::metrics;
use crate::relay::{Endpoint, Options, VideoRelay};

pub const ERROR_EMPTY_PART: &str = "part cannot be empty";
pub const ERROR_EMPTY_ID: &str = "id cannot be empty";

/// Name of the cache status response header
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Where a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    /// The cache was not consulted
    Bypass,
}

impl CacheStatus {
    fn header_value(self) -> Option<HeaderValue> {
        match self {
            Self::Hit => Some(HeaderValue::from_static("HIT")),
            Self::Miss => Some(HeaderValue::from_static("MISS")),
            Self::Bypass => None,
        }
    }
}

/// A stored response: status code plus the exact body bytes
///
/// Encoded as `{"code": <int>, "response": "<base64 body>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub code: u16,
    #[serde(serialize_with = "encode_body", deserialize_with = "decode_body")]
    pub response: Vec<u8>,
}

fn encode_body<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(body))
}

fn decode_body<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD.decode(encoded).map_err(serde::de::Error::custom)
}

impl CacheEntry {
    pub fn new(status: StatusCode, body: Vec<u8>) -> Self {
        Self {
            code: status.as_u16(),
            response: body,
        }
    }

    /// JSON payload answered with 200
    pub fn success(payload: &Value) -> RelayResult<Self> {
        Ok(Self::new(StatusCode::OK, serde_json::to_vec(payload)?))
    }

    /// `{"error": ...}` body with the error's status
    pub fn failure(err: &RelayError) -> Self {
        Self::new(err.status_code(), err.body().to_string().into_bytes())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn encode(&self) -> CacheResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> CacheResult<Self> {
        let entry: Self = serde_json::from_slice(bytes)?;
        if StatusCode::from_u16(entry.code).is_err() {
            return Err(CacheError::InvalidArgument {
                message: format!("stored status code {} is invalid", entry.code),
            });
        }
        Ok(entry)
    }

    /// Render with the given cache status header
    pub fn into_response_with(self, status: CacheStatus) -> Response {
        let code = self.status();
        let mut response = Response::new(Body::from(self.response));
        *response.status_mut() = code;

        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(value) = status.header_value() {
            headers.insert(CACHE_STATUS_HEADER, value);
        }

        response
    }
}

impl IntoResponse for CacheEntry {
    fn into_response(self) -> Response {
        self.into_response_with(CacheStatus::Bypass)
    }
}

/// Per-request cache and authorization decision
pub struct AdmissionGate {
    namespace: String,
    key_format: KeyFormat,
    policy: TtlPolicy,
    store: Option<Arc<dyn CacheStore>>,
    relay: Arc<dyn VideoRelay>,
    whitelist: Arc<Whitelist>,
}

impl AdmissionGate {
    /// `store` may be `None` when caching is switched off
    pub fn new(
        namespace: impl Into<String>,
        policy: TtlPolicy,
        store: Option<Arc<dyn CacheStore>>,
        relay: Arc<dyn VideoRelay>,
        whitelist: Arc<Whitelist>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            key_format: policy.settings().key_format,
            policy,
            store,
            relay,
            whitelist,
        }
    }

    /// The store, when `endpoint` reads and writes the cache
    fn store_for(&self, endpoint: Endpoint) -> Option<&Arc<dyn CacheStore>> {
        if !self.policy.is_enabled() {
            return None;
        }

        if self.policy.is_disabled(endpoint.path()) {
            info!(endpoint = %endpoint.path(), "cache is disabled for endpoint");
            return None;
        }

        self.store.as_ref()
    }

    /// Answer one request
    pub async fn handle(&self, endpoint: Endpoint, method: &Method, uri: &Uri) -> Response {
        let Some(store) = self.store_for(endpoint) else {
            return self.forward(endpoint, uri).await.into_response_with(CacheStatus::Bypass);
        };

        let identity = request_identity(method, uri);
        let key = match self.key_format.make_key(&self.namespace, &identity) {
            Ok(key) => key,
            Err(e) => {
                error!(identity = %identity, error = %e, "Fail to get cache key");
                return crate::internal_error!("Fail to get cache key: {}", e).into_response();
            }
        };

        if let Some(entry) = self.lookup(store.as_ref(), &key).await {
            return entry.into_response_with(CacheStatus::Hit);
        }

        let entry = self.forward(endpoint, uri).await;
        let ttl = if entry.is_success() {
            self.policy.resolve(endpoint.path()).ttl()
        } else {
            self.policy.resolve_error()
        };

        if let Some(ttl) = ttl {
            self.persist(store.as_ref(), &key, &entry, ttl).await;
        }

        entry.into_response_with(CacheStatus::Miss)
    }

    async fn lookup(&self, store: &dyn CacheStore, key: &str) -> Option<CacheEntry> {
        match store.get(key).await {
            Ok(bytes) => match CacheEntry::decode(&bytes) {
                Ok(entry) => {
                    debug!(key = %key, "respond with cache");
                    metrics::record_cache_hit();
                    Some(entry)
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                    metrics::record_backend_error("decode");
                    None
                }
            },
            Err(e) if e.is_not_found() => {
                debug!(key = %key, "Cache miss");
                metrics::record_cache_miss();
                None
            }
            Err(e) => {
                warn!(key = %key, backend = store.backend_name(), error = %e, "Cache read failed, treating as miss");
                metrics::record_backend_error("get");
                None
            }
        }
    }

    async fn persist(&self, store: &dyn CacheStore, key: &str, entry: &CacheEntry, ttl: Duration) {
        let bytes = match entry.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(key = %key, error = %e, "Cannot encode response for cache");
                metrics::record_cache_write(false);
                return;
            }
        };

        match store.set(key, &bytes, ttl).await {
            Ok(()) => {
                info!(key = %key, ttl = ?ttl, code = entry.code, "cache is set");
                metrics::record_cache_write(true);
            }
            Err(e) => {
                error!(key = %key, backend = store.backend_name(), error = %e, "setting cache encountered error");
                metrics::record_backend_error("set");
                metrics::record_cache_write(false);
            }
        }
    }

    /// Validate, authorize and call upstream; every outcome becomes an entry
    async fn forward(&self, endpoint: Endpoint, uri: &Uri) -> CacheEntry {
        let result = self.relay_request(endpoint, uri).await.and_then(|payload| CacheEntry::success(&payload));

        match result {
            Ok(entry) => entry,
            Err(e) => {
                warn!(endpoint = %endpoint.path(), error_type = e.error_type(), error = %e, "Request failed");
                CacheEntry::failure(&e)
            }
        }
    }

    async fn relay_request(&self, endpoint: Endpoint, uri: &Uri) -> RelayResult<Value> {
        let Query(options) = Query::<Options>::try_from_uri(uri)
            .map_err(|e| RelayError::invalid_argument(e.body_text()))?;

        if options.part.is_empty() {
            return Err(RelayError::invalid_argument(ERROR_EMPTY_PART));
        }

        if endpoint == Endpoint::Videos && options.ids.is_empty() {
            return Err(RelayError::invalid_argument(ERROR_EMPTY_ID));
        }

        if let Err(e) = self.whitelist.authorize(endpoint, &options) {
            metrics::record_whitelist_denied(endpoint);
            return Err(e);
        }

        let result = self.relay.call(endpoint, &options).await;
        metrics::record_upstream_request(endpoint, result.is_ok());
        let payload = result?;

        if endpoint == Endpoint::Videos {
            if let Err(e) = self.whitelist.verify_video_channels(&payload) {
                metrics::record_whitelist_denied(endpoint);
                return Err(e);
            }
        }

        Ok(payload)
    }
}
