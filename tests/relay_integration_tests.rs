//! # Relay Integration Tests
//!
//! Drive the full router (health route, relayed endpoints, cache headers) over an
//! in-memory store and a recording fake upstream, plus one end-to-end pass through the
//! real YouTube client against a mock HTTP server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use yt_relay::auth::Whitelist;
use yt_relay::caching::{AdmissionGate, CacheStore, InMemoryCache, TtlPolicy};
use yt_relay::core::config::{CacheSettings, UpstreamConfig, Whitelists};
use yt_relay::core::error::{RelayError, RelayResult};
use yt_relay::gateway::server::{build_router, ServerState};
use yt_relay::relay::{Options, VideoRelay, YouTubeRelay};

/// Fake upstream recording every call it receives
#[derive(Default)]
struct RecordingRelay {
    calls: AtomicUsize,
    seen: std::sync::Mutex<Vec<Options>>,
}

impl RecordingRelay {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self, options: &Options) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(options.clone());
        }
    }
}

#[async_trait]
impl VideoRelay for RecordingRelay {
    async fn search(&self, options: &Options) -> RelayResult<Value> {
        self.record(options);
        Ok(json!({
            "kind": "youtube#searchListResponse",
            "items": [{"id": {"videoId": "v1"}, "snippet": {"channelId": options.channel_id}}]
        }))
    }

    async fn list_by_video_ids(&self, options: &Options) -> RelayResult<Value> {
        self.record(options);
        Err(RelayError::upstream("The request cannot be completed because you have exceeded your quota."))
    }

    async fn list_playlist_videos(&self, options: &Options) -> RelayResult<Value> {
        self.record(options);
        Ok(json!({"kind": "youtube#playlistItemListResponse", "items": []}))
    }
}

fn whitelists() -> Whitelists {
    Whitelists {
        channel_ids: HashMap::from([("UC1".to_string(), true)]),
        playlist_ids: HashMap::from([("PL1".to_string(), true), ("v1".to_string(), true)]),
        verify_video_channels: false,
    }
}

fn cache_settings(enabled: bool) -> CacheSettings {
    CacheSettings {
        is_enabled: enabled,
        ttl: Duration::from_secs(300),
        error_ttl: Duration::from_secs(15),
        ..Default::default()
    }
}

struct Harness {
    server: TestServer,
    store: Arc<InMemoryCache>,
    relay: Arc<RecordingRelay>,
}

fn harness(settings: CacheSettings) -> Harness {
    let store = Arc::new(InMemoryCache::new());
    let relay = Arc::new(RecordingRelay::default());

    let gate = AdmissionGate::new(
        "yt-relay",
        TtlPolicy::new(settings),
        Some(store.clone() as Arc<dyn CacheStore>),
        relay.clone(),
        Arc::new(Whitelist::new(&whitelists())),
    );

    let state = ServerState {
        gate: Arc::new(gate),
        metrics: None,
    };
    let server = TestServer::new(build_router(state, "/metrics")).unwrap();

    Harness { server, store, relay }
}

#[tokio::test]
async fn test_health_check() {
    let h = harness(cache_settings(true));

    let response = h.server.get("/health").await;
    response.assert_status_ok();
    assert!(response.text().is_empty());
    assert_eq!(h.store.stats().reads, 0);
}

#[tokio::test]
async fn test_disabled_cache_never_touches_store() {
    let h = harness(cache_settings(false));

    for _ in 0..2 {
        let response = h.server.get("/youtube/v3/search?part=snippet&channelId=UC1").await;
        response.assert_status_ok();
        assert!(response.headers().get("x-cache").is_none());
    }

    assert_eq!(h.relay.calls(), 2);
    assert_eq!(h.store.stats().reads, 0);
    assert_eq!(h.store.stats().writes, 0);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_miss_then_byte_identical_hit() {
    let h = harness(cache_settings(true));
    let uri = "/youtube/v3/search?part=snippet&channelId=UC1";

    let first = h.server.get(uri).await;
    first.assert_status_ok();
    assert_eq!(first.headers()["x-cache"], "MISS");
    assert_eq!(first.headers()["content-type"], "application/json");

    let second = h.server.get(uri).await;
    second.assert_status_ok();
    assert_eq!(second.headers()["x-cache"], "HIT");
    assert_eq!(second.as_bytes(), first.as_bytes());

    assert_eq!(h.relay.calls(), 1);
    let ttl = h
        .store
        .ttl_of("yt-relay:cache:/youtube/v3/search?channelId=UC1&part=snippet")
        .unwrap();
    assert!(ttl > Duration::from_secs(290) && ttl <= Duration::from_secs(300));
}

#[tokio::test]
async fn test_parameter_order_shares_one_entry() {
    let h = harness(cache_settings(true));

    h.server
        .get("/youtube/v3/playlistItems?playlistId=PL1&part=snippet")
        .await
        .assert_status_ok();
    let second = h
        .server
        .get("/youtube/v3/playlistItems?part=snippet&playlistId=PL1")
        .await;

    assert_eq!(second.headers()["x-cache"], "HIT");
    assert_eq!(h.relay.calls(), 1);
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn test_unlisted_channel_is_denied_before_upstream() {
    let h = harness(cache_settings(true));

    let response = h.server.get("/youtube/v3/search?part=snippet&channelId=UC123").await;
    response.assert_status(StatusCode::FORBIDDEN);
    response.assert_json(&json!({"error": "channelId(UC123) is invalid"}));

    assert_eq!(h.relay.calls(), 0);
    let ttl = h
        .store
        .ttl_of("yt-relay:cache:/youtube/v3/search?channelId=UC123&part=snippet")
        .unwrap();
    assert!(ttl <= Duration::from_secs(15));
}

#[tokio::test]
async fn test_upstream_error_is_cached_under_error_ttl() {
    let mut settings = cache_settings(true);
    settings
        .overwrite_ttl
        .insert("/youtube/v3/videos".to_string(), Duration::from_secs(3600));
    let h = harness(settings);
    let uri = "/youtube/v3/videos?part=snippet&id=v1";

    let first = h.server.get(uri).await;
    first.assert_status(StatusCode::BAD_GATEWAY);
    assert_eq!(first.headers()["x-cache"], "MISS");

    let ttl = h.store.ttl_of("yt-relay:cache:/youtube/v3/videos?id=v1&part=snippet").unwrap();
    assert!(ttl <= Duration::from_secs(15));

    let replay = h.server.get(uri).await;
    replay.assert_status(StatusCode::BAD_GATEWAY);
    assert_eq!(replay.headers()["x-cache"], "HIT");
    assert_eq!(replay.as_bytes(), first.as_bytes());
    assert_eq!(h.relay.calls(), 1);
}

#[tokio::test]
async fn test_concurrent_identical_requests() {
    let h = harness(cache_settings(true));
    let uri = "/youtube/v3/search?part=snippet&channelId=UC1";

    let responses = futures::future::join_all((0..8).map(|_| async { h.server.get(uri).await })).await;

    for response in &responses {
        response.assert_status_ok();
    }
    assert!(h.relay.calls() >= 1);
    assert_eq!(h.store.len(), 1);

    let after = h.server.get(uri).await;
    assert_eq!(after.headers()["x-cache"], "HIT");
    assert_eq!(after.as_bytes(), responses[0].as_bytes());
}

#[tokio::test]
async fn test_invalid_max_results_is_a_bad_request() {
    let h = harness(cache_settings(true));

    let response = h
        .server
        .get("/youtube/v3/search?part=snippet&channelId=UC1&maxResults=ten")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.text().contains("maxResults(ten) is not a number"));
    assert_eq!(h.relay.calls(), 0);
}

#[tokio::test]
async fn test_options_reach_upstream() {
    let h = harness(cache_settings(false));

    h.server
        .get("/youtube/v3/search?part=snippet&channelId=UC1&q=rust&maxResults=5&type=video")
        .await
        .assert_status_ok();

    let seen = h.relay.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].query, "rust");
    assert_eq!(seen[0].max_results, Some(5));
    assert_eq!(seen[0].kind, "video");
}

#[tokio::test]
async fn test_end_to_end_through_youtube_client() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/playlistItems"))
        .and(query_param("playlistId", "PL1"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [{"id": "item-1"}]})))
        .expect(1)
        .mount(&upstream)
        .await;

    let relay = YouTubeRelay::new(
        "test-key",
        &UpstreamConfig {
            base_url: format!("{}/youtube/v3", upstream.uri()),
            timeout: Duration::from_secs(5),
        },
    )
    .unwrap();

    let store = Arc::new(InMemoryCache::new());
    let gate = AdmissionGate::new(
        "yt-relay",
        TtlPolicy::new(cache_settings(true)),
        Some(store.clone() as Arc<dyn CacheStore>),
        Arc::new(relay),
        Arc::new(Whitelist::new(&whitelists())),
    );
    let server = TestServer::new(build_router(
        ServerState {
            gate: Arc::new(gate),
            metrics: None,
        },
        "/metrics",
    ))
    .unwrap();

    let uri = "/youtube/v3/playlistItems?part=snippet&playlistId=PL1";
    let first = server.get(uri).await;
    first.assert_status_ok();
    first.assert_json(&json!({"items": [{"id": "item-1"}]}));

    let second = server.get(uri).await;
    assert_eq!(second.headers()["x-cache"], "HIT");
    assert_eq!(store.len(), 1);
}
