//! YouTube Data API v3 client.

use super::{Endpoint, Options, VideoRelay};
use crate::core::config::UpstreamConfig;
use crate::core::error::{RelayError, RelayResult};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// Query pairs sent upstream
type Params = Vec<(&'static str, String)>;

fn push(params: &mut Params, name: &'static str, value: &str) {
    if !value.is_empty() {
        params.push((name, value.to_string()));
    }
}

fn push_max_results(params: &mut Params, options: &Options) {
    if let Some(max) = options.max_results.filter(|max| *max != 0) {
        params.push(("maxResults", max.to_string()));
    }
}

/// [`VideoRelay`] backed by the YouTube Data API
pub struct YouTubeRelay {
    client: Client,
    base_url: String,
    api_key: String,
}

impl YouTubeRelay {
    pub fn new(api_key: &str, upstream: &UpstreamConfig) -> RelayResult<Self> {
        if api_key.is_empty() {
            return Err(RelayError::config("apikey is empty for youtube service"));
        }

        let client = Client::builder()
            .timeout(upstream.timeout)
            .build()
            .map_err(|e| crate::config_error!("Cannot build upstream client: {}", e))?;

        Ok(Self {
            client,
            base_url: upstream.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn fetch(&self, endpoint: Endpoint, params: Params) -> RelayResult<Value> {
        let url = format!("{}/{}", self.base_url, endpoint.resource());
        debug!(endpoint = %endpoint, params = ?params, "Calling upstream");

        let response = self
            .client
            .get(&url)
            .query(&params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| RelayError::upstream(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::upstream(e.without_url().to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<Value>(&body)
                .ok()
                .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| format!("upstream returned {}", status));
            return Err(RelayError::upstream(message));
        }

        serde_json::from_slice(&body)
            .map_err(|e| RelayError::upstream(format!("invalid upstream payload: {}", e)))
    }
}

#[async_trait]
impl VideoRelay for YouTubeRelay {
    async fn search(&self, options: &Options) -> RelayResult<Value> {
        let mut params = Params::new();
        push(&mut params, "part", &options.part);
        push(&mut params, "channelId", &options.channel_id);
        push(&mut params, "q", &options.query);
        push_max_results(&mut params, options);
        push(&mut params, "pageToken", &options.page_token);
        push(&mut params, "order", &options.order);
        push(&mut params, "safeSearch", &options.safe_search);
        push(&mut params, "type", &options.kind);
        push(&mut params, "eventType", &options.event_type);
        push(&mut params, "fields", &options.fields);

        self.fetch(Endpoint::Search, params).await
    }

    async fn list_by_video_ids(&self, options: &Options) -> RelayResult<Value> {
        let mut params = Params::new();
        push(&mut params, "part", &options.part);
        push(&mut params, "id", &options.ids);
        push_max_results(&mut params, options);
        push(&mut params, "pageToken", &options.page_token);
        push(&mut params, "fields", &options.fields);

        self.fetch(Endpoint::Videos, params).await
    }

    async fn list_playlist_videos(&self, options: &Options) -> RelayResult<Value> {
        let mut params = Params::new();
        push(&mut params, "part", &options.part);
        push(&mut params, "id", &options.ids);
        push(&mut params, "playlistId", &options.playlist_id);
        push(&mut params, "pageToken", &options.page_token);
        push_max_results(&mut params, options);
        push(&mut params, "fields", &options.fields);

        self.fetch(Endpoint::PlaylistItems, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn relay(server: &MockServer) -> YouTubeRelay {
        let upstream = UpstreamConfig {
            base_url: format!("{}/youtube/v3/", server.uri()),
            timeout: Duration::from_secs(2),
        };
        YouTubeRelay::new("test-key", &upstream).unwrap()
    }

    #[test]
    fn test_requires_api_key() {
        let err = YouTubeRelay::new("", &UpstreamConfig::default()).err().unwrap();
        assert!(matches!(err, RelayError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_search_forwards_parameters_and_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/youtube/v3/search"))
            .and(query_param("part", "snippet"))
            .and(query_param("channelId", "UC1"))
            .and(query_param("maxResults", "10"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [{"id": "a"}]})))
            .expect(1)
            .mount(&server)
            .await;

        let options = Options {
            part: "snippet".to_string(),
            channel_id: "UC1".to_string(),
            max_results: Some(10),
            ..Default::default()
        };
        let body = relay(&server).search(&options).await.unwrap();
        assert_eq!(body["items"][0]["id"], "a");
    }

    #[tokio::test]
    async fn test_empty_parameters_are_not_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/youtube/v3/playlistItems"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        let options = Options {
            part: "snippet".to_string(),
            playlist_id: "PL1".to_string(),
            ..Default::default()
        };
        relay(&server).list_playlist_videos(&options).await.unwrap();

        let received = server.received_requests().await.unwrap();
        let query = received[0].url.query().unwrap_or_default().to_string();
        assert!(query.contains("playlistId=PL1"));
        assert!(!query.contains("pageToken"));
        assert!(!query.contains("maxResults"));
    }

    #[tokio::test]
    async fn test_upstream_error_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/youtube/v3/videos"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(json!({"error": {"code": 403, "message": "quotaExceeded"}})),
            )
            .mount(&server)
            .await;

        let options = Options {
            part: "snippet".to_string(),
            ids: "v1".to_string(),
            ..Default::default()
        };
        let err = relay(&server).list_by_video_ids(&options).await.unwrap_err();
        assert!(matches!(err, RelayError::Upstream { .. }));
        assert_eq!(err.to_string(), "quotaExceeded");
    }

    #[tokio::test]
    async fn test_non_json_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let err = relay(&server)
            .call(Endpoint::Search, &Options::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_transport_error_hides_api_key() {
        let upstream = UpstreamConfig {
            base_url: "http://127.0.0.1:1/youtube/v3".to_string(),
            timeout: Duration::from_millis(500),
        };
        let relay = YouTubeRelay::new("secret-key", &upstream).unwrap();

        let err = relay.search(&Options::default()).await.unwrap_err();
        assert!(matches!(err, RelayError::Upstream { .. }));
        assert!(!err.to_string().contains("secret-key"));
    }
}
