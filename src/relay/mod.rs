//! # Relay Module
//!
//! The upstream side of the relay: the query options accepted by every endpoint,
//! the endpoints themselves, and the [`VideoRelay`] trait the admission gate calls on
//! a cache miss. [`youtube::YouTubeRelay`] is the production implementation.

pub mod youtube;

pub use youtube::YouTubeRelay;

use crate::core::error::RelayResult;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Relayed endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Search,
    Videos,
    PlaylistItems,
}

impl Endpoint {
    pub const ALL: [Endpoint; 3] = [Endpoint::Search, Endpoint::Videos, Endpoint::PlaylistItems];

    /// Upstream resource name
    pub fn resource(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Videos => "videos",
            Self::PlaylistItems => "playlistItems",
        }
    }

    /// Full request path, also the endpoint identifier used by the TTL policy
    pub fn path(&self) -> &'static str {
        match self {
            Self::Search => "/youtube/v3/search",
            Self::Videos => "/youtube/v3/videos",
            Self::PlaylistItems => "/youtube/v3/playlistItems",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource())
    }
}

/// Query parameters supported by the relayed endpoints
///
/// Absent parameters deserialize to empty strings, matching how the upstream API
/// treats them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    pub channel_id: String,
    pub event_type: String,
    pub fields: String,
    /// Comma-separated video or playlist item identifiers
    #[serde(rename = "id")]
    pub ids: String,
    #[serde(deserialize_with = "deserialize_max_results")]
    pub max_results: Option<i64>,
    pub order: String,
    pub page_token: String,
    pub part: String,
    pub playlist_id: String,
    #[serde(rename = "q")]
    pub query: String,
    pub safe_search: String,
    #[serde(rename = "type")]
    pub kind: String,
}

fn deserialize_max_results<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("maxResults({}) is not a number", value))),
    }
}

/// Client of the upstream video catalog
#[async_trait]
pub trait VideoRelay: Send + Sync {
    async fn search(&self, options: &Options) -> RelayResult<Value>;

    async fn list_by_video_ids(&self, options: &Options) -> RelayResult<Value>;

    async fn list_playlist_videos(&self, options: &Options) -> RelayResult<Value>;

    /// Dispatch to the operation serving `endpoint`
    async fn call(&self, endpoint: Endpoint, options: &Options) -> RelayResult<Value> {
        match endpoint {
            Endpoint::Search => self.search(options).await,
            Endpoint::Videos => self.list_by_video_ids(options).await,
            Endpoint::PlaylistItems => self.list_playlist_videos(options).await,
        }
    }
}
