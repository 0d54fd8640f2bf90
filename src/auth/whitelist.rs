use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::core::config::Whitelists;
use crate::core::error::{RelayError, RelayResult};
use crate::relay::{Endpoint, Options};

const INVALID_VIDEO_CHANNEL: &str = "some video's channel id is invalid";

/// Immutable allow-lists of upstream identifiers
///
/// An identifier is authorized only when it is present AND mapped to `true`.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    channel_ids: HashMap<String, bool>,
    playlist_ids: HashMap<String, bool>,
    verify_video_channels: bool,
}

impl Whitelist {
    pub fn new(conf: &Whitelists) -> Self {
        Self {
            channel_ids: conf.channel_ids.clone(),
            playlist_ids: conf.playlist_ids.clone(),
            verify_video_channels: conf.verify_video_channels,
        }
    }

    pub fn validate_channel(&self, channel_id: &str) -> bool {
        self.channel_ids.get(channel_id).copied().unwrap_or(false)
    }

    /// True when ANY of the comma-separated identifiers is authorized
    pub fn validate_playlist_or_video(&self, ids: &str) -> bool {
        ids.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .any(|id| self.playlist_ids.get(id).copied().unwrap_or(false))
    }

    /// Check the identifiers carried by a request before it goes upstream
    pub fn authorize(&self, endpoint: Endpoint, options: &Options) -> RelayResult<()> {
        match endpoint {
            Endpoint::Search => {
                if !self.validate_channel(&options.channel_id) {
                    return Err(RelayError::denied(format!("channelId({}) is invalid", options.channel_id)));
                }
            }
            Endpoint::PlaylistItems => {
                let ids: Vec<&str> = [options.playlist_id.as_str(), options.ids.as_str()]
                    .into_iter()
                    .filter(|ids| !ids.is_empty())
                    .collect();

                if !self.validate_playlist_or_video(&ids.join(",")) {
                    return Err(RelayError::denied(format!("playlistId({}) is invalid", options.playlist_id)));
                }
            }
            Endpoint::Videos => {
                if !self.validate_playlist_or_video(&options.ids) {
                    return Err(RelayError::denied(format!("id({}) is invalid", options.ids)));
                }
            }
        }

        Ok(())
    }

    /// Check the owner channel of every video in a videos listing
    ///
    /// No-op unless `verifyVideoChannels` is configured.
    pub fn verify_video_channels(&self, payload: &Value) -> RelayResult<()> {
        if !self.verify_video_channels {
            return Ok(());
        }

        let items = payload.get("items").and_then(Value::as_array);
        for item in items.into_iter().flatten() {
            let channel_id = item
                .pointer("/snippet/channelId")
                .and_then(Value::as_str)
                .unwrap_or_default();

            if !self.validate_channel(channel_id) {
                warn!(channel_id = %channel_id, "Video owned by a channel outside the whitelist");
                return Err(RelayError::denied(format!(
                    "{}: channelId({}) is invalid",
                    INVALID_VIDEO_CHANNEL, channel_id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn whitelist() -> Whitelist {
        let mut conf = Whitelists::default();
        conf.channel_ids.insert("UC1".to_string(), true);
        conf.channel_ids.insert("UC_OFF".to_string(), false);
        conf.playlist_ids.insert("PL1".to_string(), true);
        conf.playlist_ids.insert("PL_OFF".to_string(), false);
        conf.playlist_ids.insert("v1".to_string(), true);
        Whitelist::new(&conf)
    }

    #[test]
    fn test_channel_requires_present_and_true() {
        let wl = whitelist();
        assert!(wl.validate_channel("UC1"));
        assert!(!wl.validate_channel("UC_OFF"));
        assert!(!wl.validate_channel("UC123"));
        assert!(!wl.validate_channel(""));
    }

    #[test]
    fn test_any_of_comma_separated_ids() {
        let wl = whitelist();
        assert!(wl.validate_playlist_or_video("PL1"));
        assert!(wl.validate_playlist_or_video("nope,PL1"));
        assert!(wl.validate_playlist_or_video(" PL_OFF , v1 "));
        assert!(!wl.validate_playlist_or_video("PL_OFF,nope"));
        assert!(!wl.validate_playlist_or_video(""));
        assert!(!wl.validate_playlist_or_video(",,"));
    }

    #[test]
    fn test_authorize_search() {
        let wl = whitelist();
        let mut options = Options {
            channel_id: "UC123".to_string(),
            ..Default::default()
        };

        let err = wl.authorize(Endpoint::Search, &options).unwrap_err();
        assert!(matches!(err, RelayError::AuthorizationDenied { .. }));
        assert_eq!(err.to_string(), "channelId(UC123) is invalid");

        options.channel_id = "UC1".to_string();
        assert!(wl.authorize(Endpoint::Search, &options).is_ok());
    }

    #[test]
    fn test_authorize_playlist_items() {
        let wl = whitelist();
        let by_playlist = Options {
            playlist_id: "PL1".to_string(),
            ..Default::default()
        };
        assert!(wl.authorize(Endpoint::PlaylistItems, &by_playlist).is_ok());

        let by_item_ids = Options {
            playlist_id: "PL_OFF".to_string(),
            ids: "v1".to_string(),
            ..Default::default()
        };
        assert!(wl.authorize(Endpoint::PlaylistItems, &by_item_ids).is_ok());

        let err = wl.authorize(Endpoint::PlaylistItems, &Options::default()).unwrap_err();
        assert_eq!(err.to_string(), "playlistId() is invalid");
    }

    #[test]
    fn test_authorize_videos() {
        let wl = whitelist();
        let options = Options {
            ids: "x,y".to_string(),
            ..Default::default()
        };
        let err = wl.authorize(Endpoint::Videos, &options).unwrap_err();
        assert_eq!(err.to_string(), "id(x,y) is invalid");
    }

    #[test]
    fn test_video_channel_verification() {
        let mut conf = Whitelists::default();
        conf.channel_ids.insert("UC1".to_string(), true);
        conf.verify_video_channels = true;
        let wl = Whitelist::new(&conf);

        let ok = json!({"items": [{"snippet": {"channelId": "UC1"}}]});
        assert!(wl.verify_video_channels(&ok).is_ok());

        let bad = json!({"items": [
            {"snippet": {"channelId": "UC1"}},
            {"snippet": {"channelId": "UC9"}}
        ]});
        let err = wl.verify_video_channels(&bad).unwrap_err();
        assert!(err.to_string().starts_with("some video's channel id is invalid"));

        assert!(wl.verify_video_channels(&json!({})).is_ok());
        assert!(whitelist().verify_video_channels(&bad).is_ok());
    }
}
