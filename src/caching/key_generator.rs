//! # Cache Key Generator
//!
//! Cache keys have the form `<namespace>:cache:<identity>` (or the dotted
//! `<namespace>.cache.<identity>` form, chosen once per deployment). The identity is
//! the request path plus its query string with parameters sorted, so two requests that
//! only differ in parameter order share one entry.

use axum::http::{Method, Uri};
use serde::{Deserialize, Serialize};

use super::{CacheError, CacheResult};

/// Separator style of generated cache keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFormat {
    /// `<namespace>:cache:<identity>`
    #[default]
    Colon,

    /// `<namespace>.cache.<identity>`
    Dotted,
}

impl KeyFormat {
    fn separator(self) -> char {
        match self {
            Self::Colon => ':',
            Self::Dotted => '.',
        }
    }

    /// Build a cache key; both components must be non-empty
    pub fn make_key(self, namespace: &str, identity: &str) -> CacheResult<String> {
        if namespace.is_empty() {
            return Err(CacheError::InvalidArgument {
                message: "namespace cannot be empty".to_string(),
            });
        }

        if identity.is_empty() {
            return Err(CacheError::InvalidArgument {
                message: "key cannot be empty".to_string(),
            });
        }

        let sep = self.separator();
        Ok(format!("{namespace}{sep}cache{sep}{identity}"))
    }
}

/// Build a cache key in the default colon form
pub fn make_key(namespace: &str, identity: &str) -> CacheResult<String> {
    KeyFormat::Colon.make_key(namespace, identity)
}

/// Request identity used as the key suffix
///
/// GET and HEAD requests map to `path?sorted-query`; any other method is prefixed so
/// it can never collide with a cached read.
pub fn request_identity(method: &Method, uri: &Uri) -> String {
    let mut identity = String::new();

    if *method != Method::GET && *method != Method::HEAD {
        identity.push_str(method.as_str());
        identity.push(' ');
    }

    identity.push_str(uri.path());

    if let Some(query) = uri.query().map(normalize_query).filter(|q| !q.is_empty()) {
        identity.push('?');
        identity.push_str(&query);
    }

    identity
}

/// Sort `name=value` pairs by name, then value; the original encoding is kept
pub fn normalize_query(query: &str) -> String {
    let mut pairs: Vec<(&str, &str)> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .collect();

    pairs.sort();

    pairs
        .into_iter()
        .map(|(name, value)| {
            if value.is_empty() {
                name.to_string()
            } else {
                format!("{name}={value}")
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn test_colon_and_dotted_forms() {
        assert_eq!(
            make_key("yt-relay", "/youtube/v3/search?part=id").unwrap(),
            "yt-relay:cache:/youtube/v3/search?part=id"
        );
        assert_eq!(
            KeyFormat::Dotted.make_key("yt-relay", "/search").unwrap(),
            "yt-relay.cache./search"
        );
    }

    #[test]
    fn test_empty_components_are_rejected() {
        for x in ["", "a", "/search?part=id"] {
            assert!(matches!(make_key("", x), Err(CacheError::InvalidArgument { .. })));
            assert!(matches!(make_key(x, ""), Err(CacheError::InvalidArgument { .. })));
        }
    }

    #[test]
    fn test_key_is_deterministic_and_injective() {
        let identities = ["/a", "/b", "/a?x=1", "/a?x=2", "/a?x=1&y=2"];
        let keys: HashSet<String> = identities.iter().map(|i| make_key("ns", i).unwrap()).collect();
        assert_eq!(keys.len(), identities.len());

        for identity in identities {
            assert_eq!(make_key("ns", identity).unwrap(), make_key("ns", identity).unwrap());
        }
    }

    #[test]
    fn test_query_order_is_normalized() {
        let a = request_identity(&Method::GET, &uri("/youtube/v3/search?part=snippet&channelId=UC1&maxResults=5"));
        let b = request_identity(&Method::GET, &uri("/youtube/v3/search?maxResults=5&channelId=UC1&part=snippet"));
        assert_eq!(a, b);
        assert_eq!(a, "/youtube/v3/search?channelId=UC1&maxResults=5&part=snippet");
    }

    #[test]
    fn test_query_values_stay_significant() {
        let a = request_identity(&Method::GET, &uri("/videos?id=a,b"));
        let b = request_identity(&Method::GET, &uri("/videos?id=b,a"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_identity_without_query() {
        assert_eq!(request_identity(&Method::GET, &uri("/health")), "/health");
        assert_eq!(request_identity(&Method::GET, &uri("/health?")), "/health");
    }

    #[test]
    fn test_non_get_methods_are_prefixed() {
        assert_eq!(request_identity(&Method::HEAD, &uri("/search?q=1")), "/search?q=1");
        assert_eq!(request_identity(&Method::POST, &uri("/search?q=1")), "POST /search?q=1");
    }
}
