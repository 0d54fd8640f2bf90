//! TTL resolution for cached responses.

use std::time::Duration;

use crate::core::config::CacheSettings;

/// Outcome of resolving the success TTL for an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlDecision {
    /// The endpoint never reads or writes the cache
    Disabled,
    Ttl(Duration),
}

impl TtlDecision {
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }

    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Self::Disabled => None,
            Self::Ttl(ttl) => Some(*ttl),
        }
    }
}

/// Resolves TTLs from the cache settings
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    settings: CacheSettings,
}

impl TtlPolicy {
    pub fn new(settings: CacheSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.is_enabled
    }

    /// Whether the endpoint is listed (and effective) in `disabledApis`
    pub fn is_disabled(&self, endpoint: &str) -> bool {
        self.settings.disabled_apis.get(endpoint).copied().unwrap_or(false)
    }

    /// Success TTL: disabled list first, then the override table, then the default
    pub fn resolve(&self, endpoint: &str) -> TtlDecision {
        if self.is_disabled(endpoint) {
            return TtlDecision::Disabled;
        }

        let ttl = self
            .settings
            .overwrite_ttl
            .get(endpoint)
            .copied()
            .unwrap_or(self.settings.ttl);

        TtlDecision::Ttl(ttl)
    }

    /// Error TTL, `None` when caching is switched off
    ///
    /// Overrides never apply to failures.
    pub fn resolve_error(&self) -> Option<Duration> {
        self.settings.is_enabled.then_some(self.settings.error_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH: &str = "/youtube/v3/search";

    fn settings() -> CacheSettings {
        CacheSettings {
            is_enabled: true,
            ttl: Duration::from_secs(300),
            error_ttl: Duration::from_secs(10),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_ttl() {
        let policy = TtlPolicy::new(settings());
        assert_eq!(policy.resolve(SEARCH), TtlDecision::Ttl(Duration::from_secs(300)));
    }

    #[test]
    fn test_override_beats_default() {
        let mut s = settings();
        s.overwrite_ttl.insert(SEARCH.to_string(), Duration::from_secs(60));
        let policy = TtlPolicy::new(s);

        assert_eq!(policy.resolve(SEARCH).ttl(), Some(Duration::from_secs(60)));
        assert_eq!(policy.resolve("/youtube/v3/videos").ttl(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_disabled_beats_override() {
        let mut s = settings();
        s.overwrite_ttl.insert(SEARCH.to_string(), Duration::from_secs(60));
        s.disabled_apis.insert(SEARCH.to_string(), true);
        let policy = TtlPolicy::new(s);

        assert!(policy.resolve(SEARCH).is_disabled());
        assert_eq!(policy.resolve(SEARCH).ttl(), None);
    }

    #[test]
    fn test_disabled_entry_set_to_false_is_ignored() {
        let mut s = settings();
        s.disabled_apis.insert(SEARCH.to_string(), false);
        let policy = TtlPolicy::new(s);

        assert!(!policy.is_disabled(SEARCH));
        assert!(!policy.resolve(SEARCH).is_disabled());
    }

    #[test]
    fn test_error_ttl_ignores_overrides() {
        let mut s = settings();
        s.overwrite_ttl.insert(SEARCH.to_string(), Duration::from_secs(3600));
        let policy = TtlPolicy::new(s);

        assert_eq!(policy.resolve_error(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_error_ttl_requires_enabled_cache() {
        let mut s = settings();
        s.is_enabled = false;
        assert_eq!(TtlPolicy::new(s).resolve_error(), None);
    }
}
