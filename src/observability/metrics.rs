//! # Metrics
//!
//! Counters recorded by the admission gate, and the optional Prometheus exporter
//! rendering them on the metrics route.
//!
//! | Counter                               | Labels                |
//! |---------------------------------------|-----------------------|
//! | `relay_cache_hits_total`              |                       |
//! | `relay_cache_misses_total`            |                       |
//! | `relay_cache_backend_errors_total`    | `operation`           |
//! | `relay_cache_writes_total`            | `outcome`             |
//! | `relay_upstream_requests_total`       | `endpoint`, `outcome` |
//! | `relay_whitelist_denied_total`        | `endpoint`            |
//!
//! Without an installed recorder every call is a no-op.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

use crate::relay::Endpoint;

/// Errors that can occur during metrics setup
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to initialize metrics exporter: {0}")]
    InitializationError(String),
}

/// Handle of the process-wide Prometheus recorder
#[derive(Clone)]
pub struct MetricsExporter {
    handle: PrometheusHandle,
}

impl MetricsExporter {
    /// Install the Prometheus recorder as the global recorder
    pub fn install() -> Result<Self, MetricsError> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| MetricsError::InitializationError(e.to_string()))?;

        Ok(Self { handle })
    }

    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// Prometheus text exposition of every recorded metric
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

pub fn record_cache_hit() {
    metrics::counter!("relay_cache_hits_total").increment(1);
}

pub fn record_cache_miss() {
    metrics::counter!("relay_cache_misses_total").increment(1);
}

/// A store call failed for a reason other than a miss
pub fn record_backend_error(operation: &'static str) {
    metrics::counter!("relay_cache_backend_errors_total", "operation" => operation).increment(1);
}

pub fn record_cache_write(stored: bool) {
    let outcome = if stored { "stored" } else { "failed" };
    metrics::counter!("relay_cache_writes_total", "outcome" => outcome).increment(1);
}

pub fn record_upstream_request(endpoint: Endpoint, success: bool) {
    let outcome = if success { "success" } else { "error" };
    metrics::counter!(
        "relay_upstream_requests_total",
        "endpoint" => endpoint.resource(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_whitelist_denied(endpoint: Endpoint) {
    metrics::counter!("relay_whitelist_denied_total", "endpoint" => endpoint.resource()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_rendered() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let exporter = MetricsExporter::from_handle(recorder.handle());

        metrics::with_local_recorder(&recorder, || {
            record_cache_hit();
            record_cache_hit();
            record_cache_miss();
            record_cache_write(true);
            record_upstream_request(Endpoint::Search, false);
            record_whitelist_denied(Endpoint::PlaylistItems);
        });

        let rendered = exporter.render();
        assert!(rendered.contains("relay_cache_hits_total 2"), "{}", rendered);
        assert!(rendered.contains("relay_cache_misses_total 1"));
        assert!(rendered.contains(r#"relay_cache_writes_total{outcome="stored"} 1"#));
        assert!(rendered.contains("relay_upstream_requests_total"));
        assert!(rendered.contains(r#"endpoint="search""#));
        assert!(rendered.contains(r#"relay_whitelist_denied_total{endpoint="playlistItems"} 1"#));
    }

    #[test]
    fn test_recording_without_recorder_is_a_noop() {
        record_backend_error("get");
        record_cache_write(false);
    }
}
