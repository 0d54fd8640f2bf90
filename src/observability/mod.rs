// Structured logging
pub mod logging;

// Cache and upstream counters, Prometheus exposition
pub mod metrics;

pub use logging::init_logging;
pub use metrics::MetricsExporter;
