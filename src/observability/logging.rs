//! # Structured Logging
//!
//! Installs the global `tracing` subscriber from the `logging` configuration section.
//! `RUST_LOG` directives, when present, take precedence over the configured level.

use std::str::FromStr;

use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::core::config::LoggingConfig;
use crate::core::error::{RelayError, RelayResult};

/// Output encoding of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl FromStr for LogFormat {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            other => Err(crate::config_error!("unknown log format: {}", other)),
        }
    }
}

/// Parse a configured level name
pub fn parse_level(level: &str) -> RelayResult<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(crate::config_error!("unknown log level: {}", other)),
    }
}

/// Filter from `RUST_LOG`, falling back to the configured level
pub fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()))
}

/// Install the global subscriber
///
/// A subscriber that is already installed (tests, embedding) is kept.
pub fn init_logging(config: &LoggingConfig, service: &str) -> RelayResult<()> {
    let level = parse_level(&config.level)?;
    let format: LogFormat = config.format.parse()?;
    let filter = env_filter(level);

    let installed = match format {
        LogFormat::Json => Registry::default()
            .with(filter)
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init(),
        LogFormat::Text => Registry::default()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init(),
    };

    if installed.is_err() {
        warn!("Tracing subscriber already initialized, skipping initialization");
    }

    info!(service = %service, format = ?format, level = %level, "Structured logging initialized");
    Ok(())
}
