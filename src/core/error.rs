//! # Error Handling Module
//!
//! This module defines every error the relay can surface to an HTTP caller or to the
//! process bootstrap, built on top of the `thiserror` crate.
//!
//! ## Error Categories
//! - **Configuration**: invalid or missing configuration, fatal at startup
//! - **InvalidArgument**: bad query parameters or empty cache key components
//! - **AuthorizationDenied**: an identifier failed the whitelist check
//! - **Upstream**: the video catalog API call failed
//! - **Internal**: anything the caller cannot fix (key derivation, encoding)
//! - **Json**: a payload that could not be serialized
//!
//! Every variant maps to an HTTP status through [`RelayError::status_code`] and renders
//! as `{"error": "<message>"}` through its `IntoResponse` implementation, which is the
//! same body the relay stores in the cache for failed requests.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main result type used throughout the relay
pub type RelayResult<T> = Result<T, RelayError>;

/// Error types for the relay
#[derive(Debug, Error, Clone)]
pub enum RelayError {
    /// Configuration-related errors (invalid config, missing sections, etc.)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Request validation errors (missing `part`, unparsable query, etc.)
    #[error("{message}")]
    InvalidArgument { message: String },

    /// Whitelist check failed for one of the request identifiers
    #[error("{reason}")]
    AuthorizationDenied { reason: String },

    /// The upstream video catalog returned an error or could not be reached
    #[error("{message}")]
    Upstream { message: String },

    /// Internal server errors for unexpected failures
    #[error("Internal server error: {message}")]
    Internal { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },
}

impl RelayError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an invalid argument error with a custom message
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an authorization denied error with a custom reason
    pub fn denied<S: Into<String>>(reason: S) -> Self {
        Self::AuthorizationDenied {
            reason: reason.into(),
        }
    }

    /// Create an upstream error with a custom message
    pub fn upstream<S: Into<String>>(message: S) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the HTTP status code returned to clients for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            Self::AuthorizationDenied { .. } => StatusCode::FORBIDDEN,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Json { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a string representation of the error type for logs and metrics labels
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::AuthorizationDenied { .. } => "authorization_denied",
            Self::Upstream { .. } => "upstream_error",
            Self::Internal { .. } => "internal_error",
            Self::Json { .. } => "json_error",
        }
    }

    /// JSON body sent to clients, `{"error": "<message>"}`
    pub fn body(&self) -> serde_json::Value {
        json!({ "error": self.to_string() })
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

/// Convenience macro for creating internal errors
///
/// Usage: `internal_error!("Failed to encode response for {}", uri)`
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::core::error::RelayError::internal(format!($($arg)*))
    };
}

/// Convenience macro for creating configuration errors
///
/// Usage: `config_error!("Invalid port: {}", port)`
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::core::error::RelayError::config(format!($($arg)*))
    };
}
