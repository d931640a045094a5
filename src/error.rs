// src/error.rs

//! Unified error handling for the scraper application.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for scraper operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Fetch-layer failure (see [`FetchError`] for the taxonomy)
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Schema migration failed
    #[error("Migration '{filename}' failed: {message}")]
    Migration { filename: String, message: String },

    /// Record extraction error
    #[error("Extraction error for {context}: {message}")]
    Extract { context: String, message: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a migration error.
    pub fn migration(filename: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Migration {
            filename: filename.into(),
            message: message.to_string(),
        }
    }

    /// Create an extraction error with context.
    pub fn extract(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Extract {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

/// Typed fetch-layer failure.
///
/// Callers pattern-match on the variant instead of catching broad error
/// types; classification methods drive the retry and circuit-breaker
/// policies.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection-level failure (DNS, TCP, TLS, body read)
    #[error("connection failed: {0}")]
    Connect(String),

    /// Request exceeded its deadline
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success HTTP status
    #[error("HTTP status {code}")]
    Status { code: u16 },

    /// HTTP 429 with the server-provided Retry-After, when present
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Circuit breaker rejected the call without invoking the transport
    #[error("circuit open ({since:?} since last failure)")]
    CircuitOpen { since: Duration },

    /// Browser rendering failure
    #[error("render failed: {0}")]
    Render(String),

    /// Malformed URL, rejected before any transport call
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    /// Shutdown signal observed during a sleep or in-flight call
    #[error("fetch cancelled")]
    Cancelled,

    /// Retry policy exhausted; wraps the last underlying error
    #[error("gave up after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: Box<FetchError> },

    /// Primary and fallback transports both failed for one logical fetch
    #[error("both transports failed for {url}: primary: {primary}; fallback: {fallback}")]
    BothTransportsFailed {
        url: String,
        primary: Box<FetchError>,
        fallback: Box<FetchError>,
    },
}

impl FetchError {
    /// Errors that must surface immediately, bypassing retries and fallback.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidUrl(_) | Self::Cancelled)
    }

    /// Errors the retry executor is allowed to retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Timeout(_) | Self::RateLimited { .. } | Self::Render(_) => {
                true
            }
            Self::Status { code } => *code >= 500,
            _ => false,
        }
    }

    /// Errors that mutate circuit-breaker state.
    ///
    /// Circuit-open rejections and fatal errors pass through without
    /// affecting the breaker.
    pub fn counts_toward_breaker(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Timeout(_) | Self::RateLimited { .. } | Self::Render(_) => {
                true
            }
            Self::Status { code } => *code >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_retryable() {
        assert!(FetchError::Status { code: 500 }.is_retryable());
        assert!(FetchError::Status { code: 503 }.is_retryable());
        assert!(!FetchError::Status { code: 404 }.is_retryable());
    }

    #[test]
    fn test_fatal_errors_are_not_retryable() {
        let err = FetchError::InvalidUrl("not a url".into());
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
        assert!(!err.counts_toward_breaker());
    }

    #[test]
    fn test_circuit_open_is_not_retryable() {
        let err = FetchError::CircuitOpen {
            since: Duration::from_secs(1),
        };
        assert!(!err.is_retryable());
        assert!(!err.counts_toward_breaker());
    }

    #[test]
    fn test_rate_limit_counts_toward_breaker() {
        let err = FetchError::RateLimited {
            retry_after: Some(Duration::from_secs(5)),
        };
        assert!(err.is_retryable());
        assert!(err.counts_toward_breaker());
    }
}
