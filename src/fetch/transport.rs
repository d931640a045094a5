// src/fetch/transport.rs

//! Transport capability and the lightweight HTTP implementation.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use super::FetchRequest;
use crate::config::FetchConfig;
use crate::error::{FetchError, Result};

/// Which acquisition mechanism produced (or should produce) content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Plain HTTP request
    Http,
    /// Full browser rendering
    Browser,
}

impl TransportKind {
    /// The other transport, used for fallback.
    pub fn other(self) -> Self {
        match self {
            Self::Http => Self::Browser,
            Self::Browser => Self::Http,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Browser => write!(f, "browser"),
        }
    }
}

/// Capability for acquiring raw page content.
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    async fn fetch(&self, request: &FetchRequest) -> std::result::Result<String, FetchError>;
}

/// Lightweight request-based transport.
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| crate::error::AppError::config(format!("HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }

    fn classify(&self, error: reqwest::Error, timeout: Duration) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(timeout)
        } else {
            FetchError::Connect(error.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    async fn fetch(&self, request: &FetchRequest) -> std::result::Result<String, FetchError> {
        let timeout = request.timeout_override.unwrap_or(self.timeout);
        let mut builder = self.client.get(&request.url);
        if request.timeout_override.is_some() {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.classify(e, timeout))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(FetchError::RateLimited { retry_after });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                code: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| self.classify(e, timeout))
    }
}
