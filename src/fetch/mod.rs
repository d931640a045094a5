// src/fetch/mod.rs

//! Fault-tolerant content acquisition.
//!
//! A [`FetchCoordinator`] acquires raw HTML for a URL through two transports
//! (lightweight HTTP and full browser rendering). Each transport is guarded
//! by its own circuit breaker and retry executor; the coordinator applies
//! rate limiting and falls back to the other transport when the primary
//! attempt sequence fails.

mod browser;
mod circuit;
mod coordinator;
mod rate_limit;
mod retry;
mod transport;

use std::time::Duration;

pub use browser::BrowserTransport;
pub use circuit::{BreakerStatus, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use coordinator::{FetchCoordinator, FetchStats};
pub use rate_limit::RateLimiter;
pub use retry::{Retried, RetryExecutor, RetryPolicy};
pub use transport::{HttpTransport, Transport, TransportKind};

/// A single logical fetch request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Absolute URL to acquire
    pub url: String,

    /// Force a specific transport instead of the host heuristic
    pub transport: Option<TransportKind>,

    /// CSS selector to wait for before reading rendered content (best effort)
    pub wait_selector: Option<String>,

    /// Per-request timeout override
    pub timeout_override: Option<Duration>,
}

impl FetchRequest {
    /// Create a request with defaults for everything but the URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            transport: None,
            wait_selector: None,
            timeout_override: None,
        }
    }

    /// Force a specific transport.
    pub fn via(mut self, transport: TransportKind) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Wait for a selector during rendering before reading content.
    pub fn wait_for(mut self, selector: impl Into<String>) -> Self {
        self.wait_selector = Some(selector.into());
        self
    }
}

/// Outcome of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Raw page content
    pub content: String,

    /// Transport that produced the content
    pub transport: TransportKind,

    /// Attempts consumed by the successful attempt sequence
    pub attempts: u32,

    /// Wall-clock time for the whole logical fetch
    pub elapsed: Duration,
}
