// src/fetch/coordinator.rs

//! Coordinates rate-limited, circuit-protected, retried acquisition with
//! transport fallback.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use url::Url;

use super::circuit::{BreakerStatus, CircuitBreaker, CircuitBreakerConfig};
use super::rate_limit::RateLimiter;
use super::retry::{Retried, RetryExecutor, RetryPolicy};
use super::transport::{HttpTransport, Transport, TransportKind};
use super::{BrowserTransport, FetchRequest, FetchResult};
use crate::config::Config;
use crate::error::{FetchError, Result};

/// A transport plus its own failure-domain guards.
struct Guarded {
    transport: Arc<dyn Transport>,
    breaker: CircuitBreaker,
    retry: RetryExecutor,
}

/// Observability snapshot across both failure domains.
#[derive(Debug, Clone, Copy)]
pub struct FetchStats {
    pub http: BreakerStatus,
    pub browser: BreakerStatus,
    pub requests: u64,
}

/// Acquires raw content for URLs with maximum success probability.
///
/// Each transport keeps its own circuit breaker and retry executor, so a
/// consistently failing transport short-circuits future primary attempts
/// while the other transport keeps serving. A caller never pays for more
/// than the primary retry sequence plus one fallback attempt sequence per
/// logical fetch.
pub struct FetchCoordinator {
    http: Guarded,
    browser: Guarded,
    limiter: RateLimiter,
    rendered_hosts: Vec<String>,
    cancel: CancellationToken,
}

impl FetchCoordinator {
    pub fn new(config: &Config, cancel: CancellationToken) -> Result<Self> {
        let http: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.fetch)?);
        let browser: Arc<dyn Transport> = Arc::new(BrowserTransport::new(&config.fetch));
        Ok(Self::with_transports(
            http,
            browser,
            RetryPolicy::from_config(&config.retry),
            CircuitBreakerConfig {
                failure_threshold: config.breaker.http_failure_threshold,
                cooldown: Duration::from_secs(config.breaker.http_cooldown_secs),
            },
            CircuitBreakerConfig {
                failure_threshold: config.breaker.browser_failure_threshold,
                cooldown: Duration::from_secs(config.breaker.browser_cooldown_secs),
            },
            RateLimiter::from_config(&config.fetch, cancel.clone()),
            config.fetch.rendered_hosts.clone(),
            cancel,
        ))
    }

    /// Assemble a coordinator from explicit parts.
    pub fn with_transports(
        http: Arc<dyn Transport>,
        browser: Arc<dyn Transport>,
        policy: RetryPolicy,
        http_breaker: CircuitBreakerConfig,
        browser_breaker: CircuitBreakerConfig,
        limiter: RateLimiter,
        rendered_hosts: Vec<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            http: Guarded {
                transport: http,
                breaker: CircuitBreaker::new("http", http_breaker),
                retry: RetryExecutor::new(policy.clone(), cancel.clone()),
            },
            browser: Guarded {
                transport: browser,
                breaker: CircuitBreaker::new("browser", browser_breaker),
                retry: RetryExecutor::new(policy, cancel.clone()),
            },
            limiter,
            rendered_hosts,
            cancel,
        }
    }

    /// Acquire raw content for a URL.
    ///
    /// Transport selection honors the request hint, else the host
    /// heuristic. On primary failure (including a circuit-open rejection)
    /// the other transport is attempted once through its own guards; both
    /// failing yields [`FetchError::BothTransportsFailed`].
    pub async fn fetch(&self, request: FetchRequest) -> std::result::Result<FetchResult, FetchError> {
        let start = Instant::now();
        let parsed =
            Url::parse(&request.url).map_err(|_| FetchError::InvalidUrl(request.url.clone()))?;
        let host = parsed.host_str().unwrap_or_default().to_string();

        let primary_kind = request
            .transport
            .unwrap_or_else(|| self.select_transport(&host));
        let (primary, fallback) = self.ordered(primary_kind);
        log::debug!("Using {} transport for {}", primary_kind, request.url);

        match self.attempt(primary, &request).await {
            Ok(retried) => Ok(Self::completed(retried, primary_kind, start)),
            Err(primary_error) if primary_error.is_fatal() => Err(primary_error),
            Err(primary_error) => {
                log::warn!(
                    "{} transport failed for {}: {}. Falling back to {}.",
                    primary_kind,
                    request.url,
                    primary_error,
                    primary_kind.other()
                );
                match self.attempt(fallback, &request).await {
                    Ok(retried) => Ok(Self::completed(retried, primary_kind.other(), start)),
                    Err(fallback_error) => Err(FetchError::BothTransportsFailed {
                        url: request.url.clone(),
                        primary: Box::new(primary_error),
                        fallback: Box::new(fallback_error),
                    }),
                }
            }
        }
    }

    /// Breaker states and request count for observability.
    pub fn stats(&self) -> FetchStats {
        FetchStats {
            http: self.http.breaker.status(),
            browser: self.browser.breaker.status(),
            requests: self.limiter.request_count(),
        }
    }

    /// One full guarded attempt sequence against a single transport.
    async fn attempt(
        &self,
        guarded: &Guarded,
        request: &FetchRequest,
    ) -> std::result::Result<Retried<String>, FetchError> {
        guarded
            .retry
            .execute(|_attempt| {
                let transport = Arc::clone(&guarded.transport);
                let breaker = &guarded.breaker;
                let limiter = &self.limiter;
                let cancel = &self.cancel;
                async move {
                    breaker
                        .call(|| async {
                            limiter.acquire().await?;
                            tokio::select! {
                                result = transport.fetch(request) => result,
                                _ = cancel.cancelled() => Err(FetchError::Cancelled),
                            }
                        })
                        .await
                }
            })
            .await
    }

    fn ordered(&self, primary: TransportKind) -> (&Guarded, &Guarded) {
        match primary {
            TransportKind::Http => (&self.http, &self.browser),
            TransportKind::Browser => (&self.browser, &self.http),
        }
    }

    fn select_transport(&self, host: &str) -> TransportKind {
        if self.rendered_hosts.iter().any(|h| host.contains(h.as_str())) {
            TransportKind::Browser
        } else {
            TransportKind::Http
        }
    }

    fn completed(retried: Retried<String>, transport: TransportKind, start: Instant) -> FetchResult {
        FetchResult {
            content: retried.value,
            transport,
            attempts: retried.attempts,
            elapsed: start.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AlwaysFailing {
        kind: TransportKind,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Transport for AlwaysFailing {
        fn kind(&self) -> TransportKind {
            self.kind
        }
        async fn fetch(&self, _request: &FetchRequest) -> std::result::Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::Connect("refused".into()))
        }
    }

    struct AlwaysOk {
        kind: TransportKind,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Transport for AlwaysOk {
        fn kind(&self) -> TransportKind {
            self.kind
        }
        async fn fetch(&self, _request: &FetchRequest) -> std::result::Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("<html>{}</html>", self.kind))
        }
    }

    struct RateLimitedOnce {
        calls: AtomicU32,
        retry_after: Duration,
    }

    #[async_trait]
    impl Transport for RateLimitedOnce {
        fn kind(&self) -> TransportKind {
            TransportKind::Http
        }
        async fn fetch(&self, _request: &FetchRequest) -> std::result::Result<String, FetchError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(FetchError::RateLimited {
                    retry_after: Some(self.retry_after),
                })
            } else {
                Ok("<html>ok</html>".into())
            }
        }
    }

    fn coordinator(
        http: Arc<dyn Transport>,
        browser: Arc<dyn Transport>,
        max_attempts: u32,
        http_threshold: u32,
    ) -> FetchCoordinator {
        let cancel = CancellationToken::new();
        let policy = RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_millis(5),
            jitter: false,
            rate_limit_backoff: Duration::from_millis(5),
        };
        FetchCoordinator::with_transports(
            http,
            browser,
            policy,
            CircuitBreakerConfig {
                failure_threshold: http_threshold,
                cooldown: Duration::from_secs(60),
            },
            CircuitBreakerConfig {
                failure_threshold: 3,
                cooldown: Duration::from_secs(60),
            },
            RateLimiter::new(
                Duration::ZERO,
                1_000_000.0,
                Duration::from_millis(1),
                cancel.clone(),
            ),
            vec!["rendered.example".into()],
            cancel,
        )
    }

    #[tokio::test]
    async fn test_fallback_activation() {
        let http = Arc::new(AlwaysFailing {
            kind: TransportKind::Http,
            calls: AtomicU32::new(0),
        });
        let browser = Arc::new(AlwaysOk {
            kind: TransportKind::Browser,
            calls: AtomicU32::new(0),
        });
        let coord = coordinator(http.clone(), browser.clone(), 3, 10);

        let result = coord
            .fetch(FetchRequest::new("https://plain.example/portfolio"))
            .await
            .unwrap();

        assert_eq!(result.transport, TransportKind::Browser);
        assert_eq!(http.calls.load(Ordering::SeqCst), 3); // full primary sequence
        assert_eq!(browser.calls.load(Ordering::SeqCst), 1); // one fallback sequence
    }

    #[tokio::test]
    async fn test_both_transports_failing_reports_both_errors() {
        let http = Arc::new(AlwaysFailing {
            kind: TransportKind::Http,
            calls: AtomicU32::new(0),
        });
        let browser = Arc::new(AlwaysFailing {
            kind: TransportKind::Browser,
            calls: AtomicU32::new(0),
        });
        let coord = coordinator(http, browser, 2, 10);

        let err = coord
            .fetch(FetchRequest::new("https://plain.example/"))
            .await
            .unwrap_err();
        match err {
            FetchError::BothTransportsFailed { url, primary, fallback } => {
                assert_eq!(url, "https://plain.example/");
                assert!(matches!(*primary, FetchError::RetryExhausted { .. }));
                assert!(matches!(*fallback, FetchError::RetryExhausted { .. }));
            }
            other => panic!("expected BothTransportsFailed, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limited_then_success() {
        let http = Arc::new(RateLimitedOnce {
            calls: AtomicU32::new(0),
            retry_after: Duration::from_millis(60),
        });
        let browser = Arc::new(AlwaysOk {
            kind: TransportKind::Browser,
            calls: AtomicU32::new(0),
        });
        let coord = coordinator(http.clone(), browser, 3, 10);

        let start = Instant::now();
        let result = coord
            .fetch(FetchRequest::new("https://plain.example/portfolio"))
            .await
            .unwrap();

        assert_eq!(result.attempts, 2);
        assert_eq!(result.transport, TransportKind::Http);
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_before_any_transport() {
        let http = Arc::new(AlwaysOk {
            kind: TransportKind::Http,
            calls: AtomicU32::new(0),
        });
        let browser = Arc::new(AlwaysOk {
            kind: TransportKind::Browser,
            calls: AtomicU32::new(0),
        });
        let coord = coordinator(http.clone(), browser.clone(), 3, 10);

        let err = coord.fetch(FetchRequest::new("not a url")).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
        assert_eq!(http.calls.load(Ordering::SeqCst), 0);
        assert_eq!(browser.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rendered_host_prefers_browser() {
        let http = Arc::new(AlwaysOk {
            kind: TransportKind::Http,
            calls: AtomicU32::new(0),
        });
        let browser = Arc::new(AlwaysOk {
            kind: TransportKind::Browser,
            calls: AtomicU32::new(0),
        });
        let coord = coordinator(http.clone(), browser.clone(), 3, 10);

        let result = coord
            .fetch(FetchRequest::new("https://rendered.example/team"))
            .await
            .unwrap();
        assert_eq!(result.transport, TransportKind::Browser);
        assert_eq!(http.calls.load(Ordering::SeqCst), 0);
        assert_eq!(browser.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_hint_overrides_heuristic() {
        let http = Arc::new(AlwaysOk {
            kind: TransportKind::Http,
            calls: AtomicU32::new(0),
        });
        let browser = Arc::new(AlwaysOk {
            kind: TransportKind::Browser,
            calls: AtomicU32::new(0),
        });
        let coord = coordinator(http.clone(), browser.clone(), 3, 10);

        let result = coord
            .fetch(FetchRequest::new("https://rendered.example/team").via(TransportKind::Http))
            .await
            .unwrap();
        assert_eq!(result.transport, TransportKind::Http);
        assert_eq!(browser.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_open_circuit_short_circuits_primary_across_calls() {
        let http = Arc::new(AlwaysFailing {
            kind: TransportKind::Http,
            calls: AtomicU32::new(0),
        });
        let browser = Arc::new(AlwaysOk {
            kind: TransportKind::Browser,
            calls: AtomicU32::new(0),
        });
        // Threshold 1, one retry attempt: the first fetch opens the circuit.
        let coord = coordinator(http.clone(), browser.clone(), 1, 1);

        let first = coord
            .fetch(FetchRequest::new("https://plain.example/"))
            .await
            .unwrap();
        assert_eq!(first.transport, TransportKind::Browser);
        assert_eq!(http.calls.load(Ordering::SeqCst), 1);

        let second = coord
            .fetch(FetchRequest::new("https://plain.example/"))
            .await
            .unwrap();
        assert_eq!(second.transport, TransportKind::Browser);
        // Circuit open: the failing transport was not invoked again.
        assert_eq!(http.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coord.stats().http.state, super::super::CircuitState::Open);
    }
}
