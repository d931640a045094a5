// src/fetch/circuit.rs

//! Circuit breaker per failure domain.
//!
//! Stops invoking a consistently failing transport once failures reach a
//! threshold, and probes for recovery after a cooldown.
//!
//! ## State transitions
//!
//! ```text
//! Closed    → Open:     failure_count reaches failure_threshold
//! Open      → HalfOpen: cooldown elapsed since the last failure
//! HalfOpen  → Closed:   probe succeeds
//! HalfOpen  → Open:     probe fails (cooldown restarts from the new failure)
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::FetchError;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, calls pass through
    Closed,
    /// Failing fast, calls are rejected without invoking the operation
    Open,
    /// Cooldown elapsed, probing for recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive qualifying failures before the circuit opens
    pub failure_threshold: u32,
    /// How long the circuit stays open before a recovery probe
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(300),
        }
    }
}

/// Observability snapshot.
#[derive(Debug, Clone, Copy)]
pub struct BreakerStatus {
    pub state: CircuitState,
    pub failure_count: u32,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// Circuit breaker shared by every caller of one failure domain.
///
/// State transitions run under a mutex so concurrent outcomes never
/// undercount failures; the lock is never held across an await point.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
        }
    }

    /// Invoke `op` under the breaker.
    ///
    /// Open circuit with an unexpired cooldown rejects the call with
    /// [`FetchError::CircuitOpen`] without invoking `op`. Errors outside
    /// the breaker's filter propagate without touching its state.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        self.admit()?;
        match op().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(error) => {
                if error.counts_toward_breaker() {
                    self.on_failure();
                }
                Err(error)
            }
        }
    }

    /// Current state and failure count.
    pub fn status(&self) -> BreakerStatus {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        BreakerStatus {
            state: inner.state,
            failure_count: inner.failure_count,
        }
    }

    /// Admission check; may transition Open → HalfOpen.
    fn admit(&self) -> Result<(), FetchError> {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let since = inner
            .last_failure
            .map(|at| at.elapsed())
            .unwrap_or(self.config.cooldown);

        if since >= self.config.cooldown {
            inner.state = CircuitState::HalfOpen;
            inner.failure_count = 0;
            log::info!("Circuit '{}' half-open, probing for recovery", self.name);
            Ok(())
        } else {
            Err(FetchError::CircuitOpen { since })
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if inner.state != CircuitState::Closed {
            log::info!("Circuit '{}' closed after successful probe", self.name);
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.last_failure = None;
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());

        let opens = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.failure_count >= self.config.failure_threshold,
            CircuitState::Open => false,
        };

        if opens {
            inner.state = CircuitState::Open;
            log::warn!(
                "Circuit '{}' opened after {} failures (cooldown {:?})",
                self.name,
                inner.failure_count,
                self.config.cooldown
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn breaker(threshold: u32, cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                cooldown,
            },
        )
    }

    async fn fail(cb: &CircuitBreaker) -> Result<(), FetchError> {
        cb.call(|| async { Err(FetchError::Connect("refused".into())) })
            .await
    }

    #[tokio::test]
    async fn test_opens_exactly_at_threshold() {
        let cb = breaker(3, Duration::from_secs(60));

        for _ in 0..2 {
            let _ = fail(&cb).await;
        }
        assert_eq!(cb.status().state, CircuitState::Closed);
        assert_eq!(cb.status().failure_count, 2);

        let _ = fail(&cb).await;
        assert_eq!(cb.status().state, CircuitState::Open);
        assert_eq!(cb.status().failure_count, 3);
    }

    #[tokio::test]
    async fn test_open_rejects_without_invoking() {
        let cb = breaker(1, Duration::from_secs(60));
        let _ = fail(&cb).await;
        assert_eq!(cb.status().state, CircuitState::Open);

        let calls = AtomicU32::new(0);
        let result = cb
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, FetchError>(())
            })
            .await;
        assert!(matches!(result.unwrap_err(), FetchError::CircuitOpen { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cooldown_probe_invokes_once_and_closes() {
        let cb = breaker(1, Duration::from_millis(20));
        let _ = fail(&cb).await;
        assert_eq!(cb.status().state, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;

        let calls = AtomicU32::new(0);
        let result = cb
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, FetchError>("recovered")
            })
            .await;
        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cb.status().state, CircuitState::Closed);
        assert_eq!(cb.status().failure_count, 0);
    }

    #[tokio::test]
    async fn test_failed_probe_reopens() {
        let cb = breaker(1, Duration::from_millis(20));
        let _ = fail(&cb).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let _ = fail(&cb).await;
        assert_eq!(cb.status().state, CircuitState::Open);

        // Cooldown restarted from the probe failure.
        let result = cb.call(|| async { Ok::<_, FetchError>(()) }).await;
        assert!(matches!(result.unwrap_err(), FetchError::CircuitOpen { .. }));
    }

    #[tokio::test]
    async fn test_success_resets_counter() {
        let cb = breaker(3, Duration::from_secs(60));
        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        let _ = cb.call(|| async { Ok::<_, FetchError>(()) }).await;
        assert_eq!(cb.status().failure_count, 0);

        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        assert_eq!(cb.status().state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_filtered_errors_do_not_count() {
        let cb = breaker(1, Duration::from_secs(60));
        let result = cb
            .call(|| async { Err::<(), _>(FetchError::Status { code: 404 }) })
            .await;
        assert!(result.is_err());
        assert_eq!(cb.status().state, CircuitState::Closed);
        assert_eq!(cb.status().failure_count, 0);
    }

    #[tokio::test]
    async fn test_concurrent_failures_are_counted_exactly() {
        let cb = Arc::new(breaker(5, Duration::from_secs(60)));
        let invoked = Arc::new(AtomicU32::new(0));

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let cb = Arc::clone(&cb);
                let invoked = Arc::clone(&invoked);
                tokio::spawn(async move {
                    cb.call(|| async {
                        invoked.fetch_add(1, Ordering::SeqCst);
                        // Hold the operation open so every task is admitted
                        // before any outcome lands.
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err::<(), _>(FetchError::Connect("refused".into()))
                    })
                    .await
                })
            })
            .collect();

        for task in tasks {
            let _ = task.await.unwrap();
        }

        assert_eq!(invoked.load(Ordering::SeqCst), 5);
        let status = cb.status();
        assert_eq!(status.failure_count, 5);
        assert_eq!(status.state, CircuitState::Open);
    }
}
