// src/fetch/retry.rs

//! Bounded retries with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::error::FetchError;

/// Immutable retry policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Multiplier applied per attempt
    pub backoff_factor: f64,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Randomize each delay into [0.5, 1.5) of its base value
    pub jitter: bool,
    /// Mandated sleep for HTTP 429 without a Retry-After header
    pub rate_limit_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            backoff_factor: config.backoff_factor,
            max_delay: Duration::from_secs(config.max_delay_secs),
            jitter: config.jitter,
            rate_limit_backoff: Duration::from_secs(config.rate_limit_backoff_secs),
        }
    }

    /// Backoff delay after the given attempt (1-based).
    ///
    /// `delay = min(initial × factor^(attempt-1) × j, max)` with
    /// `j ∈ [0.5, 1.5)` when jitter is enabled.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let base = self.initial_delay.mul_f64(self.backoff_factor.powi(exponent));
        let jittered = if self.jitter {
            base.mul_f64(0.5 + fastrand::f64())
        } else {
            base
        };
        jittered.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// A successful value plus the attempts it took to produce it.
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Executes a fallible operation under a [`RetryPolicy`].
///
/// Holds no state between invocations; a single executor is safely shared
/// by concurrent callers.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self { policy, cancel }
    }

    /// Run `op` until it succeeds, a non-retryable error surfaces, or
    /// `max_attempts` is reached.
    ///
    /// Fatal errors and errors outside the retryable set re-raise
    /// immediately. A rate-limit error first pays the server-mandated
    /// Retry-After sleep (or the policy default) before the backoff delay;
    /// the attempt still counts toward `max_attempts`. Exhaustion yields
    /// [`FetchError::RetryExhausted`] wrapping the last underlying error.
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<Retried<T>, FetchError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut last_error: Option<FetchError> = None;

        for attempt in 1..=self.policy.max_attempts {
            match op(attempt).await {
                Ok(value) => return Ok(Retried { value, attempts: attempt }),
                Err(error) => {
                    if error.is_fatal() || !error.is_retryable() {
                        return Err(error);
                    }

                    if attempt == self.policy.max_attempts {
                        log::warn!("Final attempt {attempt} failed: {error}");
                        last_error = Some(error);
                        break;
                    }

                    // 429 mandates its own sleep before the regular backoff.
                    if let FetchError::RateLimited { retry_after } = &error {
                        let mandated = retry_after.unwrap_or(self.policy.rate_limit_backoff);
                        log::warn!("Rate limited. Waiting {:.2}s...", mandated.as_secs_f64());
                        self.sleep(mandated).await?;
                    }

                    let delay = self.policy.delay(attempt);
                    log::warn!(
                        "Attempt {attempt} failed: {error}. Retrying in {:.2}s...",
                        delay.as_secs_f64()
                    );
                    self.sleep(delay).await?;
                    last_error = Some(error);
                }
            }
        }

        let last = last_error.unwrap_or(FetchError::Connect("no attempts executed".into()));
        Err(FetchError::RetryExhausted {
            attempts: self.policy.max_attempts,
            last: Box::new(last),
        })
    }

    /// Sleep that aborts promptly on shutdown.
    async fn sleep(&self, duration: Duration) -> Result<(), FetchError> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
        }
    }
}
