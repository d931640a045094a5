// src/fetch/rate_limit.rs

//! Per-call rate limiting with jitter and an adaptive penalty.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::config::FetchConfig;
use crate::error::FetchError;

#[derive(Debug)]
struct RateState {
    request_count: u64,
    started: Instant,
}

/// Delays callers before each transport attempt.
///
/// Applies the configured base delay (jittered ±50%), then, while the
/// observed request rate is above the threshold, sleeps in penalty steps
/// until the rate subsides. Rates are computed from a monotonic clock.
#[derive(Debug)]
pub struct RateLimiter {
    request_delay: Duration,
    max_rate_per_sec: f64,
    penalty: Duration,
    state: Mutex<RateState>,
    cancel: CancellationToken,
}

impl RateLimiter {
    pub fn new(
        request_delay: Duration,
        max_rate_per_sec: f64,
        penalty: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            request_delay,
            max_rate_per_sec,
            penalty,
            state: Mutex::new(RateState {
                request_count: 0,
                started: Instant::now(),
            }),
            cancel,
        }
    }

    pub fn from_config(config: &FetchConfig, cancel: CancellationToken) -> Self {
        Self::new(
            Duration::from_millis(config.request_delay_ms),
            config.max_rate_per_sec,
            Duration::from_millis(config.penalty_ms),
            cancel,
        )
    }

    /// Block until the caller may issue a request.
    pub async fn acquire(&self) -> Result<(), FetchError> {
        {
            let mut state = self.state.lock().expect("rate limiter lock poisoned");
            state.request_count += 1;
        }

        if !self.request_delay.is_zero() {
            let jitter = 0.5 + fastrand::f64();
            self.sleep(self.request_delay.mul_f64(jitter)).await?;
        }

        while self.current_rate() > self.max_rate_per_sec {
            self.sleep(self.penalty).await?;
        }

        Ok(())
    }

    /// Requests admitted since construction.
    pub fn request_count(&self) -> u64 {
        self.state
            .lock()
            .expect("rate limiter lock poisoned")
            .request_count
    }

    fn current_rate(&self) -> f64 {
        let state = self.state.lock().expect("rate limiter lock poisoned");
        let elapsed = state.started.elapsed().as_secs_f64();
        if elapsed <= f64::EPSILON {
            return 0.0;
        }
        state.request_count as f64 / elapsed
    }

    async fn sleep(&self, duration: Duration) -> Result<(), FetchError> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(delay_ms: u64, max_rate: f64) -> RateLimiter {
        RateLimiter::new(
            Duration::from_millis(delay_ms),
            max_rate,
            Duration::from_millis(5),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_counts_requests() {
        let limiter = limiter(0, 1_000_000.0);
        for _ in 0..3 {
            limiter.acquire().await.unwrap();
        }
        assert_eq!(limiter.request_count(), 3);
    }

    #[tokio::test]
    async fn test_base_delay_applied() {
        let limiter = limiter(20, 1_000_000.0);
        let start = Instant::now();
        limiter.acquire().await.unwrap();
        // Jitter keeps the delay within [10ms, 30ms).
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_penalty_until_rate_subsides() {
        let limiter = limiter(0, 50.0);
        let start = Instant::now();
        // A burst well above 50 req/s forces at least one penalty sleep.
        for _ in 0..20 {
            limiter.acquire().await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_delay() {
        let cancel = CancellationToken::new();
        let limiter = RateLimiter::new(
            Duration::from_secs(30),
            1_000_000.0,
            Duration::from_millis(5),
            cancel.clone(),
        );
        cancel.cancel();
        let result = limiter.acquire().await;
        assert!(matches!(result.unwrap_err(), FetchError::Cancelled));
    }
}
