// src/services/rate_limit.rs

//! Client-side API throttling.
//!
//! Planning Center enforces a quota per 20-second window. Instead of a token
//! bucket, the limiter compares the running call count against the elapsed
//! time since it was created and sleeps off any excess before each call.
//! A 429 response is retried after a fixed cooldown, indefinitely.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::RateLimitConfig;

/// Delay needed to bring `total_calls / elapsed_secs` back to `threshold`.
///
/// Returns `None` when the current rate is at or under the threshold, or
/// when the inputs do not describe a usable rate.
pub fn throttle_delay(total_calls: u64, elapsed_secs: f64, threshold: f64) -> Option<Duration> {
    if !threshold.is_finite() || !elapsed_secs.is_finite() || elapsed_secs <= 0.0 || threshold <= 0.0 {
        return None;
    }

    let rate = total_calls as f64 / elapsed_secs;
    if rate <= threshold {
        return None;
    }

    let excess = total_calls as f64 - threshold * elapsed_secs;
    Duration::try_from_secs_f64(excess / threshold).ok()
}

/// Call-rate limiter shared by every request of one export run.
#[derive(Debug)]
pub struct RateLimiter {
    threshold: f64,
    cooldown: Duration,
    started: Instant,
    calls: AtomicU64,
}

impl RateLimiter {
    /// Create a limiter allowing `threshold` calls per second on average.
    pub fn new(threshold: f64, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            started: Instant::now(),
            calls: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.threshold(), config.cooldown())
    }

    /// Calls attempted so far, retries included.
    pub fn total_calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Count one call and sleep if the running rate is over the threshold.
    async fn pace(&self) {
        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let elapsed = self.started.elapsed().as_secs_f64();
        log::trace!("API calls per second: {:.2}", calls as f64 / elapsed.max(f64::EPSILON));

        if let Some(delay) = throttle_delay(calls, elapsed, self.threshold) {
            log::debug!("Throttling for {:.2}s ({} calls in {:.1}s)", delay.as_secs_f64(), calls, elapsed);
            tokio::time::sleep(delay).await;
        }
    }

    /// Run `op` under the limiter, retrying whenever `is_rate_limited`
    /// accepts the error. Any other error is returned as-is.
    pub async fn call_with<T, E, F, Fut, P>(&self, mut op: F, is_rate_limited: P) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        loop {
            self.pace().await;
            match op().await {
                Err(e) if is_rate_limited(&e) => {
                    log::warn!("Rate limited, retrying in {}s", self.cooldown.as_secs_f64());
                    tokio::time::sleep(self.cooldown).await;
                }
                other => return other,
            }
        }
    }

    /// [`call_with`](Self::call_with) using HTTP 429 as the retry signal.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.call_with(op, AppError::is_rate_limited).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_throttle_arithmetic() {
        let delay = throttle_delay(20, 4.0, 4.0).unwrap();
        assert!((delay.as_secs_f64() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_delay_under_threshold() {
        assert_eq!(throttle_delay(16, 4.0, 4.0), None);
        assert_eq!(throttle_delay(3, 4.0, 4.0), None);
    }

    #[test]
    fn test_no_delay_without_elapsed_time() {
        assert_eq!(throttle_delay(100, 0.0, 4.0), None);
    }

    #[test]
    fn test_no_delay_for_unusable_threshold() {
        assert_eq!(throttle_delay(100, 1.0, f64::NAN), None);
        assert_eq!(throttle_delay(100, 1.0, f64::INFINITY), None);
        assert_eq!(throttle_delay(100, f64::NAN, 4.0), None);
        assert_eq!(throttle_delay(u64::MAX, 1.0, f64::MIN_POSITIVE), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_rate_limited_calls() {
        let limiter = RateLimiter::new(1000.0, Duration::from_secs(5));
        let attempts = AtomicUsize::new(0);
        let start = Instant::now();

        let result = limiter
            .call(|| async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(AppError::RateLimited {
                        url: "fake".to_string(),
                    })
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(limiter.total_calls(), 3);
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let limiter = RateLimiter::new(1000.0, Duration::from_secs(5));
        let attempts = AtomicUsize::new(0);

        let result: Result<()> = limiter
            .call(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(AppError::Status {
                    status: 404,
                    url: "fake".to_string(),
                    body: String::new(),
                })
            })
            .await;

        assert!(matches!(result, Err(AppError::Status { status: 404, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paces_calls_to_threshold() {
        let limiter = RateLimiter::new(1.0, Duration::from_secs(5));
        let start = limiter.started;
        tokio::time::advance(Duration::from_secs(1)).await;

        for _ in 0..3 {
            limiter.call(|| async { Ok(()) }).await.unwrap();
        }

        // Three calls at one per second cannot finish before t = 3s.
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_predicate() {
        let limiter = RateLimiter::new(1000.0, Duration::from_millis(10));
        let attempts = AtomicUsize::new(0);

        let result: std::result::Result<&str, &str> = limiter
            .call_with(
                || async {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err("busy")
                    } else {
                        Ok("done")
                    }
                },
                |e| *e == "busy",
            )
            .await;

        assert_eq!(result, Ok("done"));
    }
}
