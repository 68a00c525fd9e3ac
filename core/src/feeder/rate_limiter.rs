//! Pool-wide request rate limiting

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::num::NonZeroU32;
use tokio_util::sync::CancellationToken;

/// Token-bucket rate limiter via the governor crate
///
/// The feeder owns one instance per run, so the limit applies to the whole
/// pool rather than to each worker.
pub struct RequestRateLimiter {
    limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    rate_limit: Option<f64>,
}

impl RequestRateLimiter {
    /// Create a new rate limiter
    ///
    /// `None`, zero and negative values disable limiting. Fractional rates
    /// are rounded up to the next whole request per second.
    ///
    /// # Examples
    /// ```
    /// use stress_bench_core::feeder::RequestRateLimiter;
    ///
    /// let limited = RequestRateLimiter::new(Some(100.0));
    /// assert!(limited.is_enabled());
    ///
    /// let unlimited = RequestRateLimiter::new(None);
    /// assert!(!unlimited.is_enabled());
    /// ```
    pub fn new(rate_limit: Option<f64>) -> Self {
        let limiter = rate_limit.and_then(|rps| {
            if !rps.is_finite() || rps <= 0.0 {
                return None;
            }
            let rps_int = (rps.ceil().min(u32::MAX as f64) as u32).max(1);
            let quota = Quota::per_second(NonZeroU32::new(rps_int)?);
            Some(RateLimiter::direct(quota))
        });

        Self {
            limiter,
            rate_limit,
        }
    }

    /// Create an unlimited rate limiter
    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// Wait for a permit
    ///
    /// Returns `false` if `cancel` fired before a permit was available.
    pub async fn acquire(&self, cancel: &CancellationToken) -> bool {
        let Some(limiter) = &self.limiter else {
            return !cancel.is_cancelled();
        };

        tokio::select! {
            biased;

            _ = cancel.cancelled() => false,
            _ = limiter.until_ready() => true,
        }
    }

    /// Try to take a permit without waiting
    pub fn try_acquire(&self) -> bool {
        match &self.limiter {
            Some(limiter) => limiter.check().is_ok(),
            None => true,
        }
    }

    /// Check if rate limiting is enabled
    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    /// Get the configured rate limit (requests per second)
    pub fn rate_limit(&self) -> Option<f64> {
        self.rate_limit
    }
}

impl Default for RequestRateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl std::fmt::Debug for RequestRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRateLimiter")
            .field("rate_limit", &self.rate_limit)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_rate_limiter_disabled() {
        let limiter = RequestRateLimiter::new(None);
        assert!(!limiter.is_enabled());
        assert!(limiter.rate_limit().is_none());
        assert!(limiter.try_acquire());
    }

    #[test]
    fn test_rate_limiter_rejects_non_positive() {
        assert!(!RequestRateLimiter::new(Some(0.0)).is_enabled());
        assert!(!RequestRateLimiter::new(Some(-10.0)).is_enabled());
        assert!(!RequestRateLimiter::new(Some(f64::INFINITY)).is_enabled());
    }

    #[test]
    fn test_rate_limiter_fractional_rounds_up() {
        let limiter = RequestRateLimiter::new(Some(0.5));
        assert!(limiter.is_enabled());
        assert_eq!(limiter.rate_limit(), Some(0.5));
    }

    #[tokio::test]
    async fn test_acquire_unlimited_respects_cancel() {
        let limiter = RequestRateLimiter::unlimited();
        let cancel = CancellationToken::new();
        assert!(limiter.acquire(&cancel).await);

        cancel.cancel();
        assert!(!limiter.acquire(&cancel).await);
    }

    #[tokio::test]
    async fn test_acquire_paces_requests() {
        // 20 rps: the burst of 20 is free, the next few are spaced ~50ms apart
        let limiter = RequestRateLimiter::new(Some(20.0));
        let cancel = CancellationToken::new();
        for _ in 0..20 {
            assert!(limiter.try_acquire());
        }

        let start = Instant::now();
        for _ in 0..2 {
            assert!(limiter.acquire(&cancel).await);
        }
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_acquire_cancelled_while_waiting() {
        let limiter = RequestRateLimiter::new(Some(1.0));
        let cancel = CancellationToken::new();
        assert!(limiter.try_acquire());

        let waiter = {
            let cancel = cancel.clone();
            tokio::spawn(async move { limiter.acquire(&cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        assert!(!waiter.await.unwrap());
    }

    #[test]
    fn test_rate_limiter_debug() {
        let limiter = RequestRateLimiter::new(Some(100.0));
        let debug = format!("{:?}", limiter);
        assert!(debug.contains("RequestRateLimiter"));
        assert!(debug.contains("100.0"));
        assert!(debug.contains("true"));
    }
}
