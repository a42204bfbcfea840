//! Transient send rate limiter

use std::time::Duration;

/// Allows at most one acquisition per `min_interval`.
///
/// Time is supplied by the caller so the limiter stays clock-agnostic.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last: Option<Duration>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Whether an acquisition at `now` would succeed, without consuming it.
    pub fn would_allow(&self, now: Duration) -> bool {
        match self.last {
            None => true,
            // A clock that went backwards counts as "too soon".
            Some(last) => now >= last && now - last >= self.min_interval,
        }
    }

    /// Consume a slot if one is available at `now`.
    pub fn try_acquire(&mut self, now: Duration) -> bool {
        if self.would_allow(now) {
            self.last = Some(now);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_first_acquire_always_succeeds() {
        let mut limiter = RateLimiter::new(ms(500));
        assert!(limiter.try_acquire(ms(0)));
    }

    #[test]
    fn test_interval_enforced() {
        let mut limiter = RateLimiter::new(ms(500));
        assert!(limiter.try_acquire(ms(1000)));
        assert!(!limiter.try_acquire(ms(1200)));
        assert!(!limiter.try_acquire(ms(1499)));
        assert!(limiter.try_acquire(ms(1500)));
    }

    #[test]
    fn test_rejected_attempt_does_not_consume() {
        let mut limiter = RateLimiter::new(ms(500));
        assert!(limiter.try_acquire(ms(0)));
        assert!(!limiter.try_acquire(ms(400)));
        // 400ms 的失败尝试不应推迟窗口
        assert!(limiter.try_acquire(ms(500)));
    }

    #[test]
    fn test_backwards_time_rejected() {
        let mut limiter = RateLimiter::new(ms(500));
        assert!(limiter.try_acquire(ms(2000)));
        assert!(!limiter.would_allow(ms(100)));
    }

    #[test]
    fn test_reset() {
        let mut limiter = RateLimiter::new(ms(500));
        assert!(limiter.try_acquire(ms(0)));
        limiter.reset();
        assert!(limiter.try_acquire(ms(1)));
    }
}
