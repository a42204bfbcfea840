//! Clock - monotonic time source for rate limiting and message stamps
//!
//! **App Start Relative Time Pattern**:
//! - Uses monotonic time anchored to application start
//! - Unaffected by system clock changes (NTP, manual adjustments)
//!
//! Tests substitute [`ManualScheduler`](crate::scheduler::ManualScheduler),
//! which also implements [`Clock`] over virtual time.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Global anchor point for monotonic time
static APP_START: OnceLock<Instant> = OnceLock::new();

/// Time source
pub trait Clock: Send + Sync {
    /// Monotonic time since an arbitrary, fixed origin
    fn now(&self) -> Duration;
}

/// Monotonic clock anchored to the first access in this process
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        APP_START.get_or_init(Instant::now).elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_monotonic_clock_never_decreases() {
        let clock = MonotonicClock;
        let mut last = clock.now();
        for _ in 0..50 {
            thread::sleep(Duration::from_micros(100));
            let current = clock.now();
            assert!(current >= last, "current={current:?}, last={last:?}");
            last = current;
        }
    }
}
