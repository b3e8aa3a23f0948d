use std::thread;
use std::time::{Duration, Instant};

/// Time source for the regulation period, divider settle delays and the
/// bus clock-stretch budget.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Time left of a `window` opened at `since`; zero once it has passed.
    fn remaining(&self, since: Instant, window: Duration) -> Duration {
        window.saturating_sub(self.now().saturating_duration_since(since))
    }
}

/// Wall-clock implementation over `std::time::Instant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            thread::sleep(d);
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_clock {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Simulated clock: `sleep` moves time forward instantly. Clones share
    /// the same timeline, so a test can keep one and hand another to the board.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        slept: Arc<Mutex<Duration>>,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                slept: Arc::new(Mutex::new(Duration::ZERO)),
            }
        }

        pub fn advance(&self, d: Duration) {
            if let Ok(mut slept) = self.slept.lock() {
                *slept = slept.saturating_add(d);
            }
        }

        /// Total simulated time so far.
        pub fn elapsed(&self) -> Duration {
            self.slept.lock().map(|g| *g).unwrap_or(Duration::ZERO)
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.origin + self.elapsed()
        }

        fn sleep(&self, d: Duration) {
            self.advance(d);
        }
    }

    #[test]
    fn sleep_advances_shared_timeline() {
        let clock = TestClock::new();
        let board_side = clock.clone();
        let start = clock.now();
        board_side.sleep(Duration::from_secs(4));
        clock.advance(Duration::from_millis(10));
        assert_eq!(board_side.elapsed(), Duration::from_millis(4010));
        assert_eq!(clock.remaining(start, Duration::from_secs(5)), Duration::from_millis(990));
        assert_eq!(clock.remaining(start, Duration::from_secs(1)), Duration::ZERO);
    }
}
