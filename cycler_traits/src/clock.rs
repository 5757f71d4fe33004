use std::thread;
use std::time::{Duration, Instant};

/// Monotonic clock abstraction shared by the input, control and display loops.
///
/// - now(): returns a monotonic Instant
/// - sleep(): sleeps for the provided duration (implementations may simulate)
/// - since(): elapsed time from an origin, saturating at zero
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Time elapsed since `origin`, zero if `origin` lies in the future.
    fn since(&self, origin: Instant) -> Duration {
        self.now().saturating_duration_since(origin)
    }

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let ms = self.since(epoch).as_millis();
        (ms.min(u128::from(u64::MAX))) as u64
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, d: Duration) {
        (**self).sleep(d);
    }
}

/// Default, real-time monotonic clock backed by std::time::Instant.
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
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

#[cfg(any(test, feature = "test-clock"))]
pub mod test_clock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Deterministic test clock whose time can be advanced manually.
    ///
    /// now() = origin + offset
    /// sleep(d) advances internal time by d without actually sleeping, unless the
    /// clock was built with [`TestClock::frozen`], in which case sleep only yields.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        offset: Arc<Mutex<Duration>>,
        advance_on_sleep: bool,
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
                offset: Arc::new(Mutex::new(Duration::ZERO)),
                advance_on_sleep: true,
            }
        }

        /// A clock that only moves through `advance`/`set_offset`.
        pub fn frozen() -> Self {
            Self {
                advance_on_sleep: false,
                ..Self::new()
            }
        }

        /// The instant this clock reports at offset zero.
        pub fn origin(&self) -> Instant {
            self.origin
        }

        /// Advance the clock by the given duration.
        pub fn advance(&self, d: Duration) {
            if let Ok(mut off) = self.offset.lock() {
                *off = off.saturating_add(d);
            }
        }

        /// Set the absolute offset relative to origin (useful for tests).
        pub fn set_offset(&self, d: Duration) {
            if let Ok(mut off) = self.offset.lock() {
                *off = d;
            }
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            let off = self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO);
            self.origin + off
        }

        fn sleep(&self, d: Duration) {
            if self.advance_on_sleep {
                self.advance(d);
            } else {
                thread::yield_now();
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn sleep_advances_time() {
            let clock = TestClock::new();
            let t0 = clock.now();
            clock.sleep(Duration::from_millis(250));
            assert_eq!(clock.since(t0), Duration::from_millis(250));
            assert_eq!(clock.ms_since(t0), 250);
        }

        #[test]
        fn frozen_clock_ignores_sleep() {
            let clock = TestClock::frozen();
            let t0 = clock.now();
            clock.sleep(Duration::from_secs(5));
            assert_eq!(clock.since(t0), Duration::ZERO);
            clock.advance(Duration::from_secs(1));
            assert_eq!(clock.since(t0), Duration::from_secs(1));
        }

        #[test]
        fn since_saturates_for_future_origin() {
            let clock = TestClock::frozen();
            let future = clock.now() + Duration::from_secs(3);
            assert_eq!(clock.since(future), Duration::ZERO);
        }
    }
}
