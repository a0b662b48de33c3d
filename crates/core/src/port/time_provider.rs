// Time Provider Port (for testability)

use std::time::Instant;

/// Millisecond clock the batching policy measures batch age with
pub trait TimeProvider: Send + Sync {
    /// Current time in milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;
}

/// Production clock: wall-clock start time advanced by a monotonic
/// [`Instant`].
///
/// Readings never go backwards, so a system clock stepped back cannot hold a
/// partial batch past `max_write_delay`.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeProvider {
    origin_millis: i64,
    origin: Instant,
}

impl SystemTimeProvider {
    pub fn new() -> Self {
        Self {
            origin_millis: chrono::Utc::now().timestamp_millis(),
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        let elapsed = i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.origin_millis.saturating_add(elapsed)
    }
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::Duration;

    /// Clock that only moves when told to
    pub struct ManualTimeProvider {
        current_time: AtomicI64,
    }

    impl ManualTimeProvider {
        pub fn new(current_time: i64) -> Self {
            Self {
                current_time: AtomicI64::new(current_time),
            }
        }

        pub fn advance(&self, by: Duration) {
            let millis = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
            self.current_time.fetch_add(millis, Ordering::SeqCst);
        }

        /// Jump to an arbitrary reading, backwards included
        pub fn set(&self, now_millis: i64) {
            self.current_time.store(now_millis, Ordering::SeqCst);
        }
    }

    impl TimeProvider for ManualTimeProvider {
        fn now_millis(&self) -> i64 {
            self.current_time.load(Ordering::SeqCst)
        }
    }
}
