//! # Hub Testing
//!
//! Testing utilities for the hub services.
//!
//! This crate provides:
//! - Deterministic [`Clock`] implementations
//! - A tracing initializer for tests that want log output
//!
//! ## Example
//!
//! ```ignore
//! use hub_testing::{test_clock, ManualClock};
//!
//! #[tokio::test]
//! async fn reservation_expires() {
//!     let clock = ManualClock::starting_at(test_clock().now());
//!     let service = RegistrationService::new(store, env_with(clock.clone()));
//!     // ... reserve seats ...
//!     clock.advance(chrono::Duration::minutes(31));
//!     // ... seats are free again ...
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use hub_core::environment::Clock;

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Duration, Utc};
    use std::sync::{Arc, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use hub_testing::mocks::FixedClock;
    /// use hub_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(epoch())
    }

    fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can keep one handle and give
    /// another to the service under test.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Start the clock at `time`.
        #[must_use]
        pub fn starting_at(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock forward (or backward, for negative durations).
        pub fn advance(&self, by: Duration) {
            if let Ok(mut time) = self.time.write() {
                *time += by;
            }
        }

        /// Jump to an absolute time.
        pub fn set(&self, to: DateTime<Utc>) {
            if let Ok(mut time) = self.time.write() {
                *time = to;
            }
        }
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::starting_at(epoch())
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.time.read().map_or_else(|poisoned| *poisoned.into_inner(), |time| *time)
        }
    }
}

/// Test helpers.
pub mod helpers {
    /// Install a `tracing` subscriber writing to the test harness output.
    ///
    /// Safe to call from many tests; only the first call installs anything.
    /// Honors `RUST_LOG`.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

pub use helpers::init_test_tracing;
pub use mocks::{FixedClock, ManualClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
        assert_eq!(time1.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_manual_clock_advances_all_clones() {
        let clock = ManualClock::starting_at(test_clock().now());
        let shared = clock.clone();

        clock.advance(Duration::minutes(31));

        assert_eq!(shared.now(), test_clock().now() + Duration::minutes(31));
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::default();
        let target = test_clock().now() + Duration::days(2);
        clock.set(target);
        assert_eq!(clock.now(), target);
    }
}
