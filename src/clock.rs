// Copyright 2025 Cowboy AI, LLC.

//! The clock collaborator.
//!
//! The core treats wall-clock time as an external dependency (§6: "consumed
//! from external collaborators … a clock") so that timestamp-sensitive
//! behavior (`created_at`/`updated_at`, memory decay, correlation windows)
//! can be driven deterministically in tests.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Supplies the current time to the rest of the fabric.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The default clock, backed by the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock a test can advance explicitly, so timestamp-ordering assertions
/// don't depend on real sleeps.
#[derive(Debug)]
pub struct TestClock {
    millis_since_epoch: AtomicI64,
}

impl TestClock {
    /// Create a test clock starting at the given time.
    pub fn at(start: DateTime<Utc>) -> Self {
        Self {
            millis_since_epoch: AtomicI64::new(start.timestamp_millis()),
        }
    }

    /// Advance the clock by `millis` milliseconds.
    pub fn advance_millis(&self, millis: i64) {
        self.millis_since_epoch.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis_since_epoch.load(Ordering::SeqCst);
        DateTime::from_timestamp_millis(millis).expect("valid test clock timestamp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_clock_advances_on_demand() {
        let start = Utc::now();
        let clock = TestClock::at(start);
        assert_eq!(clock.now().timestamp_millis(), start.timestamp_millis());
        clock.advance_millis(5_000);
        assert_eq!(
            clock.now().timestamp_millis(),
            start.timestamp_millis() + 5_000
        );
    }
}
