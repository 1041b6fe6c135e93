//! Time source used everywhere elapsed time is computed.
//!
//! The engine never reads the system time directly. [`PulseApp`](crate::PulseApp)
//! samples one [`Clock`] once per command and threads that instant through the
//! timer, so pause/resume arithmetic always compares readings from the same source.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Provides the current time in whole epoch seconds.
pub trait Clock: Send + Sync {
    fn now_ts(&self) -> i64;
}

/// Wall clock backed by `chrono::Utc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ts(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ts: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ts),
        }
    }

    pub fn set(&self, ts: i64) {
        self.now.store(ts, Ordering::SeqCst);
    }

    /// Move the clock forward by `secs` seconds.
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ts(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        clock.advance(600);
        assert_eq!(clock.now_ts(), 1_600);
        clock.set(42);
        assert_eq!(clock.now_ts(), 42);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_ts() > 1_577_836_800);
    }
}
