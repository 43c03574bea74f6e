//! Clock Module
//!
//! Time source abstraction for TTL and LRU-order computations.
//!
//! All timestamps in the engine are nanoseconds since the Unix epoch
//! and are obtained exclusively through the [`Clock`] capability, so
//! tests can control time deterministically.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

// == Constants ==
/// Nanoseconds per second.
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

// == Clock Trait ==
/// A source of nanosecond timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current time in nanoseconds since the Unix epoch.
    fn now_ns(&self) -> i64;
}

// == System Clock ==
/// Production clock backed by the system time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0)
    }
}

// == Manual Clock ==
/// Caller-controlled clock for deterministic tests.
///
/// Every reading ticks the clock forward by one nanosecond so that
/// successive operations always observe distinct, strictly increasing
/// timestamps. Larger jumps are made with [`ManualClock::advance`].
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a manual clock starting at the given timestamp.
    pub fn new(start_ns: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ns),
        }
    }

    /// Advances the clock by the given number of nanoseconds.
    pub fn advance(&self, delta_ns: i64) {
        self.now.fetch_add(delta_ns, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> i64 {
        self.now.fetch_add(1, Ordering::SeqCst) + 1
    }
}
