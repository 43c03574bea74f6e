//! Configuration Module
//!
//! Construction-time options for the cache engine and its
//! housekeeping task.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};

/// Cache engine configuration.
///
/// Built with [`Options::new`], which fills in the documented
/// defaults; individual fields can then be overridden directly.
#[derive(Clone)]
pub struct Options {
    /// Path to the persistent store file (required)
    pub filename: String,
    /// Clear the store once at construction
    pub clear_on_start: bool,
    /// Soft capacity bound enforced by housekeeping (default: 1000).
    ///
    /// The entry count may exceed this between housekeeping runs; the
    /// bound is guaranteed only immediately after a run.
    pub max_size: usize,
    /// TTL window in seconds added to `now` on every set (default: 60)
    pub max_expiry_sec: u64,
    /// Refresh expiry and recency on every successful get
    pub update_expiry_on_access: bool,
    /// Housekeeping interval in seconds (default: 60).
    ///
    /// Negative disables automatic housekeeping; zero is normalized to
    /// the default.
    pub house_keep_period_sec: i64,
    /// Time source for all TTL and LRU-order computations
    pub clock: Arc<dyn Clock>,
    /// Enable verbose diagnostic output (see `DiskLru::dump`)
    pub debug: bool,
}

impl Options {
    /// Creates options for the given store file with default settings.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            clear_on_start: false,
            max_size: 1000,
            max_expiry_sec: 60,
            update_expiry_on_access: false,
            house_keep_period_sec: 60,
            clock: Arc::new(SystemClock),
            debug: false,
        }
    }

    /// Returns the automatic housekeeping interval, or `None` when
    /// automatic housekeeping is disabled.
    pub fn effective_house_keep_period(&self) -> Option<Duration> {
        match self.house_keep_period_sec {
            p if p < 0 => None,
            0 => Some(Duration::from_secs(60)),
            p => Some(Duration::from_secs(p as u64)),
        }
    }
}
