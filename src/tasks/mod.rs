//! Background Tasks Module
//!
//! Contains background tasks that run alongside the cache engine.
//!
//! # Tasks
//! - Housekeeping: enforces capacity (LRU trim) and expiry (sweep)
//!   bounds at configured intervals, cancellable at any point.

mod housekeeping;

pub use housekeeping::{house_keep_once, spawn_housekeeping_task, HousekeepingHandle};
