//! Cache Module
//!
//! Persistent caching with TTL expiry and LRU eviction on a
//! SQLite-backed entry store.

mod engine;
mod stats;
mod store;


// Re-export public types
pub use engine::{CacheItem, DiskLru};
pub use stats::{CacheStats, StatsRecorder};
pub use store::EntryStore;
