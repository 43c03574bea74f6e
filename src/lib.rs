//! Disk LRU - a persistent, size- and time-bounded key/value cache
//!
//! A SQLite-backed store that behaves like an LRU cache with per-entry
//! TTL expiry, safe for concurrent readers/writers and self-maintained
//! by a background housekeeping task. Meant to be embedded inside a
//! larger process as a durable cache layer: it survives restarts,
//! keeps disk growth bounded and keeps staleness bounded.

pub mod cache;
pub mod clock;
pub mod config;
pub mod encoder;
pub mod error;
pub mod tasks;

pub use cache::{CacheItem, CacheStats, DiskLru, EntryStore};
pub use clock::{Clock, ManualClock, SystemClock, NANOS_PER_SEC};
pub use config::Options;
pub use encoder::{EncodeError, Encoder, JsonEncoder};
pub use error::{CacheError, Result};
