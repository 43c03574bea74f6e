//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
///
/// Read-path failures (missing key, expired key, underlying read
/// errors) are collapsed into [`CacheError::NotFound`]; callers cannot
/// distinguish these cases. Write-path and construction failures
/// surface distinctly as [`CacheError::Storage`].
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found, expired, or unreadable
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Durable store failure (I/O, constraint violation, corruption)
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Encoder failure during set or get; never retried
    #[error("Encoding error: {0}")]
    Encoding(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
