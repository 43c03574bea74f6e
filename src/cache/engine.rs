//! Cache Engine Module
//!
//! The public cache API: maps set/get/peek/delete/items/clear onto
//! entry store operations, with timestamps from the configured clock
//! and hit/miss accounting on the read path.

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{CacheStats, EntryStore, StatsRecorder};
use crate::clock::NANOS_PER_SEC;
use crate::config::Options;
use crate::encoder::{Encoder, JsonEncoder};
use crate::error::{CacheError, Result};
use crate::tasks::{house_keep_once, spawn_housekeeping_task, HousekeepingHandle};

// == Cache Item ==
/// A decoded key/value pair returned by [`DiskLru::items`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheItem<V> {
    pub key: String,
    pub value: V,
}

// == Disk LRU ==
/// Persistent, size- and time-bounded key/value cache.
///
/// Entries live in a SQLite-backed [`EntryStore`]; every `set` stamps
/// a fresh expiry of `now + max_expiry_sec`, the background
/// housekeeping task enforces the soft capacity bound (LRU order) and
/// removes expired rows, and liveness is additionally enforced on
/// every read.
pub struct DiskLru<V> {
    store: Arc<EntryStore>,
    encoder: Box<dyn Encoder<V> + Send + Sync>,
    opts: Options,
    stats: StatsRecorder,
    housekeeping: Option<HousekeepingHandle>,
}

impl<V> DiskLru<V> {
    // == Open ==
    /// Opens (creating if necessary) a cache with the default JSON
    /// encoder.
    ///
    /// Must run inside a Tokio runtime when automatic housekeeping is
    /// enabled (a non-negative `house_keep_period_sec`). Construction
    /// failures are fatal: the caller gets an error and no engine.
    pub fn open(opts: Options) -> Result<Self>
    where
        V: Serialize + DeserializeOwned + 'static,
    {
        Self::with_encoder(opts, Box::new(JsonEncoder))
    }

    // == Open With Encoder ==
    /// Opens a cache with a caller-supplied encoder.
    pub fn with_encoder(
        opts: Options,
        encoder: Box<dyn Encoder<V> + Send + Sync>,
    ) -> Result<Self> {
        let store = Arc::new(EntryStore::open(&opts.filename)?);

        if opts.clear_on_start {
            let removed = store.clear()?;
            debug!(removed, "cleared store on start");
        }

        let housekeeping = opts.effective_house_keep_period().map(|period| {
            spawn_housekeeping_task(store.clone(), opts.clock.clone(), opts.max_size, period)
        });

        info!(filename = %opts.filename, "cache opened");
        Ok(Self {
            store,
            encoder,
            opts,
            stats: StatsRecorder::new(),
            housekeeping,
        })
    }

    fn next_expiry(&self, now: i64) -> i64 {
        now + self.opts.max_expiry_sec as i64 * NANOS_PER_SEC
    }

    // == Set ==
    /// Stores a value under the key, replacing any previous entry.
    ///
    /// The entry's expiry is always `now + max_expiry_sec`; TTL is a
    /// fixed window from write time, not caller-specified per entry.
    pub fn set(&self, key: &str, value: &V) -> Result<()> {
        let buf = self
            .encoder
            .encode(value)
            .map_err(|err| CacheError::Encoding(err.to_string()))?;

        let now = self.opts.clock.now_ns();
        self.store
            .upsert(key, &buf, Some(self.next_expiry(now)), now)?;

        debug!(key, bytes = buf.len(), "set");
        Ok(())
    }

    // == Get ==
    /// Retrieves a live value by key.
    ///
    /// With `update_expiry_on_access` the read also refreshes the
    /// entry's expiry and recency, atomically with the liveness check.
    /// A missing row, an expired row and any underlying read error all
    /// collapse to [`CacheError::NotFound`] and count as a miss.
    pub fn get(&self, key: &str) -> Result<V> {
        let now = self.opts.clock.now_ns();

        let read = if self.opts.update_expiry_on_access {
            self.store
                .read_and_touch(key, now, Some(self.next_expiry(now)))
        } else {
            self.store.read_if_live(key, now)
        };

        let buf = match read {
            Ok(Some(buf)) => buf,
            Ok(None) => {
                self.stats.record_miss();
                debug!(key, "get: not found");
                return Err(CacheError::NotFound(key.to_string()));
            }
            Err(err) => {
                self.stats.record_miss();
                debug!(key, %err, "get: read failed");
                return Err(CacheError::NotFound(key.to_string()));
            }
        };

        self.stats.record_hit();
        self.encoder
            .decode(&buf)
            .map_err(|err| CacheError::Encoding(err.to_string()))
    }

    // == Peek ==
    /// Raw read bypassing liveness filtering and counters; intended
    /// for introspection, not normal access.
    pub fn peek(&self, key: &str) -> Result<V> {
        match self.store.peek(key) {
            Ok(Some(buf)) => self
                .encoder
                .decode(&buf)
                .map_err(|err| CacheError::Encoding(err.to_string())),
            Ok(None) | Err(_) => Err(CacheError::NotFound(key.to_string())),
        }
    }

    // == Delete ==
    /// Removes the entry if present; reports whether it existed.
    /// Deleting a missing key is not an error.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let removed = self.store.delete(key)?;
        debug!(key, removed, "delete");
        Ok(removed)
    }

    // == Items ==
    /// Full snapshot of all currently decodable rows, live or not;
    /// rows that fail to decode are skipped. Order is unspecified.
    pub fn items(&self) -> Result<Vec<CacheItem<V>>> {
        let started = Instant::now();

        let mut items = Vec::new();
        for (key, buf) in self.store.scan_all()? {
            match self.encoder.decode(&buf) {
                Ok(value) => items.push(CacheItem { key, value }),
                Err(err) => debug!(key, %err, "items: skipping undecodable row"),
            }
        }

        debug!(count = items.len(), elapsed = ?started.elapsed(), "items");
        Ok(items)
    }

    // == Clear ==
    /// Removes all entries unconditionally.
    pub fn clear(&self) -> Result<()> {
        let removed = self.store.clear()?;
        debug!(removed, "clear");
        Ok(())
    }

    // == Stats ==
    /// Point-in-time counters; not a strongly consistent snapshot
    /// relative to concurrent operations.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.opts.max_size)
    }

    // == Manual Housekeeping ==
    /// Runs one trim+sweep pass immediately, for deterministic
    /// eviction without waiting on the timer. Failures are logged,
    /// never returned.
    pub fn house_keep_once(&self) {
        house_keep_once(&self.store, self.opts.max_size, self.opts.clock.now_ns());
    }

    // == Dump ==
    /// Logs every row's key, expiry and recency at debug level when
    /// the `debug` option is set.
    pub fn dump(&self) {
        if !self.opts.debug {
            return;
        }

        match self.store.dump_rows() {
            Ok(rows) => {
                for (key, expires_at, last_access) in rows {
                    debug!(key, ?expires_at, last_access, "dump");
                }
            }
            Err(err) => debug!(%err, "dump failed"),
        }
    }

    // == Close ==
    /// Shuts the engine down: cancels housekeeping, waits for it to
    /// observe the cancellation, then closes the store.
    ///
    /// Operations racing with `close` on other clones of the engine's
    /// `Arc` may fail; in-flight completion past shutdown initiation
    /// is not guaranteed.
    pub async fn close(mut self) -> Result<()> {
        info!("closing cache");

        if let Some(handle) = self.housekeeping.take() {
            handle.shutdown().await;
        }

        let Self { store, .. } = self;
        match Arc::try_unwrap(store) {
            Ok(store) => store.close(),
            // Another holder still references the store; it closes on
            // the last drop.
            Err(_) => Ok(()),
        }
    }
}
