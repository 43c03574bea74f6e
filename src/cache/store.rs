//! Entry Store Module
//!
//! Durable, indexed storage of cache entries on SQLite.
//!
//! The store owns a single connection behind a mutex, which is the
//! engine's global write serialization point; every operation is one
//! SQL statement and therefore individually atomic. Hot statements go
//! through the connection's prepared statement cache.

use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::Result;

// == Schema ==
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cache (
    key TEXT PRIMARY KEY,
    value BLOB,
    expires_at BIGINT,
    last_access BIGINT
);

CREATE INDEX IF NOT EXISTS cache_expires_at ON cache (expires_at);
CREATE INDEX IF NOT EXISTS cache_last_access ON cache (last_access);
";

// == Entry Store ==
/// SQLite-backed table of cache entries.
///
/// Columns: `key` (unique), `value` (opaque bytes), `expires_at`
/// (nullable ns timestamp, NULL = never expires), `last_access`
/// (ns timestamp). Secondary indices on `expires_at` and `last_access`
/// keep the sweep and trim scans efficient.
pub struct EntryStore {
    conn: Mutex<Connection>,
}

impl EntryStore {
    // == Open ==
    /// Opens (creating if necessary) the store at the given path.
    ///
    /// Applies WAL journaling, NORMAL synchronous mode and a busy
    /// timeout, then creates the schema idempotently.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.busy_timeout(Duration::from_secs(60))?;
        // journal_mode returns the resulting mode as a row
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA synchronous=NORMAL;")?;

        conn.execute_batch(SCHEMA)?;
        conn.set_prepared_statement_cache_capacity(16);

        debug!(path, "entry store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // == Upsert ==
    /// Unconditionally inserts or fully replaces an entry.
    pub fn upsert(
        &self,
        key: &str,
        value: &[u8],
        expires_at: Option<i64>,
        now: i64,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "REPLACE INTO cache (key, value, expires_at, last_access)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        stmt.execute(params![key, value, expires_at, now])?;
        Ok(())
    }

    // == Read If Live ==
    /// Returns the value only if the entry is present and unexpired.
    ///
    /// Does not mutate the entry.
    pub fn read_if_live(&self, key: &str, now: i64) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT value FROM cache
             WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
        )?;
        let value = stmt
            .query_row(params![key, now], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    // == Read And Touch ==
    /// Returns the value under the same liveness filter as
    /// [`EntryStore::read_if_live`], atomically updating
    /// `last_access = now` (and `expires_at` when a refresh value is
    /// given) in the same statement as the read.
    ///
    /// Read and touch being one statement means a concurrent expiry
    /// sweep can never remove the entry between the liveness check and
    /// the touch, and a concurrent writer's update is never lost.
    pub fn read_and_touch(
        &self,
        key: &str,
        now: i64,
        new_expires_at: Option<i64>,
    ) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "UPDATE cache
             SET last_access = ?2, expires_at = COALESCE(?3, expires_at)
             WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)
             RETURNING value",
        )?;
        let value = stmt
            .query_row(params![key, now, new_expires_at], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    // == Peek ==
    /// Raw read ignoring liveness, without touching `last_access`.
    pub fn peek(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT value FROM cache WHERE key = ?1")?;
        let value = stmt.query_row(params![key], |row| row.get(0)).optional()?;
        Ok(value)
    }

    // == Delete ==
    /// Idempotent removal; reports whether a row was removed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("DELETE FROM cache WHERE key = ?1")?;
        let removed = stmt.execute(params![key])?;
        Ok(removed > 0)
    }

    // == Clear ==
    /// Removes all rows; returns the number removed.
    pub fn clear(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("DELETE FROM cache")?;
        let removed = stmt.execute([])?;
        Ok(removed)
    }

    // == Sweep Expired ==
    /// Removes all rows whose expiry has passed; never-expiring rows
    /// (NULL `expires_at`) are untouched. Returns the number removed.
    pub fn sweep_expired(&self, now: i64) -> Result<usize> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("DELETE FROM cache WHERE expires_at < ?1")?;
        let removed = stmt.execute(params![now])?;
        Ok(removed)
    }

    // == Trim To Capacity ==
    /// Removes the oldest-`last_access` rows so that at most
    /// `max_items` remain; a no-op when already within capacity.
    ///
    /// Removes exactly `count - max_items` rows (floored at zero),
    /// never more. The capacity bound is soft: it only holds right
    /// after this runs.
    pub fn trim_to_capacity(&self, max_items: usize) -> Result<usize> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "DELETE FROM cache WHERE key IN (
                 SELECT key FROM cache
                 ORDER BY last_access ASC
                 LIMIT max((SELECT count(*) FROM cache) - ?1, 0)
             )",
        )?;
        let removed = stmt.execute(params![max_items as i64])?;
        Ok(removed)
    }

    // == Scan All ==
    /// Full iteration over all rows, ignoring liveness; for
    /// diagnostics and snapshots. Order is unspecified.
    pub fn scan_all(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT key, value FROM cache")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    // == Length ==
    /// Returns the current number of rows, live or not.
    pub fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT count(*) FROM cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Returns true if the store holds no rows.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    // == Dump Rows ==
    /// Row metadata (key, expiry, recency) for diagnostic dumps.
    pub fn dump_rows(&self) -> Result<Vec<(String, Option<i64>, i64)>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT key, expires_at, last_access FROM cache")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    // == Close ==
    /// Closes the underlying connection, surfacing the close error.
    pub fn close(self) -> Result<()> {
        self.conn.into_inner().close().map_err(|(_, err)| err.into())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn open_temp() -> (EntryStore, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        let store = EntryStore::open(file.path().to_str().unwrap()).unwrap();
        (store, file)
    }

    #[test]
    fn test_upsert_and_read_if_live() {
        let (store, _file) = open_temp();

        store.upsert("k", b"v", Some(100), 10).unwrap();
        assert_eq!(store.read_if_live("k", 50).unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_upsert_replaces() {
        let (store, _file) = open_temp();

        store.upsert("k", b"old", Some(100), 10).unwrap();
        store.upsert("k", b"new", Some(200), 20).unwrap();

        assert_eq!(store.read_if_live("k", 50).unwrap(), Some(b"new".to_vec()));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_read_if_live_expiry_boundary() {
        let (store, _file) = open_temp();
        store.upsert("k", b"v", Some(100), 10).unwrap();

        // Live strictly before the expiry timestamp, absent at and after it.
        assert!(store.read_if_live("k", 99).unwrap().is_some());
        assert!(store.read_if_live("k", 100).unwrap().is_none());
        assert!(store.read_if_live("k", 101).unwrap().is_none());
    }

    #[test]
    fn test_read_if_live_null_expiry_never_expires() {
        let (store, _file) = open_temp();
        store.upsert("k", b"v", None, 10).unwrap();

        assert!(store.read_if_live("k", i64::MAX).unwrap().is_some());
    }

    #[test]
    fn test_read_if_live_does_not_touch() {
        let (store, _file) = open_temp();
        store.upsert("k", b"v", Some(1000), 10).unwrap();

        store.read_if_live("k", 500).unwrap();

        let rows = store.dump_rows().unwrap();
        assert_eq!(rows, vec![("k".to_string(), Some(1000), 10)]);
    }

    #[test]
    fn test_read_and_touch_updates_recency() {
        let (store, _file) = open_temp();
        store.upsert("k", b"v", Some(1000), 10).unwrap();

        let value = store.read_and_touch("k", 500, None).unwrap();
        assert_eq!(value, Some(b"v".to_vec()));

        let rows = store.dump_rows().unwrap();
        assert_eq!(rows, vec![("k".to_string(), Some(1000), 500)]);
    }

    #[test]
    fn test_read_and_touch_refreshes_expiry() {
        let (store, _file) = open_temp();
        store.upsert("k", b"v", Some(1000), 10).unwrap();

        store.read_and_touch("k", 500, Some(2000)).unwrap();

        // Readable past the original expiry now.
        assert!(store.read_if_live("k", 1500).unwrap().is_some());
        let rows = store.dump_rows().unwrap();
        assert_eq!(rows, vec![("k".to_string(), Some(2000), 500)]);
    }

    #[test]
    fn test_read_and_touch_expired_is_absent_and_unchanged() {
        let (store, _file) = open_temp();
        store.upsert("k", b"v", Some(100), 10).unwrap();

        let value = store.read_and_touch("k", 100, Some(2000)).unwrap();
        assert!(value.is_none());

        // The expired row was not resurrected by the attempted touch.
        let rows = store.dump_rows().unwrap();
        assert_eq!(rows, vec![("k".to_string(), Some(100), 10)]);
    }

    #[test]
    fn test_peek_ignores_expiry() {
        let (store, _file) = open_temp();
        store.upsert("k", b"v", Some(100), 10).unwrap();

        assert_eq!(store.peek("k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.peek("missing").unwrap(), None);
    }

    #[test]
    fn test_delete_reports_presence_and_is_idempotent() {
        let (store, _file) = open_temp();
        store.upsert("k", b"v", None, 10).unwrap();

        assert!(store.delete("k").unwrap());
        assert!(!store.delete("k").unwrap());
        assert!(!store.delete("never_existed").unwrap());
    }

    #[test]
    fn test_clear() {
        let (store, _file) = open_temp();
        store.upsert("a", b"1", None, 10).unwrap();
        store.upsert("b", b"2", None, 11).unwrap();

        assert_eq!(store.clear().unwrap(), 2);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_sweep_expired_removes_only_expired() {
        let (store, _file) = open_temp();
        store.upsert("expired", b"1", Some(100), 10).unwrap();
        store.upsert("live", b"2", Some(1000), 11).unwrap();
        store.upsert("forever", b"3", None, 12).unwrap();

        assert_eq!(store.sweep_expired(500).unwrap(), 1);
        assert_eq!(store.len().unwrap(), 2);
        assert!(store.peek("expired").unwrap().is_none());
        assert!(store.peek("live").unwrap().is_some());
        assert!(store.peek("forever").unwrap().is_some());
    }

    #[test]
    fn test_trim_removes_exactly_excess_in_lru_order() {
        let (store, _file) = open_temp();
        for i in 0..5i64 {
            store
                .upsert(&format!("k{i}"), b"v", None, 10 + i)
                .unwrap();
        }

        assert_eq!(store.trim_to_capacity(3).unwrap(), 2);
        assert_eq!(store.len().unwrap(), 3);

        // Oldest last_access rows are gone, newest remain.
        assert!(store.peek("k0").unwrap().is_none());
        assert!(store.peek("k1").unwrap().is_none());
        assert!(store.peek("k2").unwrap().is_some());
        assert!(store.peek("k4").unwrap().is_some());
    }

    #[test]
    fn test_trim_is_noop_within_capacity() {
        let (store, _file) = open_temp();
        store.upsert("a", b"1", None, 10).unwrap();
        store.upsert("b", b"2", None, 11).unwrap();

        assert_eq!(store.trim_to_capacity(3).unwrap(), 0);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_trim_respects_touched_recency() {
        let (store, _file) = open_temp();
        store.upsert("a", b"1", None, 10).unwrap();
        store.upsert("b", b"2", None, 11).unwrap();
        store.upsert("c", b"3", None, 12).unwrap();

        // Touch the oldest entry so it becomes the newest.
        store.read_and_touch("a", 20, None).unwrap();

        store.trim_to_capacity(2).unwrap();
        assert!(store.peek("a").unwrap().is_some());
        assert!(store.peek("b").unwrap().is_none());
        assert!(store.peek("c").unwrap().is_some());
    }

    #[test]
    fn test_scan_all() {
        let (store, _file) = open_temp();
        store.upsert("a", b"1", Some(5), 1).unwrap();
        store.upsert("b", b"2", None, 2).unwrap();

        let mut entries = store.scan_all().unwrap();
        entries.sort();
        assert_eq!(
            entries,
            vec![
                ("a".to_string(), b"1".to_vec()),
                ("b".to_string(), b"2".to_vec())
            ]
        );
    }

    #[test]
    fn test_close() {
        let (store, _file) = open_temp();
        store.upsert("k", b"v", None, 1).unwrap();
        store.close().unwrap();
    }

    #[test]
    fn test_reopen_preserves_rows() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let store = EntryStore::open(&path).unwrap();
        store.upsert("k", b"v", None, 1).unwrap();
        store.close().unwrap();

        let store = EntryStore::open(&path).unwrap();
        assert_eq!(store.peek("k").unwrap(), Some(b"v".to_vec()));
    }
}
