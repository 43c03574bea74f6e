//! Housekeeping Task
//!
//! Background task that periodically enforces the capacity and expiry
//! bounds on the entry store.
//!
//! Each tick runs the LRU trim first, then the expiry sweep (trim sees
//! pre-sweep counts; both are idempotent and order-independent for
//! correctness). Failures are logged and retried on the next tick; a
//! failed run never stops the task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::EntryStore;
use crate::clock::Clock;

// == One-Shot Housekeeping ==
/// Runs one trim+sweep pass; errors are logged, never propagated.
///
/// Exposed for callers that want deterministic eviction (e.g. tests)
/// without waiting on the timer.
pub fn house_keep_once(store: &EntryStore, max_items: usize, now: i64) {
    debug!("Housekeeping run");

    match store.trim_to_capacity(max_items) {
        Ok(removed) if removed > 0 => info!(removed, "LRU trim removed entries"),
        Ok(_) => debug!("LRU trim: within capacity"),
        Err(err) => warn!(%err, "LRU trim failed"),
    }

    match store.sweep_expired(now) {
        Ok(removed) if removed > 0 => info!(removed, "Expiry sweep removed entries"),
        Ok(_) => debug!("Expiry sweep: nothing expired"),
        Err(err) => warn!(%err, "Expiry sweep failed"),
    }
}

// == Housekeeping Handle ==
/// Handle to a running housekeeping task.
///
/// Dropping the handle without calling [`HousekeepingHandle::shutdown`]
/// also stops the task: the shutdown channel closing wakes the loop.
pub struct HousekeepingHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl HousekeepingHandle {
    /// Signals cancellation and waits for the task to observe it.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

// == Spawn ==
/// Spawns the periodic housekeeping task.
///
/// The loop races the shutdown signal against the interval sleep, so
/// cancellation preempts a mid-interval wait instead of being delayed
/// by up to a full period.
pub fn spawn_housekeeping_task(
    store: Arc<EntryStore>,
    clock: Arc<dyn Clock>,
    max_items: usize,
    period: Duration,
) -> HousekeepingHandle {
    let (shutdown, mut signal) = watch::channel(false);

    let task = tokio::spawn(async move {
        info!(period_secs = period.as_secs(), "Housekeeping task started");

        loop {
            tokio::select! {
                _ = signal.changed() => {
                    info!("Housekeeping task stopped");
                    break;
                }
                _ = tokio::time::sleep(period) => {
                    house_keep_once(&store, max_items, clock.now_ns());
                }
            }
        }
    });

    HousekeepingHandle { shutdown, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};
    use tempfile::NamedTempFile;
    use tokio::time::timeout;

    fn open_temp() -> (Arc<EntryStore>, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        let store = EntryStore::open(file.path().to_str().unwrap()).unwrap();
        (Arc::new(store), file)
    }

    #[test]
    fn test_house_keep_once_trims_then_sweeps() {
        let (store, _file) = open_temp();
        let clock = ManualClock::new(0);

        // Four entries; the most recent one is already expired
        // relative to now = 100.
        store.upsert("a", b"v", Some(10_000), 1).unwrap();
        store.upsert("b", b"v", Some(10_000), 2).unwrap();
        store.upsert("c", b"v", Some(10_000), 3).unwrap();
        store.upsert("expired", b"v", Some(50), 4).unwrap();

        clock.advance(99);
        house_keep_once(&store, 3, clock.now_ns());

        // Trim to 3 dropped the oldest entry ("a"), then the sweep
        // removed the expired one, so two rows remain.
        assert_eq!(store.len().unwrap(), 2);
        assert!(store.peek("a").unwrap().is_none());
        assert!(store.peek("expired").unwrap().is_none());
        assert!(store.peek("b").unwrap().is_some());
        assert!(store.peek("c").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_task_sweeps_on_tick() {
        let (store, _file) = open_temp();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        // Already expired relative to the system clock.
        store.upsert("stale", b"v", Some(1), 1).unwrap();

        let handle =
            spawn_housekeeping_task(store.clone(), clock, 10, Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(store.peek("stale").unwrap().is_none());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_preempts_interval_wait() {
        let (store, _file) = open_temp();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        // A one-hour period; shutdown must still return promptly.
        let handle =
            spawn_housekeeping_task(store, clock, 10, Duration::from_secs(3600));

        timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .expect("shutdown was delayed by the interval wait");
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_task() {
        let (store, _file) = open_temp();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let handle =
            spawn_housekeeping_task(store, clock, 10, Duration::from_secs(3600));
        let task = handle.task;
        drop(handle.shutdown);

        timeout(Duration::from_secs(1), task)
            .await
            .expect("task did not observe the closed shutdown channel")
            .unwrap();
    }
}
