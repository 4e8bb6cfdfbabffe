//! Background Expiry Sweeper
//!
//! Reads hide expired entries lazily, but nothing removes an entry that is
//! never read again. The sweeper walks every registered [`Expiring`] store on
//! a fixed tick and purges what has expired: the in-memory backend and, with
//! the geo extension on, the geo point table.

use crate::storage::{epoch_now, StorageEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Time between two sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// A store whose entries carry absolute expiry timestamps.
pub trait Expiring: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Removes every entry expired at `now` (UNIX seconds). Returns how many.
    fn purge_expired(&self, now: u64) -> u64;
}

impl Expiring for StorageEngine {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn purge_expired(&self, now: u64) -> u64 {
        self.cleanup_expired_at(now)
    }
}

/// Handle to the sweeper task. Dropping it stops the task.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Spawns the sweeper on the current runtime.
    pub fn start(stores: Vec<Arc<dyn Expiring>>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        info!(
            stores = stores.len(),
            interval_ms = interval.as_millis() as u64,
            "Expiry sweeper started"
        );
        tokio::spawn(sweep_loop(stores, interval, shutdown_rx));
        Self { shutdown_tx }
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One pass over every store. Returns the total number of purged entries.
pub fn sweep_once(stores: &[Arc<dyn Expiring>], now: u64) -> u64 {
    stores
        .iter()
        .map(|store| {
            let purged = store.purge_expired(now);
            if purged > 0 {
                debug!(store = store.name(), purged, "expired entries purged");
            }
            purged
        })
        .sum()
}

async fn sweep_loop(
    stores: Vec<Arc<dyn Expiring>>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sweep_once(&stores, epoch_now());
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper stopped");
                    return;
                }
            }
        }
    }
}

/// Starts a sweeper over `stores` with [`DEFAULT_SWEEP_INTERVAL`].
pub fn start_expiry_sweeper(stores: Vec<Arc<dyn Expiring>>) -> ExpirySweeper {
    ExpirySweeper::start(stores, DEFAULT_SWEEP_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn expired_engine(now: u64, expired: usize) -> Arc<StorageEngine> {
        let engine = Arc::new(StorageEngine::new());
        for i in 0..expired {
            engine.put_at(Bytes::from(format!("key{}", i)), Bytes::from("v"), now - 1, now);
        }
        engine.put_at(Bytes::from("persistent"), Bytes::from("v"), 0, now);
        engine
    }

    #[test]
    fn test_sweep_once_counts_every_store() {
        let now = epoch_now();
        let a = expired_engine(now, 3);
        let b = expired_engine(now, 4);
        let stores: Vec<Arc<dyn Expiring>> = vec![a.clone() as Arc<dyn Expiring>, b.clone()];

        assert_eq!(sweep_once(&stores, now), 7);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_eq!(sweep_once(&stores, now), 0);
    }

    #[tokio::test]
    async fn test_sweeper_cleans_expired_keys() {
        let engine = expired_engine(epoch_now(), 10);
        assert_eq!(engine.len(), 11);

        let stores = vec![engine.clone() as Arc<dyn Expiring>];
        let _sweeper = ExpirySweeper::start(stores, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(engine.len(), 1);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_drop() {
        let engine = Arc::new(StorageEngine::new());

        {
            let stores = vec![engine.clone() as Arc<dyn Expiring>];
            let _sweeper = ExpirySweeper::start(stores, Duration::from_millis(10));
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        let now = epoch_now();
        engine.put_at(Bytes::from("key"), Bytes::from("v"), now - 1, now);
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Nobody swept it; it is only hidden lazily
        assert_eq!(engine.len(), 1);
        assert!(engine.get_at(&Bytes::from("key"), now).is_none());
        assert_eq!(engine.len(), 0);
    }
}
