//! In-Memory Storage Backend
//!
//! A sharded, thread-safe key/value store implementing [`StorageBackend`].
//! The proxy binary runs against it when no remote cluster is wired in, and
//! the test-suite uses it as the backend collaborator.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: 64 shards, each an `RwLock<HashMap>`, to keep
//!    concurrent completions from contending on a single lock.
//! 2. **Absolute Expiry**: entries carry a UNIX expiry timestamp, matching
//!    what the proxy sends on `put`. 0 means "never expires".
//! 3. **Lazy + Active Expiry**: expired entries are hidden on access and
//!    physically removed by the background sweeper (see `expiry`).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::storage::backend::{epoch_now, BackendError, BackendResult, StorageBackend};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of shards for the storage engine.
const NUM_SHARDS: usize = 64;

/// A stored value with its absolute expiry time.
#[derive(Debug, Clone)]
pub struct Entry {
    pub value: Bytes,
    /// UNIX seconds; 0 = never expires
    pub expire_ts: u64,
}

impl Entry {
    #[inline]
    pub fn is_expired(&self, now: u64) -> bool {
        self.expire_ts != 0 && self.expire_ts <= now
    }

    /// Remaining seconds, or -1 without expiry.
    pub fn ttl_seconds(&self, now: u64) -> i64 {
        if self.expire_ts == 0 {
            -1
        } else {
            self.expire_ts.saturating_sub(now) as i64
        }
    }
}

/// A single shard containing a portion of the key-value pairs.
#[derive(Debug, Default)]
struct Shard {
    data: RwLock<HashMap<Bytes, Entry>>,
}

/// Snapshot of the engine counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub keys: u64,
    pub get_ops: u64,
    pub put_ops: u64,
    pub remove_ops: u64,
    pub expired_keys: u64,
}

/// The in-memory backend.
///
/// Wrap it in an `Arc` and share it between the sweeper and every session.
///
/// # Example
///
/// ```
/// use geoproxy::storage::StorageEngine;
/// use bytes::Bytes;
///
/// let engine = StorageEngine::new();
/// engine.put_at(Bytes::from("k"), Bytes::from("v"), 0, 100);
/// assert_eq!(engine.get_at(&Bytes::from("k"), 100), Some(Bytes::from("v")));
/// ```
pub struct StorageEngine {
    shards: Vec<Shard>,
    key_count: AtomicU64,
    get_count: AtomicU64,
    put_count: AtomicU64,
    remove_count: AtomicU64,
    expired_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| Shard::default()).collect(),
            key_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            put_count: AtomicU64::new(0),
            remove_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard(&self, key: &[u8]) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    /// Stores a value as of time `now`.
    pub fn put_at(&self, key: Bytes, value: Bytes, expire_ts: u64, now: u64) {
        self.put_count.fetch_add(1, Ordering::Relaxed);
        let mut data = self.shard(&key).data.write();
        let previous = data.insert(key, Entry { value, expire_ts });
        match previous {
            None => {
                self.key_count.fetch_add(1, Ordering::Relaxed);
            }
            // Overwriting an expired entry revives the slot; count it as expired
            Some(old) if old.is_expired(now) => {
                self.expired_count.fetch_add(1, Ordering::Relaxed);
            }
            Some(_) => {}
        }
    }

    /// Reads a value as of time `now`, removing it if it has expired.
    pub fn get_at(&self, key: &Bytes, now: u64) -> Option<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        self.live_entry(key, now).map(|e| e.value)
    }

    /// Remaining TTL as of `now`; `None` if absent.
    pub fn ttl_at(&self, key: &Bytes, now: u64) -> Option<i64> {
        self.live_entry(key, now).map(|e| e.ttl_seconds(now))
    }

    /// Removes a key. Returns whether it existed.
    pub fn remove(&self, key: &Bytes) -> bool {
        self.remove_count.fetch_add(1, Ordering::Relaxed);
        let removed = self.shard(key).data.write().remove(key).is_some();
        if removed {
            self.key_count.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Returns the entry if present and not expired. Lazy expiry happens here.
    fn live_entry(&self, key: &Bytes, now: u64) -> Option<Entry> {
        let shard = self.shard(key);
        {
            let data = shard.data.read();
            match data.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: upgrade to a write lock and re-check, another writer may have won
        let mut data = shard.data.write();
        match data.get(key) {
            Some(entry) if entry.is_expired(now) => {
                data.remove(key);
                self.key_count.fetch_sub(1, Ordering::Relaxed);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }

    /// Removes every entry expired as of `now`. Returns how many were removed.
    pub fn cleanup_expired_at(&self, now: u64) -> u64 {
        let mut removed = 0;
        for shard in &self.shards {
            let mut data = shard.data.write();
            let before = data.len();
            data.retain(|_, entry| !entry.is_expired(now));
            removed += (before - data.len()) as u64;
        }
        if removed > 0 {
            self.key_count.fetch_sub(removed, Ordering::Relaxed);
            self.expired_count.fetch_add(removed, Ordering::Relaxed);
        }
        removed
    }

    /// Approximate number of stored keys, including not-yet-swept expired ones.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.len(),
            get_ops: self.get_count.load(Ordering::Relaxed),
            put_ops: self.put_count.load(Ordering::Relaxed),
            remove_ops: self.remove_count.load(Ordering::Relaxed),
            expired_keys: self.expired_count.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl StorageBackend for StorageEngine {
    async fn put(&self, key: Bytes, value: Bytes, expire_ts_seconds: u64) -> BackendResult<()> {
        self.put_at(key, value, expire_ts_seconds, epoch_now());
        Ok(())
    }

    async fn get(&self, key: Bytes) -> BackendResult<Bytes> {
        self.get_at(&key, epoch_now()).ok_or(BackendError::NotFound)
    }

    async fn remove(&self, key: Bytes) -> BackendResult<()> {
        StorageEngine::remove(self, &key);
        Ok(())
    }

    async fn ttl(&self, key: Bytes) -> BackendResult<i64> {
        self.ttl_at(&key, epoch_now()).ok_or(BackendError::NotFound)
    }
}
