//! The storage collaborator seen by the proxy.
//!
//! Handlers never talk to a concrete store. They hold an
//! `Arc<dyn StorageBackend>` and await its futures from spawned tasks, which
//! is where backend completions run.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Non-success outcomes of a backend call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The key does not exist (or has expired).
    #[error("not found")]
    NotFound,

    /// The store answered with a non-zero status code.
    #[error("internal error {0}")]
    Status(i32),

    /// The call did not complete before its deadline.
    #[error("timeout")]
    Timeout,

    /// The call could not be delivered.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// Failures worth retrying: the request may never have been applied.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Timeout | BackendError::Unavailable(_))
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Asynchronous key/value store.
///
/// Keys are full storage keys as produced by
/// [`generate_key`](crate::storage::key::generate_key).
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Stores `value`. `expire_ts_seconds` is an absolute UNIX timestamp;
    /// 0 means the value never expires.
    async fn put(&self, key: Bytes, value: Bytes, expire_ts_seconds: u64) -> BackendResult<()>;

    /// Reads a value, failing with [`BackendError::NotFound`] if absent.
    async fn get(&self, key: Bytes) -> BackendResult<Bytes>;

    /// Removes a key. Removing an absent key succeeds.
    async fn remove(&self, key: Bytes) -> BackendResult<()>;

    /// Remaining time to live in seconds, or -1 if the key never expires.
    async fn ttl(&self, key: Bytes) -> BackendResult<i64>;
}

/// Current UNIX time in seconds.
pub fn epoch_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
