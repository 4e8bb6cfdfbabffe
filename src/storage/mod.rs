//! Storage Collaborator
//!
//! The proxy translates commands into calls on a [`StorageBackend`]. This
//! module defines that interface, the key schema used to address it, and an
//! in-memory implementation with TTL support.
//!
//! ## Architecture
//!
//! ```text
//!   Command handlers
//!         │  put / get / remove / ttl   (async, Arc<dyn StorageBackend>)
//!         ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │            StorageEngine (in-memory backend)                │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              └───────────────────────────┘
//! ```

pub mod backend;
pub mod engine;
pub mod expiry;
pub mod key;

// Re-export commonly used types
pub use backend::{epoch_now, BackendError, BackendResult, StorageBackend};
pub use engine::{Entry, StorageEngine, StorageStats};
pub use expiry::{start_expiry_sweeper, sweep_once, Expiring, ExpirySweeper, DEFAULT_SWEEP_INTERVAL};
pub use key::{generate_key, restore_key};
