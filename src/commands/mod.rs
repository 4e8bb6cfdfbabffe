//! Command Module
//!
//! Turns parsed commands into backend calls and backend outcomes into
//! replies.
//!
//! ## Architecture
//!
//! ```text
//!   Session (one per client)
//!         │  Command
//!         ▼
//! ┌─────────────────┐
//! │   dispatch()    │  handler table, keyed by upper-cased name
//! └────────┬────────┘
//!          │
//!    ┌─────┴──────────────────────┐
//!    ▼                            ▼
//! SET GET DEL SETEX          GEORADIUS GEORADIUSBYMEMBER
//! TTL PTTL  (handler)        GEODIST   (geo)
//!    │                            │
//!    ▼                            ▼
//! StorageBackend               GeoService
//! ```
//!
//! A handler returns [`Reply::Ready`] when it can answer without the backend
//! and [`Reply::Pending`] otherwise.

pub mod geo;
pub mod handler;

pub use geo::RadiusOptions;
pub use handler::{dispatch, lookup, CommandContext, CommandFn, ProxyOptions, Reply, DEFAULT_TIMEOUT};
