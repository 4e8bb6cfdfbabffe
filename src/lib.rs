//! # geoproxy - A Redis-Protocol Proxy with Geo-Spatial Commands
//!
//! geoproxy speaks the Redis request protocol to clients and translates each
//! command into an asynchronous call on a key/value backend. Replies go back
//! in request order even though backend calls finish in any order.
//!
//! ## Features
//!
//! - **Incremental parsing**: requests may be split across any number of reads
//! - **Pipelining**: many commands in flight per connection, replies in order
//! - **Async backend**: every storage call is a spawned task with a deadline
//! - **Geo commands**: `GEORADIUS`, `GEORADIUSBYMEMBER` and `GEODIST` over an
//!   index of coordinates carried in stored values
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              geoproxy                                   │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Session    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Registry   │                  │
//! │  └─────────────┘    └──────▲──────┘    └──────┬──────┘                  │
//! │                            │ replies          │ bytes                   │
//! │                            │                  ▼                         │
//! │                     ┌──────┴──────┐    ┌─────────────┐                  │
//! │                     │  Pipeline   │<───│  Session    │ parser + slots   │
//! │                     │ (in order)  │    └──────┬──────┘                  │
//! │                     └──────▲──────┘           │ Command                 │
//! │                            │                  ▼                         │
//! │                            │           ┌─────────────┐                  │
//! │                            └───────────│  Dispatch   │                  │
//! │                              fill      └──────┬──────┘                  │
//! │                                               │                         │
//! │                         ┌─────────────────────┴──────────┐              │
//! │                         ▼                                ▼              │
//! │                 ┌───────────────┐               ┌───────────────┐       │
//! │                 │StorageBackend │<──────────────│  GeoService   │       │
//! │                 └───────────────┘    mirrors    └───────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use geoproxy::commands::{CommandContext, ProxyOptions};
//! use geoproxy::connection::{handle_connection, ConnectionStats};
//! use geoproxy::session::SessionRegistry;
//! use geoproxy::storage::StorageEngine;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage = Arc::new(StorageEngine::new());
//!     let ctx = CommandContext::new(storage, ProxyOptions::default());
//!     let registry = Arc::new(SessionRegistry::new(Arc::new(ctx)));
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:6379").await.unwrap();
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         tokio::spawn(handle_connection(stream, addr, registry.clone(), stats.clone()));
//!     }
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `SET key value [EX seconds]`
//! - `GET key`
//! - `DEL key`
//! - `SETEX key seconds value`
//! - `TTL key` / `PTTL key`
//! - `GEODIST key member1 member2 [m|km|ft|mi]`
//! - `GEORADIUS key lng lat radius [unit] [WITHCOORD] [WITHDIST] [WITHVALUE] [COUNT n] [ASC|DESC]`
//! - `GEORADIUSBYMEMBER key member radius [unit] [...same options]`
//!
//! ## Module Overview
//!
//! - [`protocol`]: buffered input, request parser, reply values
//! - [`commands`]: dispatcher and command handlers
//! - [`session`]: per-client sessions, reply pipeline, registry
//! - [`storage`]: backend interface, key schema, in-memory engine
//! - [`geo`]: geo service interface and in-memory index
//! - [`connection`]: TCP client handling
//! - [`config`]: command-line configuration

pub mod commands;
pub mod config;
pub mod connection;
pub mod geo;
pub mod protocol;
pub mod session;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandContext, ProxyOptions};
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use geo::{GeoIndex, GeoService};
pub use protocol::{Command, ParseError, ReplyValue, RequestParser};
pub use session::SessionRegistry;
pub use storage::{start_expiry_sweeper, StorageBackend, StorageEngine};

/// The default port geoproxy listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host geoproxy binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of geoproxy
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
