//! Connection Module
//!
//! Binds TCP clients to sessions. Each accepted socket gets its own task
//! that feeds reads to the [`SessionRegistry`](crate::session::SessionRegistry)
//! and a writer task that drains the session's replies back to the socket.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (main.rs)                                │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   For each client...   │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│  Registry   │───>│  Session    │     │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘     │
//! │                                               │ replies     │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Writer task │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
