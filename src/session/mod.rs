//! Session Module
//!
//! A session is everything the proxy knows about one client: its parser,
//! its reply pipeline and the transport its replies go out on.
//!
//! ## Flow
//!
//! ```text
//!   bytes ──> SessionRegistry::on_recv ──> Session::on_recv
//!                                               │ parse
//!                                               ▼
//!                                   Pipeline::enqueue (slot #n)
//!                                               │ dispatch
//!                          ┌────────────────────┴───────────────┐
//!                          ▼                                    ▼
//!                    Reply::Ready                        Reply::Pending
//!                    fill + flush now             spawned task awaits backend,
//!                                                 then fill + flush (if session
//!                                                 still current)
//!                                               │
//!                                               ▼
//!                                     Transport::send (in order)
//! ```

pub mod pipeline;
#[allow(clippy::module_inception)]
pub mod session;
pub mod registry;
pub mod transport;

pub use pipeline::{PendingEntry, Pipeline};
pub use registry::SessionRegistry;
pub use session::Session;
pub use transport::{ChannelTransport, Outbound, Transport};
