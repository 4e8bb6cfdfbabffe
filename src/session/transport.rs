//! The outbound side of a client connection.
//!
//! A session never writes to a socket itself. It hands serialized replies to
//! a [`Transport`], which for TCP clients is a channel drained by the
//! connection's writer task.

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::trace;

/// Sink for serialized replies.
pub trait Transport: Send + Sync + 'static {
    /// Queues bytes for the client. Must not block.
    fn send(&self, data: Bytes);

    /// Asks the connection to close once queued bytes are written.
    fn close(&self);
}

/// Messages from a session to its connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Reply(Bytes),
    Close,
}

/// [`Transport`] over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, data: Bytes) {
        if self.tx.send(Outbound::Reply(data)).is_err() {
            trace!("writer gone, reply dropped");
        }
    }

    fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }
}
