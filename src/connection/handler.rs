//! Connection Handler Module
//!
//! Each client gets a reader loop and a writer task.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned; writer task spawned beside it
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐      ┌────────────────────────┐
//!    │      Reader loop             │      │     Writer task        │
//!    │                              │      │                        │
//!    │  read bytes from socket      │      │  Outbound::Reply ──>   │
//!    │         │                    │      │     write + flush      │
//!    │         ▼                    │      │  Outbound::Close ──>   │
//!    │  SessionRegistry::on_recv ───┼─ ─ ─>│     shutdown           │
//!    │         │  (replies flow     │      │                        │
//!    │         ▼   via channel)     │      └────────────────────────┘
//!    │    [Loop back]               │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. EOF / protocol error / I/O error
//!        │  (EOF only: wait for replies still in flight)
//!        ▼
//! 5. Session removed, writer drained and stopped
//! ```
//!
//! Reads are handed to the session as owned `Bytes` chunks; nothing is
//! copied until the parser extracts an argument.

use crate::protocol::ParseError;
use crate::session::{ChannelTransport, Outbound, SessionRegistry, Transport};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Read buffer capacity per socket read
const READ_CHUNK_SIZE: usize = 4096;

/// Added to the call budget when waiting for replies after EOF
const DRAIN_GRACE: Duration = Duration::from_millis(100);

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands dispatched
    pub commands_processed: AtomicU64,
    /// Connections dropped for malformed input
    pub protocol_errors: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn commands_processed(&self, count: usize) {
        self.commands_processed
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Errors that end a client connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed request stream
    #[error("protocol error: {0}")]
    Protocol(#[from] ParseError),

    /// Client disconnected normally
    #[error("client disconnected")]
    ClientDisconnected,
}

/// Handles a single client connection.
pub struct ConnectionHandler {
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        registry: Arc<SessionRegistry>,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream,
            addr,
            registry,
            stats,
        }
    }

    /// Runs the connection until the client leaves or misbehaves.
    pub async fn run(self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let ConnectionHandler {
            stream,
            addr,
            registry,
            stats,
        } = self;
        let (mut reader, writer) = stream.into_split();
        let (transport, rx) = ChannelTransport::new();
        let transport: Arc<dyn Transport> = Arc::new(transport);
        let writer_task = tokio::spawn(write_loop(writer, rx, addr, stats.clone()));

        let result = read_loop(&mut reader, addr, &registry, &transport, &stats).await;

        // EOF only ends the request stream; replies already owed still go out
        if matches!(result, Err(ConnectionError::ClientDisconnected)) {
            drain_session(&registry, addr).await;
        }

        registry.remove_session(&addr);
        transport.close();
        drop(transport);
        match writer_task.await {
            Ok(Err(e)) => debug!(client = %addr, error = %e, "Writer ended with error"),
            Err(e) => warn!(client = %addr, error = %e, "Writer task failed"),
            Ok(Ok(())) => {}
        }

        match &result {
            Ok(()) | Err(ConnectionError::ClientDisconnected) => {
                info!(client = %addr, "Client disconnected")
            }
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %addr, "Connection reset by client")
            }
            Err(ConnectionError::Protocol(_)) => stats.protocol_error(),
            Err(e) => warn!(client = %addr, error = %e, "Connection error"),
        }

        stats.connection_closed();
        result
    }
}

async fn read_loop(
    reader: &mut tokio::net::tcp::OwnedReadHalf,
    addr: SocketAddr,
    registry: &SessionRegistry,
    transport: &Arc<dyn Transport>,
    stats: &ConnectionStats,
) -> Result<(), ConnectionError> {
    let mut buffer = BytesMut::with_capacity(READ_CHUNK_SIZE);
    loop {
        buffer.reserve(READ_CHUNK_SIZE);
        let n = reader.read_buf(&mut buffer).await?;
        if n == 0 {
            return Err(ConnectionError::ClientDisconnected);
        }
        stats.bytes_read(n);
        trace!(client = %addr, bytes = n, "Read data");

        let chunk = buffer.split().freeze();
        let dispatched = registry.on_recv(addr, transport.clone(), chunk)?;
        stats.commands_processed(dispatched);
    }
}

/// Waits until the session has sent every reply it owes, bounded by how long
/// a backend call may take.
async fn drain_session(registry: &SessionRegistry, addr: SocketAddr) {
    let Some(session) = registry.get(&addr) else {
        return;
    };
    if session.pending_replies() == 0 {
        return;
    }

    let budget = registry.context().options().call_budget() + DRAIN_GRACE;
    debug!(client = %addr, pending = session.pending_replies(), "Draining replies after EOF");
    if tokio::time::timeout(budget, session.drained()).await.is_err() {
        warn!(
            client = %addr,
            pending = session.pending_replies(),
            "Replies still pending after EOF, dropping"
        );
    }
}

/// Writes replies until told to close or every sender is gone.
async fn write_loop(
    writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    addr: SocketAddr,
    stats: Arc<ConnectionStats>,
) -> Result<(), std::io::Error> {
    let mut writer = BufWriter::new(writer);
    while let Some(message) = rx.recv().await {
        let mut closing = false;
        let mut next = Some(message);
        // Batch whatever is already queued into one flush
        while let Some(message) = next {
            match message {
                Outbound::Reply(data) => {
                    writer.write_all(&data).await?;
                    stats.bytes_written(data.len());
                }
                Outbound::Close => {
                    closing = true;
                    break;
                }
            }
            next = rx.try_recv().ok();
        }
        writer.flush().await?;
        trace!(client = %addr, "Flushed replies");
        if closing {
            break;
        }
    }
    writer.shutdown().await
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, registry, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::Io(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}
