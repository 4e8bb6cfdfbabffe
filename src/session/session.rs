//! Per-client session: parser, pipeline and dispatch glue.

use crate::commands::{dispatch, CommandContext, Reply};
use crate::protocol::{Command, ParseError, ReplyValue, RequestParser};
use crate::session::pipeline::{PendingEntry, Pipeline};
use crate::session::transport::Transport;
use bytes::Bytes;
use futures::FutureExt;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, trace};

/// State of one client connection.
///
/// Input arrives through [`Session::on_recv`]; replies leave through the
/// session's [`Transport`] in request order. Once [`Session::on_remove`] has
/// run, completions still in flight are discarded.
pub struct Session {
    remote: SocketAddr,
    parser: Mutex<RequestParser>,
    pipeline: Pipeline,
    transport: Arc<dyn Transport>,
    context: Arc<CommandContext>,
    removed: AtomicBool,
    /// Bumped on removal; completions carry the value they were issued under.
    generation: AtomicU64,
    this: Weak<Session>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("remote", &self.remote)
            .field("pipeline", &self.pipeline)
            .field("removed", &self.is_removed())
            .finish()
    }
}

impl Session {
    pub fn new(
        remote: SocketAddr,
        transport: Arc<dyn Transport>,
        context: Arc<CommandContext>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Session {
            remote,
            parser: Mutex::new(RequestParser::new()),
            pipeline: Pipeline::new(transport.clone()),
            transport,
            context,
            removed: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            this: this.clone(),
        })
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    /// Replies not yet written.
    pub fn pending_replies(&self) -> usize {
        self.pipeline.len()
    }

    /// Resolves once every dispatched command has had its reply sent, or the
    /// session was removed.
    pub async fn drained(&self) {
        self.pipeline.drained().await
    }

    /// Feeds a chunk of client bytes and dispatches every command it
    /// completes. Returns the number of commands dispatched.
    ///
    /// On a protocol error the parser and pipeline are reset and the error is
    /// returned; the caller is expected to remove the session.
    pub fn on_recv(&self, chunk: Bytes) -> Result<usize, ParseError> {
        if self.is_removed() {
            trace!(client = %self.remote, "input after removal ignored");
            return Ok(0);
        }

        let mut parser = self.parser.lock();
        parser.append(chunk);

        let mut dispatched = 0;
        loop {
            match parser.next_command() {
                Ok(Some(command)) => {
                    self.submit(command);
                    dispatched += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(client = %self.remote, error = %e, "protocol error");
                    parser.reset();
                    self.pipeline.clear();
                    return Err(e);
                }
            }
        }
        Ok(dispatched)
    }

    fn submit(&self, command: Command) {
        let entry = self.pipeline.enqueue();
        trace!(
            client = %self.remote,
            seq = entry.seq(),
            command = %command.name_lossy(),
            "dispatching"
        );

        match dispatch(&self.context, &command) {
            Reply::Ready(reply) => self.complete(&entry, reply),
            Reply::Pending(future) => {
                let session = self.this.clone();
                let generation = self.generation.load(Ordering::Acquire);
                let remote = self.remote;
                tokio::spawn(async move {
                    // A panicking handler still owes its slot a reply
                    let reply = match AssertUnwindSafe(future).catch_unwind().await {
                        Ok(reply) => reply,
                        Err(_) => {
                            error!(
                                client = %remote,
                                seq = entry.seq(),
                                "command handler panicked"
                            );
                            ReplyValue::error("ERR internal error")
                        }
                    };
                    match session.upgrade() {
                        Some(session) if session.is_current(generation) => {
                            session.complete(&entry, reply)
                        }
                        _ => trace!(seq = entry.seq(), "completion for removed session dropped"),
                    }
                });
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        !self.is_removed() && self.generation.load(Ordering::Acquire) == generation
    }

    fn complete(&self, entry: &PendingEntry, reply: ReplyValue) {
        if self.pipeline.fill(entry, reply) {
            self.pipeline.flush();
        }
    }

    /// Tears the session down. Later calls are no-ops. Returns true on the
    /// call that actually removed it.
    pub fn on_remove(&self) -> bool {
        if self.removed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.parser.lock().mark_removed();
        let dropped = self.pipeline.clear();
        debug!(client = %self.remote, dropped, "session removed");
        true
    }

    /// Asks the transport to close the connection.
    pub fn close(&self) {
        self.transport.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ProxyOptions;
    use crate::protocol::ParserState;
    use crate::session::transport::testing::RecordingTransport;
    use crate::storage::{BackendResult, StorageBackend, StorageEngine};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn addr() -> SocketAddr {
        "127.0.0.1:5000".parse().unwrap()
    }

    fn session_with(backend: Arc<dyn StorageBackend>) -> (Arc<RecordingTransport>, Arc<Session>) {
        let transport = Arc::new(RecordingTransport::default());
        let ctx = Arc::new(CommandContext::new(backend, ProxyOptions::default()));
        let session = Session::new(addr(), transport.clone(), ctx);
        (transport, session)
    }

    async fn wait_for(transport: &RecordingTransport, expected: &str) {
        for _ in 0..200 {
            if transport.sent_string() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(transport.sent_string(), expected);
    }

    /// Holds GETs until released, so tests control completion order.
    struct GatedBackend {
        inner: StorageEngine,
        gate: Notify,
    }

    #[async_trait]
    impl StorageBackend for GatedBackend {
        async fn put(&self, key: Bytes, value: Bytes, ts: u64) -> BackendResult<()> {
            self.inner.put(key, value, ts).await
        }
        async fn get(&self, key: Bytes) -> BackendResult<Bytes> {
            self.gate.notified().await;
            self.inner.get(key).await
        }
        async fn remove(&self, key: Bytes) -> BackendResult<()> {
            StorageBackend::remove(&self.inner, key).await
        }
        async fn ttl(&self, key: Bytes) -> BackendResult<i64> {
            self.inner.ttl(key).await
        }
    }

    /// Panics on every GET.
    struct PanickingBackend {
        inner: StorageEngine,
    }

    #[async_trait]
    impl StorageBackend for PanickingBackend {
        async fn put(&self, key: Bytes, value: Bytes, ts: u64) -> BackendResult<()> {
            self.inner.put(key, value, ts).await
        }
        async fn get(&self, _key: Bytes) -> BackendResult<Bytes> {
            panic!("backend bug")
        }
        async fn remove(&self, key: Bytes) -> BackendResult<()> {
            StorageBackend::remove(&self.inner, key).await
        }
        async fn ttl(&self, key: Bytes) -> BackendResult<i64> {
            self.inner.ttl(key).await
        }
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (transport, session) = session_with(Arc::new(StorageEngine::new()));
        let n = session
            .on_recv(Bytes::from_static(
                b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n",
            ))
            .unwrap();
        assert_eq!(n, 2);
        wait_for(&transport, "+OK\r\n$1\r\nv\r\n").await;
    }

    #[tokio::test]
    async fn test_split_command_across_chunks() {
        let (transport, session) = session_with(Arc::new(StorageEngine::new()));
        assert_eq!(session.on_recv(Bytes::from_static(b"*2\r\n$3\r\nGE")).unwrap(), 0);
        assert_eq!(session.on_recv(Bytes::from_static(b"T\r\n$1\r\nk\r\n")).unwrap(), 1);
        wait_for(&transport, "$-1\r\n").await;
    }

    #[tokio::test]
    async fn test_ready_reply_waits_behind_pending() {
        let backend = Arc::new(GatedBackend {
            inner: StorageEngine::new(),
            gate: Notify::new(),
        });
        let (transport, session) = session_with(backend.clone());

        // GET blocks on the gate; the unknown command is answered at once
        session
            .on_recv(Bytes::from_static(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n*1\r\n$4\r\nNOPE\r\n"))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(transport.sent().is_empty());
        assert_eq!(session.pending_replies(), 2);

        backend.gate.notify_one();
        wait_for(&transport, "$-1\r\n-ERR unknown command 'NOPE'\r\n").await;
    }

    #[tokio::test]
    async fn test_panicking_handler_still_replies() {
        let (transport, session) = session_with(Arc::new(PanickingBackend {
            inner: StorageEngine::new(),
        }));
        session
            .on_recv(Bytes::from_static(
                b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n*2\r\n$3\r\nTTL\r\n$1\r\nk\r\n",
            ))
            .unwrap();
        wait_for(&transport, "-ERR internal error\r\n:-2\r\n").await;
        assert_eq!(session.pending_replies(), 0);
    }

    #[tokio::test]
    async fn test_drained_after_pending_reply() {
        let backend = Arc::new(GatedBackend {
            inner: StorageEngine::new(),
            gate: Notify::new(),
        });
        let (transport, session) = session_with(backend.clone());
        session
            .on_recv(Bytes::from_static(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n"))
            .unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(30), session.drained()).await;
        assert!(waiting.is_err());

        backend.gate.notify_one();
        tokio::time::timeout(Duration::from_secs(1), session.drained())
            .await
            .unwrap();
        assert_eq!(transport.sent_string(), "$-1\r\n");
    }

    #[tokio::test]
    async fn test_protocol_error_resets() {
        let (transport, session) = session_with(Arc::new(StorageEngine::new()));
        let err = session.on_recv(Bytes::from_static(b"*0\r\n"));
        assert!(matches!(err, Err(ParseError::InvalidArraySize(_))));
        assert_eq!(session.pending_replies(), 0);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_late_completion_after_remove_is_dropped() {
        let backend = Arc::new(GatedBackend {
            inner: StorageEngine::new(),
            gate: Notify::new(),
        });
        let (transport, session) = session_with(backend.clone());

        session
            .on_recv(Bytes::from_static(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n"))
            .unwrap();
        assert!(session.on_remove());
        assert!(!session.on_remove());
        assert_eq!(session.parser.lock().state(), ParserState::Removed);

        backend.gate.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(transport.sent().is_empty());

        // Input after removal is ignored
        assert_eq!(
            session
                .on_recv(Bytes::from_static(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n"))
                .unwrap(),
            0
        );
    }
}
