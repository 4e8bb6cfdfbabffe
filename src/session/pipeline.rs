//! Ordered Response Pipeline
//!
//! Commands complete in any order; replies must leave in request order. Every
//! command gets a slot at the tail of a FIFO when it is dispatched. A slot is
//! filled once, by whoever produces the reply, and [`Pipeline::flush`] writes
//! the longest filled prefix of the queue.
//!
//! ```text
//!  head                                tail
//!   ┌─────┐   ┌─────┐   ┌─────┐   ┌─────┐
//!   │ #1 ✓│ → │ #2 ✓│ → │ #3 … │ → │ #4 ✓│
//!   └─────┘   └─────┘   └─────┘   └─────┘
//!   flush() sends #1, #2 and stops at #3; #4 waits for #3.
//! ```
//!
//! Locks: `pending` guards the queue and is held only to push or pop. `drain`
//! serialises flushers so two of them cannot interleave writes. A flusher
//! blocks on `drain` instead of skipping, so a reply filled while another
//! flush is in progress is never stranded.
//!
//! Whenever the queue runs empty, [`Pipeline::drained`] waiters are woken.

use crate::protocol::ReplyValue;
use crate::session::transport::Transport;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{trace, warn};

/// One in-flight command's reply slot.
#[derive(Debug)]
pub struct PendingEntry {
    seq: u64,
    reply: Mutex<Option<ReplyValue>>,
}

impl PendingEntry {
    fn new(seq: u64) -> Self {
        Self {
            seq,
            reply: Mutex::new(None),
        }
    }

    /// Position of the command in its session, starting at 1.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn is_filled(&self) -> bool {
        self.reply.lock().is_some()
    }
}

/// Per-session reply queue.
pub struct Pipeline {
    transport: Arc<dyn Transport>,
    next_seq: AtomicU64,
    pending: Mutex<VecDeque<Arc<PendingEntry>>>,
    drain: Mutex<()>,
    empty: Notify,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("next_seq", &self.next_seq.load(Ordering::Relaxed))
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

impl Pipeline {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            next_seq: AtomicU64::new(1),
            pending: Mutex::new(VecDeque::new()),
            drain: Mutex::new(()),
            empty: Notify::new(),
        }
    }

    /// Appends an unfilled slot. Sequence numbers increase by one per call.
    pub fn enqueue(&self) -> Arc<PendingEntry> {
        let mut pending = self.pending.lock();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(PendingEntry::new(seq));
        pending.push_back(entry.clone());
        entry
    }

    /// Stores the reply for `entry`. Returns false if it was already filled;
    /// the first reply wins.
    pub fn fill(&self, entry: &PendingEntry, reply: ReplyValue) -> bool {
        let mut slot = entry.reply.lock();
        if slot.is_some() {
            warn!(seq = entry.seq, "reply slot already filled, dropping");
            return false;
        }
        *slot = Some(reply);
        true
    }

    /// Sends every filled reply at the head of the queue, in order, as one
    /// write. Returns the number of replies sent.
    pub fn flush(&self) -> usize {
        let _drain = self.drain.lock();
        let mut out = Vec::new();
        let mut flushed = 0;

        loop {
            let head = {
                let mut pending = self.pending.lock();
                match pending.front() {
                    Some(entry) if entry.is_filled() => pending.pop_front(),
                    _ => None,
                }
            };
            let Some(entry) = head else {
                break;
            };
            let reply = entry.reply.lock().take();
            if let Some(reply) = reply {
                reply.serialize_into(&mut out);
                flushed += 1;
            }
        }

        if flushed > 0 {
            trace!(replies = flushed, bytes = out.len(), "flushed replies");
            self.transport.send(Bytes::from(out));
            if self.is_empty() {
                self.empty.notify_waiters();
            }
        }
        flushed
    }

    /// Drops every pending slot, filled or not. Waits for a running flush to
    /// finish so nothing is sent afterwards.
    pub fn clear(&self) -> usize {
        let _drain = self.drain.lock();
        let mut pending = self.pending.lock();
        let dropped = pending.len();
        pending.clear();
        self.empty.notify_waiters();
        dropped
    }

    /// Resolves once every enqueued slot has been sent or cleared.
    pub async fn drained(&self) {
        loop {
            let notified = self.empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Slots not yet flushed.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
