//! Session Registry
//!
//! Maps remote endpoints to their sessions. The connection layer reports
//! input and disconnects by address; the registry finds (or creates) the
//! session and forwards.

use crate::commands::CommandContext;
use crate::protocol::ParseError;
use crate::session::session::Session;
use crate::session::transport::Transport;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// All live sessions of one proxy instance.
pub struct SessionRegistry {
    context: Arc<CommandContext>,
    sessions: RwLock<HashMap<SocketAddr, Arc<Session>>>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .finish()
    }
}

impl SessionRegistry {
    pub fn new(context: Arc<CommandContext>) -> Self {
        Self {
            context,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &Arc<CommandContext> {
        &self.context
    }

    /// Returns the session for `remote`, creating it with `transport` if
    /// none exists. At most one session is ever created per address.
    pub fn get_or_create(&self, remote: SocketAddr, transport: Arc<dyn Transport>) -> Arc<Session> {
        if let Some(session) = self.sessions.read().get(&remote) {
            return session.clone();
        }

        let mut sessions = self.sessions.write();
        sessions
            .entry(remote)
            .or_insert_with(|| {
                debug!(client = %remote, "session created");
                Session::new(remote, transport, self.context.clone())
            })
            .clone()
    }

    pub fn get(&self, remote: &SocketAddr) -> Option<Arc<Session>> {
        self.sessions.read().get(remote).cloned()
    }

    /// Feeds input to the session for `remote`.
    ///
    /// A protocol error removes the session and closes its connection; the
    /// error is returned for the caller's bookkeeping.
    pub fn on_recv(
        &self,
        remote: SocketAddr,
        transport: Arc<dyn Transport>,
        chunk: Bytes,
    ) -> Result<usize, ParseError> {
        let session = self.get_or_create(remote, transport);
        match session.on_recv(chunk) {
            Ok(n) => Ok(n),
            Err(e) => {
                warn!(client = %remote, error = %e, "protocol error, closing connection");
                self.remove_session(&remote);
                session.close();
                Err(e)
            }
        }
    }

    /// Removes and tears down the session for `remote`. Returns false if
    /// there was none.
    pub fn remove_session(&self, remote: &SocketAddr) -> bool {
        let removed = self.sessions.write().remove(remote);
        match removed {
            Some(session) => {
                session.on_remove();
                info!(client = %remote, "session closed");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
