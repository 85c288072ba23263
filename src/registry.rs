//! Session registry: who is online
//!
//! The single shared mutable structure in the system. It is owned
//! exclusively by the `RelayServer` actor, so every operation here is
//! atomic without locks; handlers reach it only through server commands.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::Reject;
use crate::session::Session;
use crate::types::ClientId;

/// Thread-safe-by-ownership mapping of live connections to display names
///
/// Insertion order is preserved for roster snapshots; the order is stable
/// while membership is unchanged but not semantically significant to
/// clients.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<ClientId, Session>,
    /// Insertion order of currently registered connections
    order: Vec<ClientId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection with no name
    ///
    /// Idempotent: registering an already-present connection is a no-op
    /// (the existing entry and its name are kept).
    pub fn register(&mut self, id: ClientId, sender: mpsc::Sender<String>) {
        if self.sessions.contains_key(&id) {
            debug!("Connection {} already registered", id);
            return;
        }
        self.sessions.insert(id, Session::new(id, sender));
        self.order.push(id);
    }

    /// Store a display name for a connection
    ///
    /// Blank names are rejected. Returns the previous name (None on first
    /// registration) so the caller can announce renames. Unknown
    /// connections also get `InvalidName`; nothing to attach the name to.
    pub fn set_name(&mut self, id: ClientId, name: &str) -> Result<Option<String>, Reject> {
        if name.trim().is_empty() {
            return Err(Reject::InvalidName);
        }
        let session = self.sessions.get_mut(&id).ok_or(Reject::InvalidName)?;
        Ok(session.set_name(name.to_string()))
    }

    /// Remove a connection, returning its name if one was registered
    ///
    /// Idempotent: removing an absent connection returns None.
    pub fn remove(&mut self, id: ClientId) -> Option<String> {
        let session = self.sessions.remove(&id)?;
        self.order.retain(|other| *other != id);
        session.name
    }

    /// Point-in-time copy of all registered names, in insertion order
    pub fn snapshot_names(&self) -> Vec<String> {
        self.order
            .iter()
            .filter_map(|id| self.sessions.get(id))
            .filter_map(|session| session.name.clone())
            .collect()
    }

    /// Point-in-time copy of all connection ids, named or not
    ///
    /// Fan-out targets every registered connection, including those that
    /// have not yet completed SET_NAME.
    pub fn all_connections(&self) -> Vec<ClientId> {
        self.order.clone()
    }

    /// Look up a session by id
    pub fn get(&self, id: ClientId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Whether a connection has completed name registration
    pub fn is_named(&self, id: ClientId) -> bool {
        self.sessions.get(&id).is_some_and(Session::is_named)
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every session (shutdown path)
    ///
    /// Dropping the outbound senders ends each connection's write task,
    /// which closes the socket.
    pub fn clear(&mut self) {
        self.sessions.clear();
        self.order.clear();
    }
}
