//! Session registry.

use std::collections::HashMap;

use crate::error::{AgentError, Result};

use super::{AcceptedSession, ClientSession, ServerSession};

/// Owns the mapping from session name to session object.
///
/// Client and server names are independent namespaces - a client and a
/// server may share a name. Accepted-session names are globally unique,
/// since accept returns them for use independent of the owning server.
/// The registry is the sole authority that creates or removes socket
/// ownership; removal hands the session back to the caller for teardown.
#[derive(Debug, Default)]
pub struct Registry {
    clients: HashMap<String, ClientSession>,
    servers: HashMap<String, ServerSession>,
    accepted: HashMap<String, AcceptedSession>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client session.
    pub fn create_client(&mut self, name: &str) -> Result<&mut ClientSession> {
        if self.clients.contains_key(name) {
            return Err(AgentError::NameInUse(format!("client '{name}'")));
        }
        Ok(self
            .clients
            .entry(name.to_string())
            .or_insert_with(|| ClientSession::new(name)))
    }

    /// Look up a client session.
    pub fn client(&self, name: &str) -> Result<&ClientSession> {
        self.clients
            .get(name)
            .ok_or_else(|| AgentError::NotFound(format!("client '{name}'")))
    }

    /// Look up a client session, mutably.
    pub fn client_mut(&mut self, name: &str) -> Result<&mut ClientSession> {
        self.clients
            .get_mut(name)
            .ok_or_else(|| AgentError::NotFound(format!("client '{name}'")))
    }

    /// Unregister a client session and hand it back for teardown.
    pub fn remove_client(&mut self, name: &str) -> Result<ClientSession> {
        self.clients
            .remove(name)
            .ok_or_else(|| AgentError::NotFound(format!("client '{name}'")))
    }

    /// Register a new server session.
    pub fn create_server(&mut self, name: &str) -> Result<&mut ServerSession> {
        if self.servers.contains_key(name) {
            return Err(AgentError::NameInUse(format!("server '{name}'")));
        }
        Ok(self
            .servers
            .entry(name.to_string())
            .or_insert_with(|| ServerSession::new(name)))
    }

    /// Look up a server session.
    pub fn server(&self, name: &str) -> Result<&ServerSession> {
        self.servers
            .get(name)
            .ok_or_else(|| AgentError::NotFound(format!("server '{name}'")))
    }

    /// Look up a server session, mutably.
    pub fn server_mut(&mut self, name: &str) -> Result<&mut ServerSession> {
        self.servers
            .get_mut(name)
            .ok_or_else(|| AgentError::NotFound(format!("server '{name}'")))
    }

    /// Unregister a server session and hand it back for teardown.
    pub fn remove_server(&mut self, name: &str) -> Result<ServerSession> {
        self.servers
            .remove(name)
            .ok_or_else(|| AgentError::NotFound(format!("server '{name}'")))
    }

    /// Whether an accepted-session name is still free.
    pub fn accepted_name_free(&self, name: &str) -> bool {
        !self.accepted.contains_key(name)
    }

    /// Register an accepted session under its globally unique name.
    pub fn insert_accepted(&mut self, session: AcceptedSession) -> Result<()> {
        let name = session.name().to_string();
        if self.accepted.contains_key(&name) {
            return Err(AgentError::NameInUse(format!("accepted session '{name}'")));
        }
        self.accepted.insert(name, session);
        Ok(())
    }

    /// Look up an accepted session.
    pub fn accepted(&self, name: &str) -> Result<&AcceptedSession> {
        self.accepted
            .get(name)
            .ok_or_else(|| AgentError::NotFound(format!("accepted session '{name}'")))
    }

    /// Look up an accepted session, mutably.
    pub fn accepted_mut(&mut self, name: &str) -> Result<&mut AcceptedSession> {
        self.accepted
            .get_mut(name)
            .ok_or_else(|| AgentError::NotFound(format!("accepted session '{name}'")))
    }

    /// Unregister an accepted session and hand it back for teardown.
    pub fn remove_accepted(&mut self, name: &str) -> Result<AcceptedSession> {
        self.accepted
            .remove(name)
            .ok_or_else(|| AgentError::NotFound(format!("accepted session '{name}'")))
    }

    /// Registered session counts as (clients, servers, accepted).
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.clients.len(), self.servers.len(), self.accepted.len())
    }

    /// Remove and return every session, for shutdown teardown.
    pub fn drain(
        &mut self,
    ) -> (
        Vec<ClientSession>,
        Vec<ServerSession>,
        Vec<AcceptedSession>,
    ) {
        (
            self.clients.drain().map(|(_, s)| s).collect(),
            self.servers.drain().map(|(_, s)| s).collect(),
            self.accepted.drain().map(|(_, s)| s).collect(),
        )
    }
}
