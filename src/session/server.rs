//! Server sessions and their accepted connections.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use crate::error::{AgentError, Result};
use crate::fix::{FixMessage, FixParser};

use super::SessionState;

/// An advertised FIX server endpoint.
///
/// May listen on several ports concurrently; each bound port is serviced
/// by one accept-loop task whose handle is kept here. Inbound connections
/// queue in arrival order until the controller promotes them by name, and
/// accepted sessions remain tied to this server for lifetime purposes -
/// destroying the server destroys them first.
#[derive(Debug)]
pub struct ServerSession {
    name: String,
    listeners: BTreeMap<u16, JoinHandle<()>>,
    pending: VecDeque<TcpStream>,
    accepted_names: BTreeSet<String>,
}

impl ServerSession {
    /// Create a session with no ports bound.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            listeners: BTreeMap::new(),
            pending: VecDeque::new(),
            accepted_names: BTreeSet::new(),
        }
    }

    /// Session name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Listening` while at least one port is bound, else `Created`.
    pub fn state(&self) -> SessionState {
        if self.listeners.is_empty() {
            SessionState::Created
        } else {
            SessionState::Listening
        }
    }

    /// Record a newly bound port and its accept-loop task.
    pub fn add_listener(&mut self, port: u16, handle: JoinHandle<()>) -> Result<()> {
        if self.listeners.contains_key(&port) {
            handle.abort();
            return Err(AgentError::NameInUse(format!(
                "Server '{}' already listens on port {port}",
                self.name
            )));
        }
        self.listeners.insert(port, handle);
        Ok(())
    }

    /// Stop the accept loop for `port` and release it.
    pub fn remove_listener(&mut self, port: u16) -> Result<()> {
        match self.listeners.remove(&port) {
            Some(handle) => {
                handle.abort();
                Ok(())
            }
            None => Err(AgentError::NotFound(format!(
                "Server '{}' has no listener on port {port}",
                self.name
            ))),
        }
    }

    /// Ports currently bound, ascending
    pub fn listen_ports(&self) -> Vec<u16> {
        self.listeners.keys().copied().collect()
    }

    /// Queue an inbound connection awaiting accept.
    pub fn push_pending(&mut self, stream: TcpStream) {
        self.pending.push_back(stream);
    }

    /// Connections awaiting accept
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Take the oldest pending connection (FIFO).
    pub fn pop_pending(&mut self) -> Result<TcpStream> {
        self.pending.pop_front().ok_or_else(|| {
            AgentError::NoPendingConnection(format!(
                "Server '{}' has no pending connection",
                self.name
            ))
        })
    }

    /// Record ownership of an accepted session.
    pub fn add_accepted(&mut self, session_name: &str) {
        self.accepted_names.insert(session_name.to_string());
    }

    /// Drop ownership of an accepted session (it was destroyed).
    pub fn remove_accepted(&mut self, session_name: &str) {
        self.accepted_names.remove(session_name);
    }

    /// Names of the accepted sessions this server owns, ascending
    pub fn accepted_names(&self) -> Vec<String> {
        self.accepted_names.iter().cloned().collect()
    }

    /// Abort every accept loop and drop every pending socket. Idempotent.
    pub fn teardown(&mut self) {
        for (_, handle) in std::mem::take(&mut self.listeners) {
            handle.abort();
        }
        self.pending.clear();
    }
}

/// A live server-side session, promoted from a pending connection.
#[derive(Debug)]
pub struct AcceptedSession {
    name: String,
    server_name: String,
    state: SessionState,
    writer: Option<OwnedWriteHalf>,
    reader: Option<JoinHandle<()>>,
    parser: FixParser,
    queue: VecDeque<FixMessage>,
}

impl AcceptedSession {
    /// Create a session already connected: accept hands over a live
    /// socket's write half and reader task.
    pub fn new(
        name: &str,
        server_name: &str,
        writer: OwnedWriteHalf,
        reader: JoinHandle<()>,
    ) -> Self {
        Self {
            name: name.to_string(),
            server_name: server_name.to_string(),
            state: SessionState::Connected,
            writer: Some(writer),
            reader: Some(reader),
            parser: FixParser::new(),
            queue: VecDeque::new(),
        }
    }

    /// Accepted session name (globally unique)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the owning server session
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connectivity flag. Reads state only - no I/O happens here.
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Write half of the socket, if still connected
    pub fn writer_mut(&mut self) -> Option<&mut OwnedWriteHalf> {
        self.writer.as_mut()
    }

    /// Close the socket and flip the connectivity flag.
    pub fn mark_disconnected(&mut self) {
        self.teardown();
        self.state = SessionState::Disconnected;
    }

    /// Release the socket: abort the reader task and drop the write half.
    /// Idempotent.
    pub fn teardown(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.writer = None;
    }

    /// Feed raw socket bytes through the parser, appending complete
    /// messages to the inbound queue in arrival order. Returns how many
    /// messages were drained.
    pub fn push_bytes(&mut self, data: &[u8]) -> usize {
        self.parser.append_buffer(data);
        let mut drained = 0;
        while let Some(message) = self.parser.get_message() {
            self.queue.push_back(message);
            drained += 1;
        }
        drained
    }

    /// Unconsumed inbound messages
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Pop the oldest inbound message
    pub fn pop_message(&mut self) -> Option<FixMessage> {
        self.queue.pop_front()
    }
}
