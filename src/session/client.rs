//! Outbound client sessions.

use std::collections::VecDeque;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::task::JoinHandle;

use crate::error::{AgentError, Result};
use crate::fix::{FixMessage, FixParser};

use super::SessionState;

/// An outbound FIX client session.
///
/// Owns the socket's write half once connected; the read half lives in a
/// reader task whose handle is kept here so teardown can abort it. Inbound
/// bytes are parsed and queued by the agent loop via
/// [`push_bytes`](ClientSession::push_bytes).
#[derive(Debug)]
pub struct ClientSession {
    name: String,
    state: SessionState,
    writer: Option<OwnedWriteHalf>,
    reader: Option<JoinHandle<()>>,
    parser: FixParser,
    queue: VecDeque<FixMessage>,
}

impl ClientSession {
    /// Create a session in the `Created` state, no socket attached.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: SessionState::Created,
            writer: None,
            reader: None,
            parser: FixParser::new(),
            queue: VecDeque::new(),
        }
    }

    /// Session name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connectivity flag. Reads state only - no I/O happens here.
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Record that a connect has been issued. Fails unless the session is
    /// idle (`Created` or `Disconnected` - retry after failure or
    /// disconnect is caller-driven).
    pub fn begin_connect(&mut self) -> Result<()> {
        match self.state {
            SessionState::Created | SessionState::Disconnected => {
                self.state = SessionState::Connecting;
                Ok(())
            }
            SessionState::Connecting => Err(AgentError::Connect(format!(
                "Client '{}' already has a connect in flight",
                self.name
            ))),
            _ => Err(AgentError::Connect(format!(
                "Client '{}' is already connected",
                self.name
            ))),
        }
    }

    /// Connect outcome: failure. State returns to `Created` so the caller
    /// may retry.
    pub fn connect_failed(&mut self) {
        self.state = SessionState::Created;
    }

    /// Connect outcome: success. Takes ownership of the write half and the
    /// reader-task handle.
    pub fn attach(&mut self, writer: OwnedWriteHalf, reader: JoinHandle<()>) {
        self.writer = Some(writer);
        self.reader = Some(reader);
        self.state = SessionState::Connected;
    }

    /// Write half of the connected socket, if any
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_created_and_unconnected() {
        let session = ClientSession::new("c1");
        assert_eq!(session.name(), "c1");
        assert_eq!(session.state(), SessionState::Created);
        assert!(!session.is_connected());
        assert_eq!(session.queue_len(), 0);
    }

    #[test]
    fn test_begin_connect_transitions() {
        let mut session = ClientSession::new("c1");
        session.begin_connect().unwrap();
        assert_eq!(session.state(), SessionState::Connecting);

        // A second connect while one is in flight is refused.
        let err = session.begin_connect().unwrap_err();
        assert!(err.to_string().contains("in flight"));
    }

    #[test]
    fn test_connect_failure_returns_to_created() {
        let mut session = ClientSession::new("c1");
        session.begin_connect().unwrap();
        session.connect_failed();
        assert_eq!(session.state(), SessionState::Created);
        // Retry is allowed.
        session.begin_connect().unwrap();
    }

    #[test]
    fn test_push_bytes_queues_in_order() {
        let mut session = ClientSession::new("c1");

        let mut first = FixMessage::new();
        first.append_pair(35, "A");
        let mut second = FixMessage::new();
        second.append_pair(35, "0");

        let mut bytes = first.encode();
        bytes.extend_from_slice(&second.encode());

        assert_eq!(session.push_bytes(&bytes), 2);
        assert_eq!(session.queue_len(), 2);
        assert_eq!(session.pop_message().unwrap().get_str(35), Some("A"));
        assert_eq!(session.pop_message().unwrap().get_str(35), Some("0"));
        assert!(session.pop_message().is_none());
    }

    #[test]
    fn test_push_bytes_partial_message() {
        let mut session = ClientSession::new("c1");
        let mut msg = FixMessage::new();
        msg.append_pair(35, "D");
        let encoded = msg.encode();

        let (a, b) = encoded.split_at(5);
        assert_eq!(session.push_bytes(a), 0);
        assert_eq!(session.push_bytes(b), 1);
        assert_eq!(session.queue_len(), 1);
    }
}
