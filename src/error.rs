//! fixmux error types.
//!
//! Every registry- and session-level failure is represented here so the
//! agent facade can convert it into a `result=false` response frame with a
//! human-readable message. Only two variants are fatal for a control
//! connection: [`AgentError::Protocol`] (oversized or corrupt frame) and
//! [`AgentError::Decode`] (malformed JSON payload). Everything else leaves
//! the connection and all sessions untouched.

use thiserror::Error;

/// fixmux errors.
#[derive(Error, Debug)]
pub enum AgentError {
    /// A session with this name is already registered.
    #[error("Name already in use: {0}")]
    NameInUse(String),

    /// No session, listen port, or queued message matches the request.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Destroy targeted a session that is no longer registered.
    #[error("Already destroyed: {0}")]
    AlreadyDestroyed(String),

    /// Transport-level connect failure (refused, timeout, unreachable).
    #[error("Connect error: {0}")]
    Connect(String),

    /// Accept was requested but the server's pending queue is empty.
    #[error("No pending connection: {0}")]
    NoPendingConnection(String),

    /// Control-channel framing violation. Fatal for that connection.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Malformed JSON on the control channel. Fatal for that connection.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Unrecognised `type` discriminator in a control message.
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    /// The agent answered a request with `result=false`.
    ///
    /// Only produced on the controller side, when a response frame carries
    /// a failure outcome.
    #[error("Request refused: {0}")]
    Refused(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for fixmux operations
pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    /// Whether this error must terminate the control connection it arose on.
    ///
    /// Framing corruption cannot be locally recovered: once the length
    /// prefix or JSON text is bad, every later byte boundary is suspect.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(self, AgentError::Protocol(_) | AgentError::Decode(_))
    }
}
