//! # fixmux - FIX session agent
//!
//! A background agent that emulates FIX protocol network endpoints -
//! outbound clients, listening servers, and accepted server-side
//! connections - on behalf of a controller process, and exposes all of
//! them through one multiplexed control channel. A test harness drives
//! many simultaneous FIX connections without managing a single raw socket
//! itself.
//!
//! ## Architecture
//!
//! ```text
//! Controller (test harness)          fixmux agent              FIX peers
//!       |                               |                          |
//!       |== control channel (TCP) =====>|                          |
//!       |   length-prefixed JSON        |                          |
//!       |                               |-- client sockets ------->|
//!       |                               |<- server listeners ------|
//!       |                               |<- accepted sockets ----->|
//! ```
//!
//! One TCP connection carries every control request and response as
//! `[4-byte big-endian length][UTF-8 JSON]` frames. The agent decodes
//! each frame, routes it to the named session, performs the socket
//! operation, and answers with exactly one correlated response frame.
//! Inbound FIX traffic is parsed per connection and queued per session,
//! to be polled off with receive requests.
//!
//! ## Session model
//!
//! | Kind     | Socket               | Created by        | Destroyed by     |
//! |----------|----------------------|-------------------|------------------|
//! | Client   | one outbound TCP     | `client_create`   | `client_destroy` |
//! | Server   | n listening sockets  | `server_create`   | `server_destroy` |
//! | Accepted | one accepted TCP     | `server_accept`   | `server_destroy` |
//!
//! Session names are caller-assigned. Client and server names are
//! independent namespaces; accepted-session names are globally unique.
//! Nothing is destroyed implicitly - destruction is always an explicit
//! control request, and double-destroy is an error.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use fixmux::{Agent, Config, Controller, FixMessage};
//!
//! // Agent side (usually the `fixmux agent` binary):
//! let agent = Agent::bind(Config::default()).await?;
//! let addr = agent.local_addr()?;
//! tokio::spawn(agent.run());
//!
//! // Controller side:
//! let mut ctl = Controller::connect(addr).await?;
//! ctl.server_create("s1").await?;
//! let port = ctl.server_listen("s1", 0).await?;
//! ctl.client_create("c1").await?;
//! ctl.client_connect("c1", "127.0.0.1", port).await?;
//! ctl.server_accept("s1", "cs1").await?;
//!
//! let mut logon = FixMessage::new();
//! logon.append_pair(35, "A");
//! ctl.client_send("c1", &logon).await?;
//! ```
//!
//! ## Modules
//!
//! - [`agent`]: agent facade and event loop
//! - [`control`]: control-channel framing, message set, controller client
//! - [`session`]: session objects and registry
//! - [`fix`]: FIX tag=value wire codec
//! - [`config`]: configuration management
//! - [`error`]: error types and result alias

pub mod agent;
pub mod config;
pub mod control;
pub mod error;
pub mod fix;
pub mod session;

// Re-exports for convenience
pub use agent::Agent;
pub use config::Config;
pub use control::{Controller, FrameDecoder, Request, Response};
pub use error::{AgentError, Result};
pub use fix::{FixMessage, FixParser};
pub use session::{AcceptedSession, ClientSession, Registry, ServerSession, SessionState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
