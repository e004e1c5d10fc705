//! Control channel: framing, message set, and the controller-side client.
//!
//! One TCP connection per controller carries every request, response, and
//! acknowledgement for that controller, as length-prefixed JSON frames:
//!
//! ```text
//! [4-byte big-endian payload length][UTF-8 JSON payload]
//! ```
//!
//! The channel is loopback-only and unauthenticated by design; hardening
//! it is explicitly out of scope.
//!
//! ```text
//! Controller                         Agent
//!     |                                |
//!     |---- client_create ----------->|
//!     |<--- client_created -----------|
//!     |                                |
//!     |---- client_connect ---------->|   (response deferred until the
//!     |<--- client_connected ---------|    connect outcome is observed)
//!     |                                |
//!     |---- server_accept ----------->|
//!     |<--- server_accepted ----------|
//!     |                                |
//!     |---- shutdown ---------------->|
//!     |<--- shutdown_ack -------------|
//! ```

pub mod frame;
mod controller;
mod message;

pub use controller::Controller;
pub use frame::{FrameDecoder, DEFAULT_MAX_FRAME_BYTES, HEADER_LEN};
pub use message::{Request, Response};
