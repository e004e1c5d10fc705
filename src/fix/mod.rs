//! FIX tag=value wire codec.
//!
//! Converts raw FIX byte streams to and from discrete messages. The agent
//! core treats this module as a collaborator with three entry points:
//! [`FixParser::append_buffer`], [`FixParser::get_message`], and
//! [`FixMessage::encode`] - the incremental interface needed for
//! partial-read accumulation on non-blocking sockets.
//!
//! # Wire format
//!
//! A FIX message is a sequence of `tag=value` fields separated by the SOH
//! byte (0x01):
//!
//! ```text
//! 8=FIX.4.2|9=61|35=A|49=SENDER|56=TARGET|34=1|10=123|      (| is SOH)
//! ```
//!
//! Tag 8 (BeginString) opens the message, tag 9 (BodyLength) counts the
//! bytes between itself and tag 10 (CheckSum), and tag 10 closes it with a
//! modulo-256 sum of everything before it. [`FixMessage::encode`] generates
//! 9 and 10; callers set the rest.
//!
//! Session-level semantics (sequence numbers, logon, resend) are not
//! interpreted here - this codec only finds message boundaries and splits
//! fields.

mod message;
mod parser;

pub use message::FixMessage;
pub use parser::FixParser;

/// Field separator byte between FIX fields.
pub const SOH: u8 = 0x01;

/// BeginString used when a message is encoded without tag 8.
pub const DEFAULT_BEGIN_STRING: &str = "FIX.4.2";
