//! Incremental FIX stream parser.

use super::{FixMessage, SOH};

/// Accumulating parser for a FIX byte stream.
///
/// Feed every socket read into [`append_buffer`](FixParser::append_buffer),
/// then drain complete messages with
/// [`get_message`](FixParser::get_message) until it returns `None`. A
/// message split across any number of reads is reassembled; several
/// messages arriving in one read come out one call at a time.
#[derive(Debug, Default)]
pub struct FixParser {
    buffer: Vec<u8>,
}

impl FixParser {
    /// Create an empty parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes read from the socket
    pub fn append_buffer(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes currently buffered and not yet consumed
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Extract the next complete message, or `None` if the buffer does not
    /// yet hold one.
    ///
    /// A message is complete once the SOH terminating its CheckSum field
    /// (tag 10) has arrived. Leading bytes before the next `8=` are
    /// discarded so one garbled message cannot wedge the stream.
    pub fn get_message(&mut self) -> Option<FixMessage> {
        self.discard_leading_garbage();

        let end = self.find_message_end()?;
        let raw: Vec<u8> = self.buffer.drain(..end).collect();
        Some(parse_fields(&raw))
    }

    /// Drop anything buffered before the next `8=` message start.
    fn discard_leading_garbage(&mut self) {
        if self.buffer.starts_with(b"8=") || self.buffer.len() < 2 {
            return;
        }
        match find_subsequence(&self.buffer, &[SOH, b'8', b'=']) {
            Some(idx) => {
                self.buffer.drain(..=idx);
            }
            None => {
                // No message start in sight; keep the tail in case "8=" is
                // split across reads.
                let keep_from = self.buffer.len().saturating_sub(2);
                self.buffer.drain(..keep_from);
            }
        }
    }

    /// Offset one past the SOH that closes tag 10, if buffered.
    fn find_message_end(&self) -> Option<usize> {
        let marker_at = find_subsequence(&self.buffer, &[SOH, b'1', b'0', b'='])?;
        let value_start = marker_at + 4;
        let soh_off = self.buffer[value_start..].iter().position(|b| *b == SOH)?;
        Some(value_start + soh_off + 1)
    }
}

/// Split raw message bytes into fields. Fields without `=` or with a
/// non-numeric tag are skipped rather than failing the whole message.
fn parse_fields(raw: &[u8]) -> FixMessage {
    let mut msg = FixMessage::new();
    for field in raw.split(|b| *b == SOH) {
        if field.is_empty() {
            continue;
        }
        let Some(eq) = field.iter().position(|b| *b == b'=') else {
            continue;
        };
        let Ok(tag) = std::str::from_utf8(&field[..eq])
            .unwrap_or("")
            .parse::<u32>()
        else {
            continue;
        };
        msg.append_pair(tag, &field[eq + 1..]);
    }
    msg
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FixMessage {
        let mut msg = FixMessage::new();
        msg.append_pair(35, "A");
        msg.append_pair(49, "SENDER");
        msg.append_pair(56, "TARGET");
        msg.append_pair(34, "1");
        msg
    }

    #[test]
    fn test_roundtrip_single_message() {
        let encoded = sample().encode();

        let mut parser = FixParser::new();
        parser.append_buffer(&encoded);

        let parsed = parser.get_message().expect("complete message");
        assert_eq!(parsed.get_str(35), Some("A"));
        assert_eq!(parsed.get_str(49), Some("SENDER"));
        assert_eq!(parsed.get_str(8), Some("FIX.4.2"));
        assert!(parser.get_message().is_none());
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_partial_delivery() {
        let encoded = sample().encode();
        let (first, second) = encoded.split_at(encoded.len() / 2);

        let mut parser = FixParser::new();
        parser.append_buffer(first);
        assert!(parser.get_message().is_none());

        parser.append_buffer(second);
        let parsed = parser.get_message().expect("complete after second read");
        assert_eq!(parsed.get_str(35), Some("A"));
    }

    #[test]
    fn test_multiple_messages_one_read() {
        let mut bytes = sample().encode();
        let mut second = FixMessage::new();
        second.append_pair(35, "0");
        bytes.extend_from_slice(&second.encode());

        let mut parser = FixParser::new();
        parser.append_buffer(&bytes);

        assert_eq!(parser.get_message().unwrap().get_str(35), Some("A"));
        assert_eq!(parser.get_message().unwrap().get_str(35), Some("0"));
        assert!(parser.get_message().is_none());
    }

    #[test]
    fn test_leading_garbage_skipped() {
        let mut bytes = b"junk\x01".to_vec();
        bytes.extend_from_slice(&sample().encode());

        let mut parser = FixParser::new();
        parser.append_buffer(&bytes);

        let parsed = parser.get_message().expect("resynced on 8=");
        assert_eq!(parsed.get_str(35), Some("A"));
    }

    #[test]
    fn test_byte_at_a_time() {
        let encoded = sample().encode();
        let mut parser = FixParser::new();

        let mut got = None;
        for b in &encoded {
            parser.append_buffer(std::slice::from_ref(b));
            if let Some(msg) = parser.get_message() {
                got = Some(msg);
            }
        }
        assert_eq!(got.expect("parsed").get_str(56), Some("TARGET"));
    }
}
