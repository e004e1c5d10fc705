//! Control-channel frame codec.
//!
//! Wire format: a 4-byte big-endian unsigned length followed by that many
//! payload bytes (UTF-8 JSON). The length counts payload bytes only, never
//! the header itself.

use bytes::{Buf, BytesMut};

use crate::error::{AgentError, Result};

/// Length prefix size in bytes.
pub const HEADER_LEN: usize = 4;

/// Default cap on a single frame payload.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Encode one payload into a framed buffer.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Accumulating decoder for a framed byte stream.
///
/// Feed every read into [`extend`](FrameDecoder::extend) and drain complete
/// payloads with [`next_frame`](FrameDecoder::next_frame). Handles a frame
/// split across many reads and several frames arriving in one read. An
/// announced length above the configured maximum is a [`AgentError::Protocol`]
/// and leaves the decoder unusable - framing corruption is unrecoverable
/// per connection.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_frame_bytes: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameDecoder {
    /// Create a decoder enforcing the given payload cap
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_frame_bytes,
        }
    }

    /// Append bytes read from the socket
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extract the next complete payload, or `Ok(None)` if more bytes are
    /// needed. The buffer is left untouched until a whole frame is present.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut len_bytes = [0u8; HEADER_LEN];
        len_bytes.copy_from_slice(&self.buffer[..HEADER_LEN]);
        let payload_len = u32::from_be_bytes(len_bytes) as usize;

        if payload_len > self.max_frame_bytes {
            return Err(AgentError::Protocol(format!(
                "Frame length {payload_len} exceeds maximum {}",
                self.max_frame_bytes
            )));
        }

        if self.buffer.len() < HEADER_LEN + payload_len {
            return Ok(None);
        }

        self.buffer.advance(HEADER_LEN);
        let payload = self.buffer.split_to(payload_len).to_vec();
        Ok(Some(payload))
    }

    /// Bytes buffered but not yet consumed
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_header() {
        let framed = encode(b"hello");
        assert_eq!(&framed[..4], &[0, 0, 0, 5]);
        assert_eq!(&framed[4..], b"hello");
    }

    #[test]
    fn test_roundtrip_single_frame() {
        let mut decoder = FrameDecoder::default();
        decoder.extend(&encode(br#"{"type":"shutdown"}"#));

        let payload = decoder.next_frame().unwrap().expect("complete frame");
        assert_eq!(payload, br#"{"type":"shutdown"}"#);
        assert!(decoder.next_frame().unwrap().is_none());
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_frame_split_across_reads() {
        let framed = encode(b"split me");
        let (a, b) = framed.split_at(3); // split inside the header

        let mut decoder = FrameDecoder::default();
        decoder.extend(a);
        assert!(decoder.next_frame().unwrap().is_none());
        assert_eq!(decoder.buffered(), 3);

        decoder.extend(b);
        assert_eq!(decoder.next_frame().unwrap().unwrap(), b"split me");
    }

    #[test]
    fn test_multiple_frames_one_read() {
        let mut bytes = encode(b"first");
        bytes.extend_from_slice(&encode(b"second"));

        let mut decoder = FrameDecoder::default();
        decoder.extend(&bytes);

        assert_eq!(decoder.next_frame().unwrap().unwrap(), b"first");
        assert_eq!(decoder.next_frame().unwrap().unwrap(), b"second");
        assert!(decoder.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_empty_payload_frame() {
        let mut decoder = FrameDecoder::default();
        decoder.extend(&encode(b""));
        assert_eq!(decoder.next_frame().unwrap().unwrap(), b"");
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut decoder = FrameDecoder::new(16);
        decoder.extend(&encode(&[0u8; 17]));

        let err = decoder.next_frame().unwrap_err();
        assert!(err.is_connection_fatal());
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_non_ascii_payload() {
        let payload = "{\"message\":\"données perdues\"}".as_bytes();
        let mut decoder = FrameDecoder::default();
        decoder.extend(&encode(payload));
        assert_eq!(decoder.next_frame().unwrap().unwrap(), payload);
    }

    proptest! {
        #[test]
        fn prop_roundtrip_any_split(payload in proptest::collection::vec(any::<u8>(), 0..512),
                                    split in 0usize..520) {
            let framed = encode(&payload);
            let split = split.min(framed.len());

            let mut decoder = FrameDecoder::default();
            decoder.extend(&framed[..split]);
            let early = decoder.next_frame().unwrap();
            decoder.extend(&framed[split..]);

            let decoded = match early {
                Some(p) => p,
                None => decoder.next_frame().unwrap().expect("frame completes"),
            };
            prop_assert_eq!(decoded, payload);
        }

        #[test]
        fn prop_back_to_back_frames(a in proptest::collection::vec(any::<u8>(), 0..128),
                                    b in proptest::collection::vec(any::<u8>(), 0..128)) {
            let mut bytes = encode(&a);
            bytes.extend_from_slice(&encode(&b));

            let mut decoder = FrameDecoder::default();
            decoder.extend(&bytes);
            prop_assert_eq!(decoder.next_frame().unwrap().unwrap(), a);
            prop_assert_eq!(decoder.next_frame().unwrap().unwrap(), b);
        }
    }
}
