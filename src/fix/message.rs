//! FIX message representation and encoding.

use super::{DEFAULT_BEGIN_STRING, SOH};

/// One FIX message: an ordered list of `tag=value` fields.
///
/// Insertion order is preserved and significant - FIX field ordering
/// matters for the header and for repeating groups, so no map is involved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixMessage {
    fields: Vec<(u32, Vec<u8>)>,
}

impl FixMessage {
    /// Create an empty message
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `tag=value` pair. Duplicate tags are allowed (repeating
    /// groups rely on them).
    pub fn append_pair(&mut self, tag: u32, value: impl AsRef<[u8]>) {
        self.fields.push((tag, value.as_ref().to_vec()));
    }

    /// First value for `tag`, if present
    pub fn get(&self, tag: u32) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, v)| v.as_slice())
    }

    /// First value for `tag`, decoded as UTF-8
    pub fn get_str(&self, tag: u32) -> Option<&str> {
        self.get(tag).and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the message has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(tag, value)` pairs in insertion order
    pub fn fields(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.fields.iter().map(|(t, v)| (*t, v.as_slice()))
    }

    /// Encode to wire bytes.
    ///
    /// Emits `8=...␁9=...␁<body>10=...␁` where BodyLength (9) and CheckSum
    /// (10) are computed here; any 9 or 10 the caller appended is ignored.
    /// BeginString comes from tag 8 if set, otherwise
    /// [`DEFAULT_BEGIN_STRING`].
    pub fn encode(&self) -> Vec<u8> {
        let begin_string: &[u8] = self
            .get(8)
            .unwrap_or_else(|| DEFAULT_BEGIN_STRING.as_bytes());

        let mut body = Vec::new();
        for (tag, value) in &self.fields {
            if matches!(tag, 8 | 9 | 10) {
                continue;
            }
            body.extend_from_slice(tag.to_string().as_bytes());
            body.push(b'=');
            body.extend_from_slice(value);
            body.push(SOH);
        }

        let mut out = Vec::with_capacity(body.len() + 32);
        out.extend_from_slice(b"8=");
        out.extend_from_slice(begin_string);
        out.push(SOH);
        out.extend_from_slice(b"9=");
        out.extend_from_slice(body.len().to_string().as_bytes());
        out.push(SOH);
        out.extend_from_slice(&body);

        let checksum: u32 = out.iter().map(|b| u32::from(*b)).sum::<u32>() % 256;
        out.extend_from_slice(format!("10={checksum:03}").as_bytes());
        out.push(SOH);
        out
    }

    /// Encode to a `String` (FIX is ASCII plus SOH, which survives UTF-8)
    pub fn encode_string(&self) -> String {
        String::from_utf8_lossy(&self.encode()).into_owned()
    }
}
