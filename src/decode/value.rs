//! Tagged-value codec for "get named value" responses.
//!
//! Every named-value domain (per-product-key, per-SKU, per-service,
//! per-application, Windows-scoped) answers with the same wire shape: a
//! numeric kind tag plus a byte buffer. The kind numbers overlap across
//! domains, so the 64-bit reading of the integer tag is recognized by its
//! exact byte length.

use serde::{Deserialize, Serialize};

/// Kind tag for a UTF-16 string payload.
pub const KIND_TEXT: u32 = 1;

/// Kind tag for an unsigned integer payload (32-bit, or 64-bit when the
/// declared length is exactly eight bytes).
pub const KIND_INTEGER: u32 = 4;

/// A decoded named value.
///
/// Exactly one variant applies. Kind/length combinations the codec does not
/// recognize decode to [`TypedValue::Absent`]; callers treat that the same
/// as a value that genuinely has no data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypedValue {
    /// No data, or an unrecognized kind/length combination.
    Absent,
    /// UTF-16 string payload with trailing NULs trimmed.
    Text(String),
    /// 32-bit unsigned integer payload.
    Dword(u32),
    /// 64-bit unsigned integer payload.
    Qword(u64),
}

impl TypedValue {
    /// The text payload, if this is a string value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TypedValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The integer payload widened to 64 bits, if this is an integer value.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            TypedValue::Dword(v) => Some(u64::from(*v)),
            TypedValue::Qword(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether no data was decoded.
    pub fn is_absent(&self) -> bool {
        matches!(self, TypedValue::Absent)
    }
}

/// Decode a `(kind, bytes)` pair into a [`TypedValue`].
pub fn decode_value(kind: u32, bytes: &[u8]) -> TypedValue {
    if bytes.is_empty() {
        return TypedValue::Absent;
    }
    match kind {
        KIND_TEXT => TypedValue::Text(decode_utf16(bytes)),
        KIND_INTEGER if bytes.len() == 8 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[..8]);
            TypedValue::Qword(u64::from_le_bytes(raw))
        }
        KIND_INTEGER if bytes.len() >= 4 => {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&bytes[..4]);
            TypedValue::Dword(u32::from_le_bytes(raw))
        }
        _ => TypedValue::Absent,
    }
}

/// UTF-16LE decode with trailing NUL code units trimmed.
///
/// An odd trailing byte cannot form a code unit and is ignored.
fn decode_utf16(bytes: &[u8]) -> String {
    let mut units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    while units.last() == Some(&0) {
        units.pop();
    }
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16_bytes(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    #[test]
    fn text_round_trips() {
        let bytes = utf16_bytes("Windows(R), Professional edition");
        let value = decode_value(KIND_TEXT, &bytes);
        assert_eq!(value.as_text(), Some("Windows(R), Professional edition"));
    }

    #[test]
    fn trailing_nuls_are_trimmed() {
        let mut bytes = utf16_bytes("VOLUME_KMSCLIENT");
        bytes.extend_from_slice(&[0, 0, 0, 0]); // two NUL code units
        let value = decode_value(KIND_TEXT, &bytes);
        assert_eq!(value.as_text(), Some("VOLUME_KMSCLIENT"));
    }

    #[test]
    fn interior_nuls_survive() {
        let bytes: Vec<u8> = [0x41u16, 0, 0x42, 0]
            .iter()
            .flat_map(|u| u.to_le_bytes())
            .collect();
        let value = decode_value(KIND_TEXT, &bytes);
        assert_eq!(value.as_text(), Some("A\0B"));
    }

    #[test]
    fn empty_bytes_decode_absent_for_any_kind() {
        for kind in [0, KIND_TEXT, 2, 3, KIND_INTEGER, 99] {
            assert!(decode_value(kind, &[]).is_absent());
        }
    }

    #[test]
    fn dword_reads_first_four_bytes() {
        let value = decode_value(KIND_INTEGER, &[0x2C, 0x01, 0, 0]);
        assert_eq!(value, TypedValue::Dword(300));
    }

    #[test]
    fn eight_byte_integer_is_qword() {
        let bytes = 0x0102_0304_0506_0708u64.to_le_bytes();
        let value = decode_value(KIND_INTEGER, &bytes);
        assert_eq!(value, TypedValue::Qword(0x0102_0304_0506_0708));
    }

    #[test]
    fn short_integer_payload_is_absent() {
        assert!(decode_value(KIND_INTEGER, &[1, 2]).is_absent());
    }

    #[test]
    fn unknown_kind_is_absent_not_error() {
        assert!(decode_value(7, &[1, 2, 3, 4]).is_absent());
    }

    #[test]
    fn as_u64_widens_dword() {
        assert_eq!(TypedValue::Dword(5).as_u64(), Some(5));
        assert_eq!(TypedValue::Qword(5).as_u64(), Some(5));
        assert_eq!(TypedValue::Absent.as_u64(), None);
    }

    #[test]
    fn serializes_with_variant_tag() {
        let json = serde_json::to_string(&TypedValue::Dword(42)).unwrap();
        assert_eq!(json, r#"{"Dword":42}"#);
    }
}
