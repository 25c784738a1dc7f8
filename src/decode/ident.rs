//! Identifier batch decoding.
//!
//! The enumeration call answers with a counted contiguous array of 16-byte
//! identifiers in the native little-endian GUID layout. Same counted-array
//! pattern as the status records, fixed 16-byte elements.

use uuid::Uuid;

/// Byte width of one identifier element.
pub const IDENTIFIER_WIDTH: usize = 16;

/// Decode a counted identifier array.
///
/// The count comes from the producing call; a zero count yields an empty
/// vec without touching the buffer, and a short buffer is decoded up to the
/// last complete element.
pub fn parse_identifiers(bytes: &[u8], count: usize) -> Vec<Uuid> {
    if count == 0 {
        return Vec::new();
    }
    bytes
        .chunks_exact(IDENTIFIER_WIDTH)
        .take(count)
        .map(|chunk| {
            let mut raw = [0u8; IDENTIFIER_WIDTH];
            raw.copy_from_slice(chunk);
            Uuid::from_bytes_le(raw)
        })
        .collect()
}
