//! Decoders for raw native call results.
//!
//! Every provider call yields either a tagged `(kind, bytes)` value or a
//! counted fixed-stride array. These modules turn those raw shapes into
//! owned model types; none of them allocates or releases the source buffer.

pub mod ident;
pub mod records;
pub mod value;

use chrono::{DateTime, Utc};

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_DIFF_SECS: i64 = 11_644_473_600;

/// Convert a FILETIME tick count (100 ns intervals since 1601-01-01 UTC)
/// to a UTC timestamp. Zero means "no timestamp" and yields `None`.
pub fn filetime_to_utc(ticks: u64) -> Option<DateTime<Utc>> {
    if ticks == 0 {
        return None;
    }
    let secs = (ticks / 10_000_000) as i64 - FILETIME_UNIX_DIFF_SECS;
    let nanos = ((ticks % 10_000_000) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}
