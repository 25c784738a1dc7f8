//! Fixed-stride license status record decoding.
//!
//! The status call answers with a counted array of fixed-width records. The
//! record layout is reverse-engineered from observed behavior, not from a
//! documented structure: treat the stride and offsets as a versioned
//! platform contract. The raw status field conflates several licensing
//! sub-states under one coarse code; the reason HRESULT refines it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte stride of one status record.
pub const STATUS_RECORD_STRIDE: usize = 40;

const OFFSET_STATUS: usize = 16;
const OFFSET_GRACE_MINUTES: usize = 20;
const OFFSET_REASON: usize = 28;
const OFFSET_VALIDITY_END: usize = 32;

// Reason HRESULTs that refine the coarse grace status.
const REASON_ADDITIONAL_GRACE: u32 = 0x4004_F00D;
const REASON_NON_GENUINE_GRACE: u32 = 0x4004_F065;
const REASON_EXTENDED_GRACE: u32 = 0x4004_FC06;

/// Effective licensing status after reason-code refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LicenseStatus {
    /// No license applies.
    Unlicensed,
    /// Fully licensed.
    Licensed,
    /// Initial (out-of-box) grace period.
    InitialGrace,
    /// Additional grace period (activation count insufficient).
    AdditionalGrace,
    /// Non-genuine grace period.
    NonGenuineGrace,
    /// Notification state.
    Notification,
    /// Extended grace period.
    ExtendedGrace,
    /// A status code outside the known set, passed through unchanged.
    Unknown(u32),
}

impl LicenseStatus {
    /// Map an effective status code to its variant.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => LicenseStatus::Unlicensed,
            1 => LicenseStatus::Licensed,
            2 => LicenseStatus::InitialGrace,
            3 => LicenseStatus::AdditionalGrace,
            4 => LicenseStatus::NonGenuineGrace,
            5 => LicenseStatus::Notification,
            6 => LicenseStatus::ExtendedGrace,
            other => LicenseStatus::Unknown(other),
        }
    }

    /// The effective numeric status code.
    pub fn code(&self) -> u32 {
        match self {
            LicenseStatus::Unlicensed => 0,
            LicenseStatus::Licensed => 1,
            LicenseStatus::InitialGrace => 2,
            LicenseStatus::AdditionalGrace => 3,
            LicenseStatus::NonGenuineGrace => 4,
            LicenseStatus::Notification => 5,
            LicenseStatus::ExtendedGrace => 6,
            LicenseStatus::Unknown(code) => *code,
        }
    }

    /// Refine a raw status using its reason HRESULT.
    ///
    /// The raw grace code covers four distinct sub-states; the raw
    /// notification code is reported under the refined code. Everything
    /// else passes through unchanged.
    pub fn remap(raw_status: u32, reason: u32) -> Self {
        match raw_status {
            3 => LicenseStatus::Notification,
            2 => match reason {
                REASON_ADDITIONAL_GRACE => LicenseStatus::AdditionalGrace,
                REASON_NON_GENUINE_GRACE => LicenseStatus::NonGenuineGrace,
                REASON_EXTENDED_GRACE => LicenseStatus::ExtendedGrace,
                _ => LicenseStatus::InitialGrace,
            },
            other => LicenseStatus::from_code(other),
        }
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LicenseStatus::Unlicensed => write!(f, "Unlicensed"),
            LicenseStatus::Licensed => write!(f, "Licensed"),
            LicenseStatus::InitialGrace => write!(f, "Initial grace period"),
            LicenseStatus::AdditionalGrace => write!(f, "Additional grace period"),
            LicenseStatus::NonGenuineGrace => write!(f, "Non-genuine grace period"),
            LicenseStatus::Notification => write!(f, "Notification"),
            LicenseStatus::ExtendedGrace => write!(f, "Extended grace period"),
            LicenseStatus::Unknown(code) => write!(f, "Unknown ({code})"),
        }
    }
}

/// One decoded license status record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseStatusRecord {
    /// Effective status after reason refinement.
    pub status: LicenseStatus,
    /// The status code as reported, before refinement.
    pub raw_status: u32,
    /// Minutes remaining in the current grace period.
    pub grace_minutes: u32,
    /// Reason HRESULT accompanying the status; zero when none applies.
    pub reason: u32,
    /// End of the validity period as a FILETIME tick count; zero when unset.
    pub validity_end: u64,
}

impl LicenseStatusRecord {
    /// The validity end as a UTC timestamp, when one is set.
    pub fn validity_end_utc(&self) -> Option<DateTime<Utc>> {
        super::filetime_to_utc(self.validity_end)
    }
}

/// Decode a counted fixed-stride record array.
///
/// The count comes from the call that produced the buffer, never from the
/// buffer's size. A zero count yields an empty vec without reading the
/// buffer. A buffer shorter than the counted records is decoded up to the
/// last complete record.
pub fn parse_status_records(bytes: &[u8], count: usize) -> Vec<LicenseStatusRecord> {
    if count == 0 {
        return Vec::new();
    }
    let complete = bytes.len() / STATUS_RECORD_STRIDE;
    if complete < count {
        tracing::debug!(count, complete, "status buffer shorter than record count");
    }
    let mut records = Vec::with_capacity(count.min(complete));
    for index in 0..count.min(complete) {
        let record = &bytes[index * STATUS_RECORD_STRIDE..(index + 1) * STATUS_RECORD_STRIDE];
        let raw_status = read_u32(record, OFFSET_STATUS);
        let reason = read_u32(record, OFFSET_REASON);
        records.push(LicenseStatusRecord {
            status: LicenseStatus::remap(raw_status, reason),
            raw_status,
            grace_minutes: read_u32(record, OFFSET_GRACE_MINUTES),
            reason,
            validity_end: read_u64(record, OFFSET_VALIDITY_END),
        });
    }
    records
}

fn read_u32(record: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&record[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

fn read_u64(record: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&record[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(status: u32, grace: u32, reason: u32, validity_end: u64) -> Vec<u8> {
        let mut bytes = vec![0u8; STATUS_RECORD_STRIDE];
        bytes[OFFSET_STATUS..OFFSET_STATUS + 4].copy_from_slice(&status.to_le_bytes());
        bytes[OFFSET_GRACE_MINUTES..OFFSET_GRACE_MINUTES + 4].copy_from_slice(&grace.to_le_bytes());
        bytes[OFFSET_REASON..OFFSET_REASON + 4].copy_from_slice(&reason.to_le_bytes());
        bytes[OFFSET_VALIDITY_END..OFFSET_VALIDITY_END + 8]
            .copy_from_slice(&validity_end.to_le_bytes());
        bytes
    }

    #[test]
    fn licensed_record_passes_through() {
        let bytes = make_record(1, 0, 0, 0);
        let records = parse_status_records(&bytes, 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, LicenseStatus::Licensed);
        assert_eq!(records[0].raw_status, 1);
    }

    #[test]
    fn notification_raw_code_remaps() {
        // Raw 3 always reports as the refined notification status,
        // regardless of reason.
        for reason in [0u32, 0x4004_F00D, 0xC004_F009] {
            let bytes = make_record(3, 0, reason, 0);
            let records = parse_status_records(&bytes, 1);
            assert_eq!(records[0].status, LicenseStatus::Notification);
            assert_eq!(records[0].status.code(), 5);
        }
    }

    #[test]
    fn grace_reason_refinement() {
        let cases = [
            (0x4004_F00D, LicenseStatus::AdditionalGrace, 3),
            (0x4004_F065, LicenseStatus::NonGenuineGrace, 4),
            (0x4004_FC06, LicenseStatus::ExtendedGrace, 6),
            (0, LicenseStatus::InitialGrace, 2),
            (0xC004_F00F, LicenseStatus::InitialGrace, 2),
        ];
        for (reason, expected, code) in cases {
            let bytes = make_record(2, 43200, reason, 0);
            let records = parse_status_records(&bytes, 1);
            assert_eq!(records[0].status, expected, "reason {reason:#X}");
            assert_eq!(records[0].status.code(), code);
            assert_eq!(records[0].grace_minutes, 43200);
        }
    }

    #[test]
    fn zero_count_reads_nothing() {
        // Non-empty buffer, zero count: the count wins.
        let bytes = make_record(1, 0, 0, 0);
        assert!(parse_status_records(&bytes, 0).is_empty());
        assert!(parse_status_records(&[], 0).is_empty());
    }

    #[test]
    fn short_buffer_stops_at_last_complete_record() {
        let mut bytes = make_record(1, 0, 0, 0);
        bytes.extend_from_slice(&make_record(2, 10, 0, 0)[..20]); // truncated second record
        let records = parse_status_records(&bytes, 2);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn multiple_records_decode_in_order() {
        let mut bytes = make_record(1, 0, 0, 0);
        bytes.extend_from_slice(&make_record(2, 120, 0x4004_F065, 0x01D9_0000_0000_0000));
        let records = parse_status_records(&bytes, 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, LicenseStatus::Licensed);
        assert_eq!(records[1].status, LicenseStatus::NonGenuineGrace);
        assert_eq!(records[1].validity_end, 0x01D9_0000_0000_0000);
        assert!(records[1].validity_end_utc().is_some());
    }

    #[test]
    fn zero_validity_end_has_no_timestamp() {
        let bytes = make_record(1, 0, 0, 0);
        let records = parse_status_records(&bytes, 1);
        assert!(records[0].validity_end_utc().is_none());
    }

    #[test]
    fn unknown_status_code_passes_through() {
        let bytes = make_record(42, 0, 0, 0);
        let records = parse_status_records(&bytes, 1);
        assert_eq!(records[0].status, LicenseStatus::Unknown(42));
        assert_eq!(records[0].status.code(), 42);
    }

    #[test]
    fn status_display_names() {
        assert_eq!(LicenseStatus::Licensed.to_string(), "Licensed");
        assert_eq!(
            LicenseStatus::NonGenuineGrace.to_string(),
            "Non-genuine grace period"
        );
        assert_eq!(LicenseStatus::Unknown(9).to_string(), "Unknown (9)");
    }
}
