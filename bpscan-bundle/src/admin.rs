//! Administrative record decoding
//!
//! An administrative record is the payload of a bundle whose primary block
//! carries the admin-record flag: `[record type, record content]`. Only the
//! bundle status report (type 1) is decoded here; other types are surfaced
//! as unknown with their type code.

use bpscan_cbor::{Cursor, Diagnostics, Limits, Result};

use crate::eid::decode_eid;
use crate::field::{read_uint, reskip};
use crate::primary::{BundleIdentity, CreationTimestamp};

/// Administrative record type code for bundle status reports.
pub const ADMIN_RECORD_STATUS_REPORT: u64 = 1;

const CATEGORY: &str = "admin-record";

/// One status assertion: whether the event happened and optionally when.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusAssertion {
    /// Whether the node asserts the event.
    pub asserted: bool,
    /// DTN time of the event, when status time was requested.
    pub time_ms: Option<u64>,
}

/// Decoded bundle status report.
#[derive(Debug, Clone)]
pub struct StatusReport {
    /// Reception assertion.
    pub reception: StatusAssertion,
    /// Forwarding assertion.
    pub forwarding: StatusAssertion,
    /// Delivery assertion.
    pub delivery: StatusAssertion,
    /// Deletion assertion.
    pub deletion: StatusAssertion,
    /// Reason code for the report.
    pub reason_code: u64,
    /// Identity of the bundle the report is about, derived from the
    /// report's own subject fields, not the reporting bundle's primary
    /// block.
    pub subject: BundleIdentity,
}

/// One decoded administrative record.
#[derive(Debug, Clone)]
pub enum AdminRecord {
    /// A bundle status report.
    StatusReport(StatusReport),
    /// A record type this decoder does not interpret.
    Unknown {
        /// Declared record type code.
        type_code: u64,
    },
}

/// Decode an administrative record from a payload block's data.
///
/// Diagnostic offsets are relative to the payload data. Returns `None` when
/// the record framing is malformed or truncated.
pub fn decode_admin_record(
    data: &[u8],
    limits: &Limits,
    diags: &mut Diagnostics,
) -> Option<AdminRecord> {
    let mut cursor = Cursor::new(data);
    let decoded = (|| -> Result<Option<AdminRecord>> {
        let start = cursor.position();
        let mut outer = cursor.read_chunk(limits)?;
        if outer.require_array(2, 2).is_none() {
            diags.absorb_chunk(CATEGORY, &outer);
            reskip(&mut cursor, limits, start)?;
            return Ok(None);
        }
        let Some(type_code) = read_uint(&mut cursor, limits, CATEGORY, diags)? else {
            return Ok(None);
        };
        if type_code != ADMIN_RECORD_STATUS_REPORT {
            cursor.skip_item(limits)?;
            return Ok(Some(AdminRecord::Unknown { type_code }));
        }
        Ok(decode_status_report(&mut cursor, limits, diags)?.map(AdminRecord::StatusReport))
    })();
    match decoded {
        Ok(record) => record,
        Err(err) => {
            diags.error(CATEGORY, cursor.position(), err.to_string());
            None
        }
    }
}

fn decode_status_report(
    cursor: &mut Cursor<'_>,
    limits: &Limits,
    diags: &mut Diagnostics,
) -> Result<Option<StatusReport>> {
    let start = cursor.position();
    let mut outer = cursor.read_chunk(limits)?;
    let Some(count) = outer.require_array(4, 6) else {
        diags.absorb_chunk(CATEGORY, &outer);
        reskip(cursor, limits, start)?;
        return Ok(None);
    };

    // Status information: four assertions in fixed order.
    let info_start = cursor.position();
    let mut info = cursor.read_chunk(limits)?;
    let mut assertions = [StatusAssertion::default(); 4];
    if let Some(info_count) = info.require_array(4, 4) {
        for slot in assertions.iter_mut().take(info_count as usize) {
            *slot = decode_assertion(cursor, limits, diags)?;
        }
    } else {
        diags.absorb_chunk(CATEGORY, &info);
        reskip(cursor, limits, info_start)?;
    }

    let Some(reason_code) = read_uint(cursor, limits, CATEGORY, diags)? else {
        return Ok(None);
    };
    let Some(source) = decode_eid(cursor, limits, diags)? else {
        return Ok(None);
    };
    let Some(timestamp) = decode_subject_timestamp(cursor, limits, diags)? else {
        return Ok(None);
    };

    // Subject fragment fields, appended when the subject was a fragment.
    let mut fragment_offset = None;
    let mut total_adu_length = None;
    if count >= 5 {
        fragment_offset = read_uint(cursor, limits, CATEGORY, diags)?;
    }
    if count >= 6 {
        total_adu_length = read_uint(cursor, limits, CATEGORY, diags)?;
    }

    Ok(Some(StatusReport {
        reception: assertions[0],
        forwarding: assertions[1],
        delivery: assertions[2],
        deletion: assertions[3],
        reason_code,
        subject: BundleIdentity {
            source: source.uri,
            timestamp,
            fragment_offset,
            total_adu_length,
        },
    }))
}

fn decode_assertion(
    cursor: &mut Cursor<'_>,
    limits: &Limits,
    diags: &mut Diagnostics,
) -> Result<StatusAssertion> {
    let start = cursor.position();
    let mut outer = cursor.read_chunk(limits)?;
    let Some(count) = outer.require_array(1, 2) else {
        diags.absorb_chunk(CATEGORY, &outer);
        reskip(cursor, limits, start)?;
        return Ok(StatusAssertion::default());
    };
    let mut flag_chunk = cursor.read_chunk(limits)?;
    let asserted = flag_chunk.require_bool().unwrap_or(false);
    diags.absorb_chunk(CATEGORY, &flag_chunk);
    let time_ms = if count == 2 {
        read_uint(cursor, limits, CATEGORY, diags)?
    } else {
        None
    };
    Ok(StatusAssertion { asserted, time_ms })
}

fn decode_subject_timestamp(
    cursor: &mut Cursor<'_>,
    limits: &Limits,
    diags: &mut Diagnostics,
) -> Result<Option<CreationTimestamp>> {
    let start = cursor.position();
    let mut outer = cursor.read_chunk(limits)?;
    if outer.require_array(2, 2).is_none() {
        diags.absorb_chunk(CATEGORY, &outer);
        reskip(cursor, limits, start)?;
        return Ok(None);
    }
    let time = read_uint(cursor, limits, CATEGORY, diags)?;
    let sequence = read_uint(cursor, limits, CATEGORY, diags)?;
    Ok(time.zip(sequence).map(|(dtn_time_ms, sequence)| {
        CreationTimestamp {
            dtn_time_ms,
            sequence,
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpscan_test_utils::{ipn_eid, CborWriter};

    fn status_report_payload(asserted: [bool; 4], with_times: bool) -> Vec<u8> {
        let mut w = CborWriter::new();
        w.array(2).uint(ADMIN_RECORD_STATUS_REPORT);
        w.array(4);
        w.array(4);
        for (i, flag) in asserted.into_iter().enumerate() {
            if with_times && flag {
                w.array(2).boolean(flag).uint(10_000 + i as u64);
            } else {
                w.array(1).boolean(flag);
            }
        }
        w.uint(4); // reason: depleted storage
        ipn_eid(&mut w, 1, 1);
        w.array(2).uint(1_000).uint(7);
        w.into_vec()
    }

    #[test]
    fn test_decode_status_report() {
        let data = status_report_payload([true, false, false, false], false);
        let mut diags = Diagnostics::new();
        let record = decode_admin_record(&data, &Limits::default(), &mut diags).unwrap();
        let AdminRecord::StatusReport(report) = record else {
            panic!("expected status report");
        };
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        assert!(report.reception.asserted);
        assert!(!report.delivery.asserted);
        assert_eq!(report.reason_code, 4);
        assert_eq!(report.subject.source, "ipn:1.1");
        assert_eq!(report.subject.timestamp.dtn_time_ms, 1_000);
        assert_eq!(report.subject.timestamp.sequence, 7);
        assert!(!report.subject.is_fragment());
    }

    #[test]
    fn test_decode_status_report_with_times() {
        let data = status_report_payload([true, true, false, false], true);
        let mut diags = Diagnostics::new();
        let record = decode_admin_record(&data, &Limits::default(), &mut diags).unwrap();
        let AdminRecord::StatusReport(report) = record else {
            panic!("expected status report");
        };
        assert_eq!(report.reception.time_ms, Some(10_000));
        assert_eq!(report.forwarding.time_ms, Some(10_001));
        assert_eq!(report.delivery.time_ms, None);
    }

    #[test]
    fn test_subject_fragment_fields() {
        let mut w = CborWriter::new();
        w.array(2).uint(ADMIN_RECORD_STATUS_REPORT);
        w.array(6);
        w.array(4);
        for _ in 0..4 {
            w.array(1).boolean(false);
        }
        w.uint(0);
        ipn_eid(&mut w, 1, 1);
        w.array(2).uint(1_000).uint(7);
        w.uint(10).uint(25);
        let mut diags = Diagnostics::new();
        let record = decode_admin_record(w.as_slice(), &Limits::default(), &mut diags).unwrap();
        let AdminRecord::StatusReport(report) = record else {
            panic!("expected status report");
        };
        assert_eq!(report.subject.fragment_offset, Some(10));
        assert_eq!(report.subject.total_adu_length, Some(25));
    }

    #[test]
    fn test_unknown_record_type() {
        let mut w = CborWriter::new();
        w.array(2).uint(9).array(0);
        let mut diags = Diagnostics::new();
        let record = decode_admin_record(w.as_slice(), &Limits::default(), &mut diags).unwrap();
        assert!(matches!(record, AdminRecord::Unknown { type_code: 9 }));
    }

    #[test]
    fn test_truncated_record_is_soft() {
        let mut diags = Diagnostics::new();
        let record = decode_admin_record(&[0x82, 0x01], &Limits::default(), &mut diags);
        assert!(record.is_none());
        assert_eq!(diags.error_count(), 1);
    }
}
