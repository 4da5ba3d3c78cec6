//! Primary block decoding and bundle identity
//!
//! The primary block is the mandatory first block of a bundle: an array of
//! 8-11 elements depending on the fragmentation flag and CRC type. It is
//! immutable after decode; a malformed field aborts the remaining per-field
//! decoding of this block (the element slots are still stepped over) but
//! never the bundle.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

use bpscan_cbor::{Cursor, Diagnostics, Limits, Result};

use crate::config::BundleConfig;
use crate::crc::{verify_block_crc, CrcType};
use crate::eid::{decode_eid, Eid};
use crate::field::{read_uint, reskip};

/// Bundle processing flag: the bundle is a fragment.
pub const FLAG_IS_FRAGMENT: u64 = 0x0001;
/// Bundle processing flag: the payload is an administrative record.
pub const FLAG_ADMIN_RECORD: u64 = 0x0002;
/// Bundle processing flag: the bundle must not be fragmented.
pub const FLAG_MUST_NOT_FRAGMENT: u64 = 0x0004;
/// Bundle processing flag: acknowledgment by the user application requested.
pub const FLAG_APP_ACK_REQUESTED: u64 = 0x0020;
/// Bundle processing flag: status time requested in reports.
pub const FLAG_STATUS_TIME_REQUESTED: u64 = 0x0040;
/// Bundle processing flag: request reporting of bundle reception.
pub const FLAG_REPORT_RECEPTION: u64 = 0x4000;
/// Bundle processing flag: request reporting of bundle forwarding.
pub const FLAG_REPORT_FORWARDING: u64 = 0x0001_0000;
/// Bundle processing flag: request reporting of bundle delivery.
pub const FLAG_REPORT_DELIVERY: u64 = 0x0002_0000;
/// Bundle processing flag: request reporting of bundle deletion.
pub const FLAG_REPORT_DELETION: u64 = 0x0004_0000;

/// Offset of the DTN epoch (2000-01-01T00:00:00Z) from the Unix epoch.
pub const DTN_EPOCH_UNIX_MS: u64 = 946_684_800_000;

const CATEGORY: &str = "primary-block";

/// Creation timestamp: DTN time plus a sequence number disambiguating
/// bundles created within one millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CreationTimestamp {
    /// Milliseconds since the DTN epoch.
    pub dtn_time_ms: u64,
    /// Creation sequence number.
    pub sequence: u64,
}

impl CreationTimestamp {
    /// Convert the DTN time to milliseconds since the Unix epoch.
    pub fn to_unix_ms(self) -> u64 {
        self.dtn_time_ms.saturating_add(DTN_EPOCH_UNIX_MS)
    }
}

/// Composite identity correlating bundles across a session.
///
/// Structural equality and hashing over source URI, creation timestamp, and
/// the optional fragment fields.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BundleIdentity {
    /// Source endpoint URI.
    pub source: String,
    /// Creation timestamp.
    pub timestamp: CreationTimestamp,
    /// Fragment offset, when the bundle is a fragment.
    pub fragment_offset: Option<u64>,
    /// Total application data unit length, when the bundle is a fragment.
    pub total_adu_length: Option<u64>,
}

impl BundleIdentity {
    /// The identity of the logical, unfragmented bundle.
    pub fn defragmented(&self) -> BundleIdentity {
        BundleIdentity {
            source: self.source.clone(),
            timestamp: self.timestamp,
            fragment_offset: None,
            total_adu_length: None,
        }
    }

    /// Whether the identity carries fragment fields.
    pub fn is_fragment(&self) -> bool {
        self.fragment_offset.is_some()
    }
}

impl fmt::Display for BundleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @{}/{}",
            self.source, self.timestamp.dtn_time_ms, self.timestamp.sequence
        )?;
        if let Some(offset) = self.fragment_offset {
            write!(f, " frag {offset}")?;
            if let Some(total) = self.total_adu_length {
                write!(f, "/{total}")?;
            }
        }
        Ok(())
    }
}

/// Decoded primary block.
#[derive(Debug, Clone)]
pub struct PrimaryBlock {
    /// Bundle processing control flags.
    pub flags: u64,
    /// Destination endpoint.
    pub destination: Option<Eid>,
    /// Source node.
    pub source: Option<Eid>,
    /// Report-to endpoint.
    pub report_to: Option<Eid>,
    /// Creation timestamp.
    pub timestamp: Option<CreationTimestamp>,
    /// Lifetime in milliseconds.
    pub lifetime_ms: Option<u64>,
    /// Fragment offset, present when the is-fragment flag is set.
    pub fragment_offset: Option<u64>,
    /// Total application data unit length, present on fragments.
    pub total_adu_length: Option<u64>,
    /// Declared CRC type.
    pub crc_type: CrcType,
    /// Encoded extent of the block within the bundle buffer.
    pub range: Range<usize>,
    /// Block numbers of integrity blocks targeting this block.
    pub integrity_targeters: BTreeSet<u64>,
    /// Block numbers of confidentiality blocks targeting this block.
    pub confidentiality_targeters: BTreeSet<u64>,
}

impl PrimaryBlock {
    /// Whether the is-fragment flag is set.
    pub fn is_fragment(&self) -> bool {
        self.flags & FLAG_IS_FRAGMENT != 0
    }

    /// Whether the payload is an administrative record.
    pub fn is_admin_record(&self) -> bool {
        self.flags & FLAG_ADMIN_RECORD != 0
    }

    /// Derive the bundle identity, when source and timestamp decoded.
    pub fn identity(&self) -> Option<BundleIdentity> {
        let source = self.source.as_ref()?;
        let timestamp = self.timestamp?;
        Some(BundleIdentity {
            source: source.uri.clone(),
            timestamp,
            fragment_offset: self.fragment_offset,
            total_adu_length: self.total_adu_length,
        })
    }
}

/// Decode a creation timestamp: `[dtn-time, sequence]`.
pub fn decode_creation_timestamp(
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

/// Decode one primary block from the cursor.
///
/// Returns `None` only when the item is not an array at all (the item is
/// then skipped). Field-level failures abort the remaining per-field decode
/// but the element slots are consumed so the cursor lands after the block.
pub fn decode_primary(
    cursor: &mut Cursor<'_>,
    config: &BundleConfig,
    diags: &mut Diagnostics,
) -> Result<Option<PrimaryBlock>> {
    let limits = &config.limits;
    let start = cursor.position();
    let mut outer = cursor.read_chunk(limits)?;
    let Some(count) = outer.require_array(8, 11) else {
        diags.absorb_chunk(CATEGORY, &outer);
        reskip(cursor, limits, start)?;
        return Ok(None);
    };
    diags.absorb_chunk(CATEGORY, &outer);

    let mut remaining = count;
    let mut aborted = false;

    // Version
    remaining -= 1;
    match read_uint(cursor, limits, CATEGORY, diags)? {
        Some(7) => {}
        Some(other) => diags.warning(
            CATEGORY,
            start,
            format!("bundle protocol version {other}, expected 7"),
        ),
        None => aborted = true,
    }

    // Flags
    let mut flags = 0;
    if !aborted {
        remaining -= 1;
        match read_uint(cursor, limits, CATEGORY, diags)? {
            Some(value) => flags = value,
            None => aborted = true,
        }
    }

    // CRC type
    let mut crc_type = CrcType::None;
    if !aborted {
        remaining -= 1;
        match read_uint(cursor, limits, CATEGORY, diags)? {
            Some(code) => {
                crc_type = CrcType::from_code(code);
                if let CrcType::Unknown(code) = crc_type {
                    diags.error(CATEGORY, start, format!("unknown CRC type {code}"));
                }
            }
            None => aborted = true,
        }
    }

    // Endpoints
    let mut destination = None;
    let mut source = None;
    let mut report_to = None;
    for slot in [&mut destination, &mut source, &mut report_to] {
        if !aborted {
            remaining -= 1;
            match decode_eid(cursor, limits, diags)? {
                Some(eid) => *slot = Some(eid),
                None => aborted = true,
            }
        }
    }

    // Creation timestamp and lifetime
    let mut timestamp = None;
    if !aborted {
        remaining -= 1;
        timestamp = decode_creation_timestamp(cursor, limits, diags)?;
        aborted |= timestamp.is_none();
    }
    let mut lifetime_ms = None;
    if !aborted {
        remaining -= 1;
        lifetime_ms = read_uint(cursor, limits, CATEGORY, diags)?;
        aborted |= lifetime_ms.is_none();
    }

    // Fragment fields, present when the is-fragment flag is set
    let mut fragment_offset = None;
    let mut total_adu_length = None;
    if !aborted && flags & FLAG_IS_FRAGMENT != 0 {
        if remaining >= 2 {
            remaining -= 2;
            fragment_offset = read_uint(cursor, limits, CATEGORY, diags)?;
            total_adu_length = read_uint(cursor, limits, CATEGORY, diags)?;
            aborted |= fragment_offset.is_none() || total_adu_length.is_none();
        } else {
            diags.error(
                CATEGORY,
                start,
                "is-fragment flag set but fragment fields are missing",
            );
        }
    }

    // CRC field
    let mut crc_value_range = None;
    if !aborted && crc_type != CrcType::None {
        if remaining >= 1 {
            remaining -= 1;
            let mut crc_chunk = cursor.read_chunk(limits)?;
            if crc_chunk.require_bytes().is_some() && !crc_chunk.is_indefinite() {
                crc_value_range =
                    Some(crc_chunk.start + crc_chunk.head_len..crc_chunk.start + crc_chunk.total_len);
            }
            diags.absorb_chunk(CATEGORY, &crc_chunk);
        } else {
            diags.error(
                CATEGORY,
                start,
                format!("CRC type {crc_type:?} declared but CRC field is missing"),
            );
        }
    }

    // Step over any element slots left after an abort or a count mismatch.
    if remaining > 0 {
        if !aborted {
            diags.warning(
                CATEGORY,
                start,
                format!("{remaining} unexpected trailing element(s) in primary block"),
            );
        }
        for _ in 0..remaining {
            cursor.skip_item(limits)?;
        }
    }

    let range = start..cursor.position();
    if let Some(crc_value) = crc_value_range {
        if config.verify_crc {
            let block = &cursor.buffer()[range.clone()];
            let relative = crc_value.start - range.start..crc_value.end - range.start;
            verify_block_crc(block, relative, crc_type, start, diags);
        }
    }

    Ok(Some(PrimaryBlock {
        flags,
        destination,
        source,
        report_to,
        timestamp,
        lifetime_ms,
        fragment_offset,
        total_adu_length,
        crc_type,
        range,
        integrity_targeters: BTreeSet::new(),
        confidentiality_targeters: BTreeSet::new(),
    }))
}
