//! Canonical block decoding and known block-type payloads

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::ops::Range;

use bpscan_cbor::{Cursor, Diagnostics, Limits, Result};

use crate::config::BundleConfig;
use crate::crc::{verify_block_crc, CrcType};
use crate::eid::{decode_eid, Eid};
use crate::field::{read_uint, reskip};

/// Block type: bundle payload.
pub const BLOCK_TYPE_PAYLOAD: u64 = 1;
/// Block type: previous node.
pub const BLOCK_TYPE_PREVIOUS_NODE: u64 = 6;
/// Block type: bundle age.
pub const BLOCK_TYPE_BUNDLE_AGE: u64 = 7;
/// Block type: hop count.
pub const BLOCK_TYPE_HOP_COUNT: u64 = 10;
/// Block type: block integrity (security).
pub const BLOCK_TYPE_INTEGRITY: u64 = 11;
/// Block type: block confidentiality (security).
pub const BLOCK_TYPE_CONFIDENTIALITY: u64 = 12;

/// Block processing flag: replicate this block in every fragment.
pub const BLOCK_FLAG_REPLICATE_IN_FRAGMENT: u64 = 0x01;
/// Block processing flag: report if the block cannot be processed.
pub const BLOCK_FLAG_REPORT_IF_UNPROCESSED: u64 = 0x02;
/// Block processing flag: delete the bundle if the block cannot be processed.
pub const BLOCK_FLAG_DELETE_IF_UNPROCESSED: u64 = 0x04;
/// Block processing flag: discard the block if it cannot be processed.
pub const BLOCK_FLAG_DISCARD_IF_UNPROCESSED: u64 = 0x10;

const CATEGORY: &str = "canonical-block";

/// One decoded canonical (non-primary) block.
///
/// Exclusively owned by the bundle's block sequence; lookups by declared
/// block number go through a non-owning index map on the bundle.
#[derive(Debug, Clone)]
pub struct CanonicalBlock<'a> {
    /// Position of this block in the bundle, starting at 0 for the first
    /// canonical block. Not the same as the declared block number.
    pub index: usize,
    /// Declared block type code.
    pub type_code: u64,
    /// Declared block number; unique within a bundle.
    pub block_number: u64,
    /// Block processing control flags.
    pub flags: u64,
    /// Declared CRC type.
    pub crc_type: CrcType,
    /// Type-specific data; zero-copy for definite encodings.
    pub data: Cow<'a, [u8]>,
    /// Encoded extent of this block within the bundle buffer.
    pub range: Range<usize>,
    /// Block numbers of integrity blocks targeting this block.
    pub integrity_targeters: BTreeSet<u64>,
    /// Block numbers of confidentiality blocks targeting this block.
    pub confidentiality_targeters: BTreeSet<u64>,
}

/// Decode one canonical block from the cursor.
///
/// Returns `None` when the block header is malformed; the caller rewinds to
/// the block's start and re-skips conservatively to resynchronize at the
/// next item boundary.
pub fn decode_canonical<'a>(
    cursor: &mut Cursor<'a>,
    config: &BundleConfig,
    index: usize,
    diags: &mut Diagnostics,
) -> Result<Option<CanonicalBlock<'a>>> {
    let limits = &config.limits;
    let start = cursor.position();
    let mut outer = cursor.read_chunk(limits)?;
    let Some(count) = outer.require_array(5, 6) else {
        diags.absorb_chunk(CATEGORY, &outer);
        return Ok(None);
    };
    diags.absorb_chunk(CATEGORY, &outer);

    let Some(type_code) = read_uint(cursor, limits, CATEGORY, diags)? else {
        return Ok(None);
    };
    let Some(block_number) = read_uint(cursor, limits, CATEGORY, diags)? else {
        return Ok(None);
    };
    let Some(flags) = read_uint(cursor, limits, CATEGORY, diags)? else {
        return Ok(None);
    };
    let Some(crc_code) = read_uint(cursor, limits, CATEGORY, diags)? else {
        return Ok(None);
    };
    let crc_type = CrcType::from_code(crc_code);
    if let CrcType::Unknown(code) = crc_type {
        diags.error(CATEGORY, start, format!("unknown CRC type {code}"));
    }

    let data_start = cursor.position();
    let mut data_chunk = cursor.read_chunk(limits)?;
    let data = data_chunk.require_bytes();
    diags.absorb_chunk(CATEGORY, &data_chunk);
    let Some(data) = data else {
        reskip(cursor, limits, data_start)?;
        return Ok(None);
    };

    let mut crc_value_range = None;
    if count == 6 {
        let mut crc_chunk = cursor.read_chunk(limits)?;
        if crc_chunk.require_bytes().is_some() && !crc_chunk.is_indefinite() {
            crc_value_range =
                Some(crc_chunk.start + crc_chunk.head_len..crc_chunk.start + crc_chunk.total_len);
        }
        diags.absorb_chunk(CATEGORY, &crc_chunk);
        if crc_type == CrcType::None {
            diags.error(CATEGORY, start, "CRC field present but CRC type is none");
        }
    } else if crc_type != CrcType::None {
        diags.error(
            CATEGORY,
            start,
            format!("CRC type {crc_type:?} declared but CRC field is missing"),
        );
    }

    let range = start..cursor.position();
    if let Some(crc_value) = crc_value_range {
        if config.verify_crc {
            let block = &cursor.buffer()[range.clone()];
            let relative = crc_value.start - range.start..crc_value.end - range.start;
            verify_block_crc(block, relative, crc_type, start, diags);
        }
    }

    Ok(Some(CanonicalBlock {
        index,
        type_code,
        block_number,
        flags,
        crc_type,
        data,
        range,
        integrity_targeters: BTreeSet::new(),
        confidentiality_targeters: BTreeSet::new(),
    }))
}

/// Hop count block content: a limit and the count so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopCount {
    /// Maximum hops permitted.
    pub limit: u64,
    /// Hops taken so far.
    pub count: u64,
}

/// Decode a previous-node block's data: one endpoint ID.
///
/// Diagnostic offsets are relative to the block's type-specific data.
pub fn decode_previous_node(data: &[u8], limits: &Limits, diags: &mut Diagnostics) -> Option<Eid> {
    let mut cursor = Cursor::new(data);
    match decode_eid(&mut cursor, limits, diags) {
        Ok(eid) => eid,
        Err(err) => {
            diags.error("previous-node", 0, err.to_string());
            None
        }
    }
}

/// Decode a bundle-age block's data: age in milliseconds.
pub fn decode_bundle_age(data: &[u8], limits: &Limits, diags: &mut Diagnostics) -> Option<u64> {
    let mut cursor = Cursor::new(data);
    match cursor.read_chunk(limits) {
        Ok(mut chunk) => {
            let age = chunk.require_uint();
            diags.absorb_chunk("bundle-age", &chunk);
            age
        }
        Err(err) => {
            diags.error("bundle-age", 0, err.to_string());
            None
        }
    }
}

/// Decode a hop-count block's data: `[limit, count]`.
pub fn decode_hop_count(data: &[u8], limits: &Limits, diags: &mut Diagnostics) -> Option<HopCount> {
    let mut cursor = Cursor::new(data);
    let decoded = (|| -> Result<Option<HopCount>> {
        let mut outer = cursor.read_chunk(limits)?;
        if outer.require_array(2, 2).is_none() {
            diags.absorb_chunk("hop-count", &outer);
            return Ok(None);
        }
        let limit = read_uint(&mut cursor, limits, "hop-count", diags)?;
        let count = read_uint(&mut cursor, limits, "hop-count", diags)?;
        Ok(limit.zip(count).map(|(limit, count)| HopCount { limit, count }))
    })();
    match decoded {
        Ok(hop_count) => hop_count,
        Err(err) => {
            diags.error("hop-count", 0, err.to_string());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpscan_test_utils::{canonical_block, canonical_block_with_crc, CborWriter};

    fn decode(bytes: &[u8]) -> (Option<CanonicalBlock<'_>>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let mut cursor = Cursor::new(bytes);
        let block = decode_canonical(&mut cursor, &BundleConfig::default(), 0, &mut diags).unwrap();
        (block, diags)
    }

    #[test]
    fn test_decode_payload_block() {
        let mut w = CborWriter::new();
        canonical_block(&mut w, BLOCK_TYPE_PAYLOAD, 1, 0, b"hello");
        let (block, diags) = decode(w.as_slice());
        let block = block.unwrap();
        assert!(diags.is_empty());
        assert_eq!(block.type_code, BLOCK_TYPE_PAYLOAD);
        assert_eq!(block.block_number, 1);
        assert_eq!(&block.data[..], b"hello");
        assert_eq!(block.crc_type, CrcType::None);
        assert_eq!(block.range.start, 0);
    }

    #[test]
    fn test_decode_block_with_valid_crc32() {
        let mut w = CborWriter::new();
        canonical_block_with_crc(&mut w, 2, BLOCK_TYPE_PAYLOAD, 1, 0, b"hello");
        let (block, diags) = decode(w.as_slice());
        assert!(block.is_some());
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    }

    #[test]
    fn test_decode_block_with_valid_crc16() {
        let mut w = CborWriter::new();
        canonical_block_with_crc(&mut w, 1, BLOCK_TYPE_BUNDLE_AGE, 2, 0, &[0x0A]);
        let (block, diags) = decode(w.as_slice());
        assert_eq!(block.unwrap().crc_type, CrcType::Crc16);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    }

    #[test]
    fn test_corrupted_crc_flagged() {
        let mut w = CborWriter::new();
        canonical_block_with_crc(&mut w, 2, BLOCK_TYPE_PAYLOAD, 1, 0, b"hello");
        let mut bytes = w.into_vec();
        // Flip one payload byte; the CRC no longer matches.
        let n = bytes.len();
        bytes[n - 6] ^= 0x01;
        let (block, diags) = decode(&bytes);
        assert!(block.is_some());
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn test_malformed_header_returns_none() {
        let mut w = CborWriter::new();
        w.array(5)
            .text("wrong")
            .uint(1)
            .uint(0)
            .uint(0)
            .bytes(b"x");
        let (block, diags) = decode(w.as_slice());
        assert!(block.is_none());
        assert!(diags.error_count() >= 1);
    }

    #[test]
    fn test_decode_bundle_age_content() {
        let mut w = CborWriter::new();
        w.uint(30_000);
        let mut diags = Diagnostics::new();
        let age = decode_bundle_age(w.as_slice(), &Limits::default(), &mut diags);
        assert_eq!(age, Some(30_000));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_decode_hop_count_content() {
        let mut w = CborWriter::new();
        w.array(2).uint(64).uint(3);
        let mut diags = Diagnostics::new();
        let hops = decode_hop_count(w.as_slice(), &Limits::default(), &mut diags);
        assert_eq!(hops, Some(HopCount { limit: 64, count: 3 }));
    }

    #[test]
    fn test_decode_previous_node_content() {
        let mut w = CborWriter::new();
        bpscan_test_utils::ipn_eid(&mut w, 4, 2);
        let mut diags = Diagnostics::new();
        let eid = decode_previous_node(w.as_slice(), &Limits::default(), &mut diags);
        assert_eq!(eid.unwrap().uri, "ipn:4.2");
    }

    #[test]
    fn test_truncated_hop_count_is_soft() {
        let mut diags = Diagnostics::new();
        let hops = decode_hop_count(&[0x82, 0x19], &Limits::default(), &mut diags);
        assert!(hops.is_none());
        assert_eq!(diags.error_count(), 1);
    }
}
