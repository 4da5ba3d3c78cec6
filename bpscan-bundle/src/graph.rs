//! Bundle block graph assembly
//!
//! Consumes a stream of chunks to assemble the primary block and the
//! ordered sequence of canonical blocks, keyed by declared block number.
//! Strictly sequential: framing, primary, canonical blocks, terminal break.
//! Security target resolution runs as a final pass once every block number
//! is known, since targets may reference forward.

use ahash::AHashMap;
use bpscan_cbor::{Cursor, Diagnostics, MajorType, Result};

use crate::admin::{decode_admin_record, AdminRecord, StatusReport};
use crate::block::{
    decode_bundle_age, decode_canonical, decode_hop_count, decode_previous_node, CanonicalBlock,
    HopCount, BLOCK_TYPE_BUNDLE_AGE, BLOCK_TYPE_HOP_COUNT, BLOCK_TYPE_PAYLOAD,
    BLOCK_TYPE_PREVIOUS_NODE,
};
use crate::config::BundleConfig;
use crate::eid::Eid;
use crate::primary::{decode_primary, BundleIdentity, PrimaryBlock};
use crate::security::{decode_asb, AbstractSecurityBlock, SecurityKind};

const CATEGORY: &str = "bundle";

/// One decoded bundle: primary block, ordered canonical blocks, and the
/// relations derived from them.
#[derive(Debug)]
pub struct Bundle<'a> {
    /// The primary block; `None` when its framing was malformed.
    pub primary: Option<PrimaryBlock>,
    /// Canonical blocks in encoding order.
    pub blocks: Vec<CanonicalBlock<'a>>,
    /// Decoded security block contents.
    pub security: Vec<AbstractSecurityBlock>,
    /// Previous-node block content, when present and intact.
    pub previous_node: Option<Eid>,
    /// Bundle-age block content in milliseconds, when present and intact.
    pub bundle_age_ms: Option<u64>,
    /// Hop-count block content, when present and intact.
    pub hop_count: Option<HopCount>,
    /// Bytes consumed from the input buffer by this bundle.
    pub encoded_len: usize,
    // Non-owning relation from declared block number to position in
    // `blocks`; first declaration wins on duplicates.
    by_number: AHashMap<u64, usize>,
}

impl<'a> Bundle<'a> {
    /// Look up a canonical block by its declared number.
    pub fn block_by_number(&self, number: u64) -> Option<&CanonicalBlock<'a>> {
        self.by_number.get(&number).map(|&idx| &self.blocks[idx])
    }

    /// Position of a block in the sequence by its declared number.
    pub fn block_index(&self, number: u64) -> Option<usize> {
        self.by_number.get(&number).copied()
    }

    /// The payload block, when one decoded.
    pub fn payload_block(&self) -> Option<&CanonicalBlock<'a>> {
        self.blocks
            .iter()
            .find(|b| b.type_code == BLOCK_TYPE_PAYLOAD)
    }

    /// Derive the bundle identity from the primary block.
    pub fn identity(&self) -> Option<BundleIdentity> {
        self.primary.as_ref().and_then(PrimaryBlock::identity)
    }

    /// Decode the administrative record carried in the payload, when the
    /// primary block flags one.
    pub fn admin_record(
        &self,
        config: &BundleConfig,
        diags: &mut Diagnostics,
    ) -> Option<AdminRecord> {
        let primary = self.primary.as_ref()?;
        if !primary.is_admin_record() {
            return None;
        }
        let payload = self.payload_block()?;
        decode_admin_record(&payload.data, &config.limits, diags)
    }

    /// Decode the status report carried in the payload, when there is one.
    pub fn status_report(
        &self,
        config: &BundleConfig,
        diags: &mut Diagnostics,
    ) -> Option<StatusReport> {
        match self.admin_record(config, diags)? {
            AdminRecord::StatusReport(report) => Some(report),
            AdminRecord::Unknown { .. } => None,
        }
    }
}

/// Decode one bundle from the front of `buf`.
///
/// Soft findings accumulate in `diags` alongside a best-effort partial
/// result; truncation inside the block sequence ends the bundle with a
/// diagnostic rather than discarding what already decoded. Only a buffer
/// too short to read the outer framing fails hard.
pub fn decode_bundle<'a>(
    buf: &'a [u8],
    config: &BundleConfig,
    diags: &mut Diagnostics,
) -> Result<Bundle<'a>> {
    let limits = &config.limits;
    let mut cursor = Cursor::new(buf);

    // Outer framing: an indefinite-length array.
    let outer = cursor.read_chunk(limits)?;
    diags.absorb_chunk(CATEGORY, &outer);
    let mut definite_count = None;
    if outer.major == MajorType::Array {
        if !outer.is_indefinite() {
            diags.warning(
                CATEGORY,
                outer.start,
                "definite-length bundle array; expected indefinite",
            );
            definite_count = Some(outer.argument);
        }
    } else {
        diags.error(
            CATEGORY,
            outer.start,
            "bundle does not start with an array; decoding best-effort",
        );
    }

    let mut bundle = Bundle {
        primary: None,
        blocks: Vec::new(),
        security: Vec::new(),
        previous_node: None,
        bundle_age_ms: None,
        hop_count: None,
        encoded_len: 0,
        by_number: AHashMap::new(),
    };

    // Block 0: the primary block, mandatory and unique.
    match decode_primary(&mut cursor, config, diags) {
        Ok(primary) => bundle.primary = primary,
        Err(err) => {
            diags.error(
                CATEGORY,
                cursor.position(),
                format!("truncated primary block: {err}"),
            );
            bundle.encoded_len = cursor.position();
            return Ok(bundle);
        }
    }

    // Blocks 1..N: canonical blocks until the break or the declared count.
    let mut items = 1u64;
    let mut payload_index = None;
    let mut type_counts: AHashMap<u64, usize> = AHashMap::new();
    let mut saw_break = false;
    loop {
        if let Some(count) = definite_count {
            if items >= count {
                break;
            }
        }
        if cursor.is_at_end() {
            if definite_count.is_none() && !saw_break {
                diags.error(
                    CATEGORY,
                    cursor.position(),
                    "missing break terminating bundle array",
                );
            }
            break;
        }
        if definite_count.is_none() {
            match cursor.consume_break() {
                Ok(true) => {
                    saw_break = true;
                    break;
                }
                Ok(false) => {}
                Err(err) => {
                    diags.error(CATEGORY, cursor.position(), err.to_string());
                    break;
                }
            }
        }

        let start = cursor.position();
        let index = bundle.blocks.len();
        match decode_canonical(&mut cursor, config, index, diags) {
            Ok(Some(block)) => {
                register_block(
                    &mut bundle,
                    block,
                    &mut payload_index,
                    &mut type_counts,
                    config,
                    diags,
                );
            }
            Ok(None) => {
                // Conservative re-skip from the block's start to land on the
                // next item boundary.
                cursor.set_position(start);
                match cursor.skip_item(limits) {
                    Ok(_) => {}
                    Err(err) => {
                        diags.error(
                            CATEGORY,
                            start,
                            format!("cannot resynchronize past malformed block: {err}"),
                        );
                        break;
                    }
                }
            }
            Err(err) => {
                diags.error(
                    CATEGORY,
                    start,
                    format!("truncated canonical block: {err}"),
                );
                break;
            }
        }
        items += 1;
    }

    match payload_index {
        Some(idx) if idx + 1 != bundle.blocks.len() => {
            diags.error(
                CATEGORY,
                bundle.blocks[idx].range.start,
                "payload block is not the last block",
            );
        }
        None => diags.warning(CATEGORY, 0, "bundle has no payload block"),
        _ => {}
    }

    bundle.encoded_len = cursor.position();
    resolve_security(&mut bundle, config, diags);
    Ok(bundle)
}

fn register_block<'a>(
    bundle: &mut Bundle<'a>,
    block: CanonicalBlock<'a>,
    payload_index: &mut Option<usize>,
    type_counts: &mut AHashMap<u64, usize>,
    config: &BundleConfig,
    diags: &mut Diagnostics,
) {
    let limits = &config.limits;
    let at = block.range.start;

    if block.block_number == 0 {
        diags.error(CATEGORY, at, "block number 0 is reserved for the primary block");
    }
    match bundle.by_number.entry(block.block_number) {
        std::collections::hash_map::Entry::Occupied(_) => {
            // First-seen wins for index lookups.
            diags.error(
                CATEGORY,
                at,
                format!("duplicate block number {}", block.block_number),
            );
        }
        std::collections::hash_map::Entry::Vacant(entry) => {
            entry.insert(block.index);
        }
    }

    let seen = type_counts.entry(block.type_code).or_insert(0);
    *seen += 1;
    if let Some(&cap) = config.block_type_caps.get(&block.type_code) {
        if *seen > cap {
            diags.error(
                CATEGORY,
                at,
                format!(
                    "more than {cap} block(s) of type {} in one bundle",
                    block.type_code
                ),
            );
        }
    }

    match block.type_code {
        BLOCK_TYPE_PAYLOAD => {
            if payload_index.is_none() {
                *payload_index = Some(block.index);
            }
            if block.block_number != 1 {
                diags.warning(
                    CATEGORY,
                    at,
                    format!("payload block number {} instead of 1", block.block_number),
                );
            }
        }
        BLOCK_TYPE_PREVIOUS_NODE => {
            bundle.previous_node = decode_previous_node(&block.data, limits, diags);
        }
        BLOCK_TYPE_BUNDLE_AGE => {
            bundle.bundle_age_ms = decode_bundle_age(&block.data, limits, diags);
        }
        BLOCK_TYPE_HOP_COUNT => {
            bundle.hop_count = decode_hop_count(&block.data, limits, diags);
        }
        _ => {}
    }

    bundle.blocks.push(block);
}

/// Decode security blocks and back-reference their targets.
fn resolve_security(bundle: &mut Bundle<'_>, config: &BundleConfig, diags: &mut Diagnostics) {
    let mut decoded = Vec::new();
    for block in &bundle.blocks {
        if let Some(kind) = SecurityKind::from_type_code(block.type_code) {
            if let Some(asb) = decode_asb(
                &block.data,
                kind,
                block.block_number,
                &config.limits,
                &config.registry,
                diags,
            ) {
                decoded.push((asb, block.range.start));
            }
        }
    }

    for (asb, at) in &decoded {
        for &target in &asb.targets {
            let resolved = if target == 0 {
                if let Some(primary) = bundle.primary.as_mut() {
                    match asb.kind {
                        SecurityKind::Integrity => {
                            primary.integrity_targeters.insert(asb.block_number)
                        }
                        SecurityKind::Confidentiality => {
                            primary.confidentiality_targeters.insert(asb.block_number)
                        }
                    };
                    true
                } else {
                    false
                }
            } else if let Some(&idx) = bundle.by_number.get(&target) {
                let block = &mut bundle.blocks[idx];
                match asb.kind {
                    SecurityKind::Integrity => block.integrity_targeters.insert(asb.block_number),
                    SecurityKind::Confidentiality => {
                        block.confidentiality_targeters.insert(asb.block_number)
                    }
                };
                true
            } else {
                false
            };
            if !resolved {
                diags.error(
                    "security",
                    *at,
                    format!("security target block {target} does not exist"),
                );
            }
        }
    }

    bundle.security = decoded.into_iter().map(|(asb, _)| asb).collect();
}
