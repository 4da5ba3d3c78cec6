//! Abstract security block decoding
//!
//! Integrity and confidentiality blocks share one layout: an ordered target
//! list, a security context id, flags, a security source, and optional
//! per-context parameters plus per-target results. Target resolution and
//! back-reference bookkeeping happen at the bundle level once every block
//! is known, since targets may reference forward.

use bpscan_cbor::{Cursor, Diagnostics, Limits, Result};

use crate::block::{BLOCK_TYPE_CONFIDENTIALITY, BLOCK_TYPE_INTEGRITY};
use crate::eid::{decode_eid, Eid};
use crate::field::{read_uint, reskip};
use crate::registry::DecoderRegistry;

/// Security context flag: parameters are present.
pub const SEC_FLAG_PARAMETERS_PRESENT: u64 = 0x01;

const CATEGORY: &str = "security";

/// Which protection a security block claims over its targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityKind {
    /// Block integrity.
    Integrity,
    /// Block confidentiality.
    Confidentiality,
}

impl SecurityKind {
    /// Map a canonical block type code to a security kind.
    pub fn from_type_code(type_code: u64) -> Option<Self> {
        match type_code {
            BLOCK_TYPE_INTEGRITY => Some(SecurityKind::Integrity),
            BLOCK_TYPE_CONFIDENTIALITY => Some(SecurityKind::Confidentiality),
            _ => None,
        }
    }
}

/// One security parameter or result value, kept as raw encoded bytes.
///
/// Interpretation is delegated to the context-keyed decoder registry; the
/// raw fallback only validates well-formedness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityValue {
    /// Parameter or result type id within the security context.
    pub type_id: u64,
    /// Raw encoded value item.
    pub raw: Vec<u8>,
}

/// Decoded abstract security block content.
#[derive(Debug, Clone)]
pub struct AbstractSecurityBlock {
    /// Block number of the security block itself.
    pub block_number: u64,
    /// Protection kind, from the carrying block's type code.
    pub kind: SecurityKind,
    /// Security context id.
    pub context_id: i64,
    /// Security context flags.
    pub flags: u64,
    /// Security source endpoint.
    pub source: Option<Eid>,
    /// Ordered declared target block numbers.
    pub targets: Vec<u64>,
    /// Per-context parameters.
    pub parameters: Vec<SecurityValue>,
    /// Per-target result lists, parallel to `targets`.
    pub results: Vec<Vec<SecurityValue>>,
}

/// Decode one abstract security block from a block's type-specific data.
///
/// Diagnostic offsets are relative to the block data. Truncation is
/// reported as a diagnostic; a partially decoded ASB is still returned when
/// at least the target list was read.
pub fn decode_asb(
    data: &[u8],
    kind: SecurityKind,
    block_number: u64,
    limits: &Limits,
    registry: &DecoderRegistry,
    diags: &mut Diagnostics,
) -> Option<AbstractSecurityBlock> {
    let mut cursor = Cursor::new(data);
    let mut asb = AbstractSecurityBlock {
        block_number,
        kind,
        context_id: 0,
        flags: 0,
        source: None,
        targets: Vec::new(),
        parameters: Vec::new(),
        results: Vec::new(),
    };

    let outcome = decode_asb_fields(&mut cursor, limits, registry, diags, &mut asb);
    match outcome {
        Ok(true) => Some(asb),
        Ok(false) => None,
        Err(err) => {
            diags.error(CATEGORY, cursor.position(), err.to_string());
            if asb.targets.is_empty() {
                None
            } else {
                Some(asb)
            }
        }
    }
}

fn decode_asb_fields(
    cursor: &mut Cursor<'_>,
    limits: &Limits,
    registry: &DecoderRegistry,
    diags: &mut Diagnostics,
    asb: &mut AbstractSecurityBlock,
) -> Result<bool> {
    // Target list
    let start = cursor.position();
    let mut targets_chunk = cursor.read_chunk(limits)?;
    let Some(target_count) = targets_chunk.require_array(1, 1024) else {
        diags.absorb_chunk(CATEGORY, &targets_chunk);
        reskip(cursor, limits, start)?;
        return Ok(false);
    };
    for _ in 0..target_count {
        match read_uint(cursor, limits, CATEGORY, diags)? {
            Some(number) => asb.targets.push(number),
            None => return Ok(false),
        }
    }

    // Context id and flags
    let ctx_start = cursor.position();
    let mut ctx_chunk = cursor.read_chunk(limits)?;
    let context_id = ctx_chunk.require_int();
    diags.absorb_chunk(CATEGORY, &ctx_chunk);
    let Some(context_id) = context_id else {
        reskip(cursor, limits, ctx_start)?;
        return Ok(false);
    };
    asb.context_id = context_id;

    let Some(flags) = read_uint(cursor, limits, CATEGORY, diags)? else {
        return Ok(false);
    };
    asb.flags = flags;

    // Security source
    asb.source = decode_eid(cursor, limits, diags)?;

    // Parameters, present per the context flags
    if flags & SEC_FLAG_PARAMETERS_PRESENT != 0 {
        asb.parameters = decode_value_list(cursor, limits, asb.context_id, registry, diags)?;
    }

    // One result list per target
    if cursor.is_at_end() {
        diags.warning(CATEGORY, cursor.position(), "security results are missing");
        return Ok(true);
    }
    let results_start = cursor.position();
    let mut results_chunk = cursor.read_chunk(limits)?;
    let Some(result_count) = results_chunk.require_array(0, 1024) else {
        diags.absorb_chunk(CATEGORY, &results_chunk);
        reskip(cursor, limits, results_start)?;
        return Ok(true);
    };
    if result_count != asb.targets.len() as u64 {
        diags.warning(
            CATEGORY,
            results_start,
            format!(
                "{result_count} result list(s) for {} target(s)",
                asb.targets.len()
            ),
        );
    }
    for _ in 0..result_count {
        let list = decode_value_list(cursor, limits, asb.context_id, registry, diags)?;
        asb.results.push(list);
    }

    if !cursor.is_at_end() {
        diags.warning(
            CATEGORY,
            cursor.position(),
            "trailing bytes after security block content",
        );
    }
    Ok(true)
}

/// Decode an array of `[type id, value]` pairs, dispatching each value to
/// the context-keyed registry.
fn decode_value_list(
    cursor: &mut Cursor<'_>,
    limits: &Limits,
    context_id: i64,
    registry: &DecoderRegistry,
    diags: &mut Diagnostics,
) -> Result<Vec<SecurityValue>> {
    let start = cursor.position();
    let mut outer = cursor.read_chunk(limits)?;
    let Some(count) = outer.require_array(0, 1024) else {
        diags.absorb_chunk(CATEGORY, &outer);
        reskip(cursor, limits, start)?;
        return Ok(Vec::new());
    };

    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let pair_start = cursor.position();
        let mut pair = cursor.read_chunk(limits)?;
        if pair.require_array(2, 2).is_none() {
            diags.absorb_chunk(CATEGORY, &pair);
            reskip(cursor, limits, pair_start)?;
            continue;
        }
        let Some(type_id) = read_uint(cursor, limits, CATEGORY, diags)? else {
            cursor.skip_item(limits)?;
            continue;
        };

        let value_start = cursor.position();
        cursor.skip_item(limits)?;
        let raw = cursor.buffer()[value_start..cursor.position()].to_vec();
        registry
            .security_value_decoder(context_id, type_id)
            .decode(&raw, limits, diags);
        values.push(SecurityValue { type_id, raw });
    }
    Ok(values)
}
