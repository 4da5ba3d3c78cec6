//! Shared field-reading helpers

use bpscan_cbor::{Cursor, Diagnostics, Limits, Result};

/// Rewind to the chunk's start and skip the whole item conservatively.
///
/// Used after a field failed typed extraction: the chunk read may have
/// consumed only the head of a container, so re-skipping from the start is
/// the only way to land on the next item boundary.
pub(crate) fn reskip(cursor: &mut Cursor<'_>, limits: &Limits, start: usize) -> Result<bool> {
    cursor.set_position(start);
    cursor.skip_item(limits)
}

/// Read one item and require an unsigned integer, resynchronizing past the
/// item on failure.
pub(crate) fn read_uint(
    cursor: &mut Cursor<'_>,
    limits: &Limits,
    category: &'static str,
    diags: &mut Diagnostics,
) -> Result<Option<u64>> {
    let start = cursor.position();
    let mut chunk = cursor.read_chunk(limits)?;
    let value = chunk.require_uint();
    diags.absorb_chunk(category, &chunk);
    if value.is_none() {
        reskip(cursor, limits, start)?;
    }
    Ok(value)
}
