//! Payload fragment reassembly
//!
//! Fragments accumulate per logical (defragmented) bundle identity. The
//! first observed total-length claim is authoritative; later conflicting
//! claims are flagged and ignored. Reassembly completes once the fragment
//! ranges cover the whole payload contiguously.

use std::collections::BTreeMap;

use bpscan_cbor::Diagnostics;
use bytes::Bytes;

const CATEGORY: &str = "reassembly";

/// Accumulated fragments of one logical bundle payload.
#[derive(Debug, Default)]
pub(crate) struct ReassemblyState {
    total_len: Option<u64>,
    fragments: BTreeMap<u64, Bytes>,
    /// Set when an offset or length exceeded the configured extent; the
    /// whole bundle is then excluded from reassembly.
    blocked: bool,
}

impl ReassemblyState {
    /// Add one fragment. Returns the reassembled payload when the ranges
    /// now cover `[0, total)` contiguously.
    pub(crate) fn insert(
        &mut self,
        offset: u64,
        claimed_total: u64,
        data: &[u8],
        max_extent: u64,
        diags: &mut Diagnostics,
    ) -> Option<Bytes> {
        if self.blocked {
            return None;
        }
        let len = data.len() as u64;
        if offset > max_extent
            || claimed_total > max_extent
            || offset.checked_add(len).map_or(true, |end| end > max_extent)
        {
            diags.warning(
                CATEGORY,
                0,
                format!(
                    "fragment extent {offset}+{len}/{claimed_total} exceeds limit {max_extent}; \
                     reassembly skipped for this bundle"
                ),
            );
            self.blocked = true;
            return None;
        }

        match self.total_len {
            None => self.total_len = Some(claimed_total),
            Some(total) if total != claimed_total => {
                diags.warning(
                    CATEGORY,
                    0,
                    format!(
                        "inconsistent total length {claimed_total}, keeping first-seen {total}"
                    ),
                );
            }
            Some(_) => {}
        }
        let total = self.total_len.unwrap_or(0);
        if offset + len > total {
            diags.warning(
                CATEGORY,
                0,
                format!("fragment {offset}+{len} extends past total length {total}"),
            );
        }

        self.fragments
            .entry(offset)
            .or_insert_with(|| Bytes::copy_from_slice(data));

        if self.is_complete() {
            Some(self.assemble())
        } else {
            None
        }
    }

    fn is_complete(&self) -> bool {
        let Some(total) = self.total_len else {
            return false;
        };
        let mut covered = 0u64;
        for (&offset, data) in &self.fragments {
            if offset > covered {
                return false;
            }
            covered = covered.max(offset.saturating_add(data.len() as u64));
        }
        covered >= total
    }

    fn assemble(&self) -> Bytes {
        let total = self.total_len.unwrap_or(0);
        let mut out = vec![0u8; total as usize];
        for (&offset, data) in &self.fragments {
            if offset >= total {
                continue;
            }
            let end = offset.saturating_add(data.len() as u64).min(total);
            let start = offset as usize;
            out[start..end as usize].copy_from_slice(&data[..(end - offset) as usize]);
        }
        Bytes::from(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(
        state: &mut ReassemblyState,
        offset: u64,
        total: u64,
        data: &[u8],
    ) -> (Option<Bytes>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let done = state.insert(offset, total, data, u64::from(u32::MAX), &mut diags);
        (done, diags)
    }

    #[test]
    fn test_two_fragments_reassemble() {
        let mut state = ReassemblyState::default();
        let (done, diags) = insert(&mut state, 0, 25, &[0xAA; 10]);
        assert!(done.is_none());
        assert!(diags.is_empty());

        let (done, diags) = insert(&mut state, 10, 25, &[0xBB; 15]);
        assert!(diags.is_empty());
        let payload = done.expect("complete");
        assert_eq!(payload.len(), 25);
        assert_eq!(&payload[..10], &[0xAA; 10][..]);
        assert_eq!(&payload[10..], &[0xBB; 15][..]);
    }

    #[test]
    fn test_out_of_order_fragments() {
        let mut state = ReassemblyState::default();
        assert!(insert(&mut state, 10, 15, &[0x02; 5]).0.is_none());
        assert!(insert(&mut state, 5, 15, &[0x01; 5]).0.is_none());
        let (done, _) = insert(&mut state, 0, 15, &[0x00; 5]);
        let payload = done.expect("complete");
        assert_eq!(&payload[..], [[0x00; 5], [0x01; 5], [0x02; 5]].concat());
    }

    #[test]
    fn test_gap_blocks_completion() {
        let mut state = ReassemblyState::default();
        assert!(insert(&mut state, 0, 20, &[0u8; 5]).0.is_none());
        assert!(insert(&mut state, 10, 20, &[0u8; 10]).0.is_none());
    }

    #[test]
    fn test_conflicting_total_keeps_first() {
        let mut state = ReassemblyState::default();
        insert(&mut state, 0, 25, &[0u8; 10]);
        let (_, diags) = insert(&mut state, 10, 30, &[0u8; 5]);
        assert!(!diags.is_clean());
        assert_eq!(state.total_len, Some(25));

        // Completing against the first-seen total still works.
        let (done, _) = insert(&mut state, 15, 25, &[0u8; 10]);
        assert_eq!(done.expect("complete").len(), 25);
    }

    #[test]
    fn test_extent_guard_blocks_bundle() {
        let mut state = ReassemblyState::default();
        let mut diags = Diagnostics::new();
        let done = state.insert(u64::from(u32::MAX) + 1, 10, &[0u8; 4], u64::from(u32::MAX), &mut diags);
        assert!(done.is_none());
        assert!(!diags.is_clean());
        assert!(state.blocked);

        // Subsequent valid fragments are ignored for this bundle.
        let (done, _) = insert(&mut state, 0, 4, &[0u8; 4]);
        assert!(done.is_none());
    }

    #[test]
    fn test_overlapping_fragment_first_bytes_kept() {
        let mut state = ReassemblyState::default();
        insert(&mut state, 0, 10, &[0x11; 6]);
        let (done, _) = insert(&mut state, 0, 10, &[0x22; 10]);
        // Same offset: the first fragment's bytes stay, the longer one is
        // not re-inserted, so completion needs the tail.
        assert!(done.is_none());
        let (done, _) = insert(&mut state, 6, 10, &[0x33; 4]);
        let payload = done.expect("complete");
        assert_eq!(&payload[..6], &[0x11; 6][..]);
        assert_eq!(&payload[6..], &[0x33; 4][..]);
    }
}
