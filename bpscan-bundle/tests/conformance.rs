//! Conformance tests for whole-bundle decoding scenarios

use bpscan_bundle::block::{BLOCK_TYPE_INTEGRITY, BLOCK_TYPE_PAYLOAD};
use bpscan_bundle::security::SEC_FLAG_PARAMETERS_PRESENT;
use bpscan_bundle::{decode_bundle, BundleConfig, Diagnostics, SecurityKind};
use bpscan_test_utils::{canonical_block, ipn_eid, ipn_primary, simple_bundle, CborWriter};

fn decode(bytes: &[u8]) -> (bpscan_bundle::Bundle<'_>, Diagnostics) {
    let mut diags = Diagnostics::new();
    let bundle = decode_bundle(bytes, &BundleConfig::default(), &mut diags).unwrap();
    (bundle, diags)
}

/// ASB data targeting the given block numbers, context 1, no parameters.
fn asb_data(targets: &[u64]) -> Vec<u8> {
    let mut w = CborWriter::new();
    w.array(targets.len() as u64);
    for &t in targets {
        w.uint(t);
    }
    w.int(1);
    w.uint(0);
    ipn_eid(&mut w, 3, 0);
    w.array(targets.len() as u64);
    for _ in targets {
        w.array(1).array(2).uint(1).bytes(&[0xAB, 0xCD]);
    }
    w.into_vec()
}

#[test]
fn end_to_end_minimal_bundle_decodes_clean() {
    let bytes = simple_bundle(b"hello bundle");
    let (bundle, diags) = decode(&bytes);

    assert!(diags.is_empty(), "expected zero diagnostics: {diags:?}");
    let primary = bundle.primary.as_ref().expect("primary block");
    assert_eq!(primary.destination.as_ref().unwrap().uri, "ipn:2.1");
    assert_eq!(bundle.blocks.len(), 1);
    assert_eq!(bundle.blocks[0].type_code, BLOCK_TYPE_PAYLOAD);
    assert_eq!(bundle.blocks[0].block_number, 1);

    let identity = bundle.identity().expect("identity");
    assert_eq!(identity.source, "ipn:1.1");
    assert_eq!(identity.timestamp.dtn_time_ms, 1_000);
    assert!(!identity.is_fragment());
}

#[test]
fn security_target_resolution_marks_existing_and_flags_missing() {
    // Integrity block 3 targets the primary block (0) and block 7, which
    // does not exist in the bundle.
    let mut w = CborWriter::new();
    w.array_indef();
    ipn_primary(&mut w, 0, (1, 1), 1_000, 1, None);
    canonical_block(&mut w, BLOCK_TYPE_INTEGRITY, 3, 0, &asb_data(&[0, 7]));
    canonical_block(&mut w, 1, 1, 0, b"payload");
    w.break_marker();

    let (bundle, diags) = decode(w.as_slice());

    let primary = bundle.primary.as_ref().unwrap();
    assert!(primary.integrity_targeters.contains(&3));
    assert!(primary.confidentiality_targeters.is_empty());

    let unresolved: Vec<_> = diags
        .items()
        .iter()
        .filter(|d| d.message.contains("target block 7 does not exist"))
        .collect();
    assert_eq!(unresolved.len(), 1);

    // No back-reference anywhere records block 7.
    assert!(bundle.block_by_number(7).is_none());
    assert_eq!(bundle.security.len(), 1);
    assert_eq!(bundle.security[0].kind, SecurityKind::Integrity);
    assert_eq!(bundle.security[0].targets, vec![0, 7]);
}

#[test]
fn security_back_reference_lands_on_targeted_block() {
    // Confidentiality block 4 protects the payload block (number 1),
    // declared before the payload so the reference is forward.
    let mut w = CborWriter::new();
    w.array_indef();
    ipn_primary(&mut w, 0, (1, 1), 1_000, 1, None);
    let mut asb = CborWriter::new();
    asb.array(1).uint(1);
    asb.int(2);
    asb.uint(SEC_FLAG_PARAMETERS_PRESENT);
    ipn_eid(&mut asb, 3, 0);
    asb.array(1).array(2).uint(5).uint(300);
    asb.array(1).array(1).array(2).uint(1).bytes(&[0x01]);
    w.array(5)
        .uint(12)
        .uint(4)
        .uint(0)
        .uint(0)
        .bytes(asb.as_slice());
    canonical_block(&mut w, 1, 1, 0, b"secret");
    w.break_marker();

    let (bundle, diags) = decode(w.as_slice());
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");

    let payload = bundle.block_by_number(1).unwrap();
    assert!(payload.confidentiality_targeters.contains(&4));
    assert!(payload.integrity_targeters.is_empty());

    let asb = &bundle.security[0];
    assert_eq!(asb.kind, SecurityKind::Confidentiality);
    assert_eq!(asb.context_id, 2);
    assert_eq!(asb.parameters.len(), 1);
    assert_eq!(asb.parameters[0].type_id, 5);
}

#[test]
fn tagged_blocks_still_decode() {
    // A tag in front of the payload block's data must be transparent.
    let mut w = CborWriter::new();
    w.array_indef();
    ipn_primary(&mut w, 0, (1, 1), 1_000, 1, None);
    w.array(5).uint(1).uint(1).uint(0).uint(0);
    w.tag(24).bytes(b"tagged payload");
    w.break_marker();

    let (bundle, diags) = decode(w.as_slice());
    assert_eq!(diags.error_count(), 0);
    assert_eq!(&bundle.payload_block().unwrap().data[..], b"tagged payload");
}

#[test]
fn indefinite_payload_data_is_assembled() {
    let mut w = CborWriter::new();
    w.array_indef();
    ipn_primary(&mut w, 0, (1, 1), 1_000, 1, None);
    w.array(5).uint(1).uint(1).uint(0).uint(0);
    w.bytes_indef();
    w.bytes(b"he").bytes(b"llo");
    w.break_marker(); // ends the indefinite string
    w.break_marker(); // ends the bundle
    let (bundle, diags) = decode(w.as_slice());
    assert_eq!(&bundle.payload_block().unwrap().data[..], b"hello");
    // The indefinite string is a note, not an error.
    assert_eq!(diags.error_count(), 0);
    assert!(!diags.is_empty());
}

#[test]
fn empty_input_is_bounds_exceeded() {
    let mut diags = Diagnostics::new();
    let result = decode_bundle(&[], &BundleConfig::default(), &mut diags);
    assert!(result.is_err());
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn payload_bytes_survive_bundle_decode(
            payload in prop::collection::vec(any::<u8>(), 0..256)
        ) {
            let bytes = simple_bundle(&payload);
            let (bundle, diags) = decode(&bytes);
            prop_assert_eq!(diags.error_count(), 0);
            prop_assert_eq!(&bundle.payload_block().unwrap().data[..], payload.as_slice());
            prop_assert_eq!(bundle.encoded_len, bytes.len());
        }

        #[test]
        fn arbitrary_buffers_never_panic(bytes in prop::collection::vec(any::<u8>(), 1..512)) {
            let mut diags = Diagnostics::new();
            let _ = decode_bundle(&bytes, &BundleConfig::default(), &mut diags);
        }
    }
}
