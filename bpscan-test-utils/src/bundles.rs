//! Ready-made encoded bundles for decoder tests

use crate::writer::CborWriter;

/// Append an `ipn` endpoint ID: `[2, [node, service]]`.
pub fn ipn_eid(w: &mut CborWriter, node: u64, service: u64) {
    w.array(2).uint(2).array(2).uint(node).uint(service);
}

/// Append the null endpoint `dtn:none`: `[1, 0]`.
pub fn dtn_none(w: &mut CborWriter) {
    w.array(2).uint(1).uint(0);
}

/// Append a CRC-less primary block with an `ipn` source.
///
/// Destination is fixed at `ipn:2.1` and report-to at `dtn:none`. When
/// `fragment` is given, the is-fragment flag is set and the offset/total
/// fields are appended.
pub fn ipn_primary(
    w: &mut CborWriter,
    flags: u64,
    src: (u64, u64),
    time_ms: u64,
    seq: u64,
    fragment: Option<(u64, u64)>,
) {
    let count = if fragment.is_some() { 10 } else { 8 };
    let flags = flags | if fragment.is_some() { 0x01 } else { 0 };
    w.array(count);
    w.uint(7); // protocol version
    w.uint(flags);
    w.uint(0); // CRC type: none
    ipn_eid(w, 2, 1);
    ipn_eid(w, src.0, src.1);
    dtn_none(w);
    w.array(2).uint(time_ms).uint(seq);
    w.uint(3_600_000); // lifetime
    if let Some((offset, total)) = fragment {
        w.uint(offset).uint(total);
    }
}

/// Append a CRC-less canonical block.
pub fn canonical_block(w: &mut CborWriter, type_code: u64, number: u64, flags: u64, data: &[u8]) {
    w.array(5)
        .uint(type_code)
        .uint(number)
        .uint(flags)
        .uint(0)
        .bytes(data);
}

fn crc16_x25(data: &[u8]) -> u16 {
    let mut crc = 0xFFFFu16;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0x8408;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

/// Append a canonical block carrying a valid CRC field of the given type
/// (1 = CRC16 X-25, 2 = CRC32C), computed with the CRC bytes zeroed.
pub fn canonical_block_with_crc(
    w: &mut CborWriter,
    crc_type: u64,
    type_code: u64,
    number: u64,
    flags: u64,
    data: &[u8],
) {
    let crc_len = match crc_type {
        1 => 2,
        2 => 4,
        other => panic!("unsupported crc type {other}"),
    };
    let mut block = CborWriter::new();
    block
        .array(6)
        .uint(type_code)
        .uint(number)
        .uint(flags)
        .uint(crc_type)
        .bytes(data)
        .bytes(&vec![0u8; crc_len]);
    let mut bytes = block.into_vec();
    let end = bytes.len();
    match crc_type {
        1 => {
            let crc = crc16_x25(&bytes);
            bytes[end - 2..].copy_from_slice(&crc.to_be_bytes());
        }
        _ => {
            let crc = crc32c::crc32c(&bytes);
            bytes[end - 4..].copy_from_slice(&crc.to_be_bytes());
        }
    }
    w.raw(&bytes);
}

/// One complete non-fragment bundle: primary from `ipn:1.1` plus a single
/// payload block (type 1, number 1), indefinite framing, terminated.
pub fn simple_bundle(payload: &[u8]) -> Vec<u8> {
    let mut w = CborWriter::new();
    w.array_indef();
    ipn_primary(&mut w, 0, (1, 1), 1_000, 1, None);
    canonical_block(&mut w, 1, 1, 0, payload);
    w.break_marker();
    w.into_vec()
}

/// One payload fragment of a logical bundle identified by source/timestamp.
pub fn fragment_bundle(
    src: (u64, u64),
    time_ms: u64,
    seq: u64,
    offset: u64,
    total_len: u64,
    data: &[u8],
) -> Vec<u8> {
    let mut w = CborWriter::new();
    w.array_indef();
    ipn_primary(&mut w, 0, src, time_ms, seq, Some((offset, total_len)));
    canonical_block(&mut w, 1, 1, 0, data);
    w.break_marker();
    w.into_vec()
}

/// An administrative status-report bundle about the non-fragment subject
/// bundle `[subject_src, subject_time, subject_seq]`, asserting reception.
pub fn status_report_bundle(subject_src: (u64, u64), subject_time: u64, subject_seq: u64) -> Vec<u8> {
    let mut record = CborWriter::new();
    record.array(2).uint(1); // record type: bundle status report
    record.array(4);
    record.array(4);
    for asserted in [true, false, false, false] {
        record.array(1).boolean(asserted);
    }
    record.uint(0); // reason: no additional information
    ipn_eid(&mut record, subject_src.0, subject_src.1);
    record.array(2).uint(subject_time).uint(subject_seq);

    let mut w = CborWriter::new();
    w.array_indef();
    ipn_primary(&mut w, 0x02, (9, 9), 2_000, 5, None);
    canonical_block(&mut w, 1, 1, 0, record.as_slice());
    w.break_marker();
    w.into_vec()
}
