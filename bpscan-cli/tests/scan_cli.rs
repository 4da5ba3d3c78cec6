//! End-to-end CLI tests

use assert_cmd::Command;
use bpscan_test_utils::{canonical_block, ipn_primary, simple_bundle, CborWriter};
use predicates::prelude::*;

fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().expect("temp file");
    std::fs::write(file.path(), bytes).expect("write input");
    file
}

fn two_bundle_stream() -> Vec<u8> {
    let mut stream = simple_bundle(b"first");
    let mut second = CborWriter::new();
    second.array_indef();
    ipn_primary(&mut second, 0, (2, 2), 2_000, 1, None);
    canonical_block(&mut second, 1, 1, 0, b"second");
    second.break_marker();
    stream.extend_from_slice(second.as_slice());
    stream
}

#[test]
fn scan_reports_bundle_count() {
    let file = write_temp(&two_bundle_stream());
    Command::cargo_bin("bpscan")
        .unwrap()
        .args(["scan"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("2 bundle(s), 0 error diagnostic(s)"))
        .stdout(predicate::str::contains("ipn:1.1"));
}

#[test]
fn scan_json_output_parses() {
    let file = write_temp(&two_bundle_stream());
    let output = Command::cargo_bin("bpscan")
        .unwrap()
        .args(["scan", "--format", "json"])
        .arg(file.path())
        .output()
        .expect("run bpscan");
    assert!(output.status.success());
    let summaries: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("valid JSON output");
    let array = summaries.as_array().expect("JSON array");
    assert_eq!(array.len(), 2);
    assert_eq!(array[0]["blocks"], 1);
    assert_eq!(array[1]["destination"], "ipn:2.1");
}

#[test]
fn malformed_middle_bundle_does_not_hide_later_ones() {
    let mut stream = simple_bundle(b"first");
    // Framed bundle whose canonical block is malformed.
    let mut middle = CborWriter::new();
    middle.array_indef();
    ipn_primary(&mut middle, 0, (3, 3), 3_000, 1, None);
    middle
        .array(5)
        .text("bad")
        .uint(9)
        .uint(0)
        .uint(0)
        .bytes(&[0x00]);
    canonical_block(&mut middle, 1, 1, 0, b"mid");
    middle.break_marker();
    stream.extend_from_slice(middle.as_slice());
    stream.extend_from_slice(&simple_bundle(b"third"));

    let file = write_temp(&stream);
    Command::cargo_bin("bpscan")
        .unwrap()
        .args(["scan"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("3 bundle(s)"));
}

#[test]
fn strict_mode_fails_on_error_diagnostics() {
    let mut stream = Vec::new();
    let mut w = CborWriter::new();
    w.array_indef();
    ipn_primary(&mut w, 0, (4, 4), 4_000, 1, None);
    // Two blocks declaring the same block number.
    canonical_block(&mut w, 7, 5, 0, &[0x00]);
    canonical_block(&mut w, 1, 5, 0, b"dup");
    w.break_marker();
    stream.extend_from_slice(w.as_slice());

    let file = write_temp(&stream);
    Command::cargo_bin("bpscan")
        .unwrap()
        .args(["scan", "--strict"])
        .arg(file.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("duplicate block number 5"));
}

#[test]
fn blocks_lists_block_graph() {
    let file = write_temp(&simple_bundle(b"payload"));
    Command::cargo_bin("bpscan")
        .unwrap()
        .args(["blocks"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("block 0: primary"))
        .stdout(predicate::str::contains("block 1: type 1"));
}

#[test]
fn config_file_overrides_limits() {
    let config = write_temp(b"[limits]\nmax_nesting_depth = 512\n[session]\nverify_crc = false\n");
    let file = write_temp(&simple_bundle(b"payload"));
    Command::cargo_bin("bpscan")
        .unwrap()
        .args(["scan", "--config"])
        .arg(config.path())
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1 bundle(s), 0 error diagnostic(s)"));
}
