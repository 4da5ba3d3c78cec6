//! bpscan test utilities
//!
//! Helpers for constructing encoded test inputs: a minimal CBOR writer and
//! ready-made bundle builders. Test-only; the decoder crates never encode.

pub mod bundles;
pub mod writer;

pub use bundles::{
    canonical_block, canonical_block_with_crc, dtn_none, fragment_bundle, ipn_eid, ipn_primary,
    simple_bundle, status_report_bundle,
};
pub use writer::CborWriter;
