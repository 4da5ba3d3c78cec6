//! bpscan bundle engine - Block graph assembly for BPv7 bundles
//!
//! This crate layers the RFC 9171 bundle structure (and the RFC 9172
//! security-block relationships) on top of the item decoder:
//!
//! - Primary and canonical block decoding
//! - Block graph assembly with block-number indexing
//! - Endpoint ID and creation-timestamp decoding
//! - Block CRC verification (CRC16 X-25 / CRC32C)
//! - Security block decoding and target back-references
//! - Administrative record (status report) decoding
//! - Decoder registries for payload and security-value collaborators

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod admin;
pub mod block;
pub mod config;
pub mod crc;
pub mod eid;
mod field;
pub mod graph;
pub mod primary;
pub mod registry;
pub mod security;

// Re-export commonly used types
pub use admin::{AdminRecord, StatusAssertion, StatusReport};
pub use block::{CanonicalBlock, HopCount};
pub use config::BundleConfig;
pub use crc::CrcType;
pub use eid::Eid;
pub use graph::{decode_bundle, Bundle};
pub use primary::{BundleIdentity, CreationTimestamp, PrimaryBlock};
pub use registry::{DecoderRegistry, PayloadDecoder, SecurityValueDecoder};
pub use security::{AbstractSecurityBlock, SecurityKind, SecurityValue};

// Re-export the decode layer for downstream crates
pub use bpscan_cbor::{Diagnostic, Diagnostics, Limits, Severity};
