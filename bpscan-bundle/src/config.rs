//! Bundle decode configuration

use ahash::AHashMap;
use bpscan_cbor::Limits;

use crate::block::{
    BLOCK_TYPE_BUNDLE_AGE, BLOCK_TYPE_HOP_COUNT, BLOCK_TYPE_PAYLOAD, BLOCK_TYPE_PREVIOUS_NODE,
};
use crate::registry::DecoderRegistry;

/// Configuration for decoding one bundle.
#[derive(Debug)]
pub struct BundleConfig {
    /// Item decode limits.
    pub limits: Limits,
    /// Whether to recompute and check declared block CRCs.
    pub verify_crc: bool,
    /// Per-type canonical block count caps; types not listed are unlimited.
    pub block_type_caps: AHashMap<u64, usize>,
    /// Payload and security value decoders.
    pub registry: DecoderRegistry,
}

impl Default for BundleConfig {
    fn default() -> Self {
        let mut block_type_caps = AHashMap::new();
        for reserved in [
            BLOCK_TYPE_PAYLOAD,
            BLOCK_TYPE_PREVIOUS_NODE,
            BLOCK_TYPE_BUNDLE_AGE,
            BLOCK_TYPE_HOP_COUNT,
        ] {
            block_type_caps.insert(reserved, 1);
        }
        Self {
            limits: Limits::default(),
            verify_crc: true,
            block_type_caps,
            registry: DecoderRegistry::new(),
        }
    }
}
