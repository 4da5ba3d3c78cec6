//! Decoder registries for external collaborators
//!
//! Payload and security-context value dissection is delegated to
//! registered handlers; a raw-item fallback is always present, so absence
//! of a handler is never an error.

use std::fmt;

use ahash::AHashMap;
use bpscan_cbor::{Cursor, Diagnostics, Limits};

use crate::primary::PrimaryBlock;

/// Decodes a complete (possibly reassembled) payload.
pub trait PayloadDecoder: Send + Sync {
    /// Decode `data` in the context of the bundle's primary block.
    ///
    /// Returns the consumed length, or `None` when the payload is not
    /// handled by this decoder.
    fn decode(
        &self,
        primary: &PrimaryBlock,
        data: &[u8],
        limits: &Limits,
        diags: &mut Diagnostics,
    ) -> Option<usize>;
}

/// Decodes one security parameter or result value.
pub trait SecurityValueDecoder: Send + Sync {
    /// Decode one encoded value item. Returns the consumed length, or
    /// `None` when unhandled.
    fn decode(&self, raw: &[u8], limits: &Limits, diags: &mut Diagnostics) -> Option<usize>;
}

/// Fallback payload decoder: accepts any payload without interpretation.
#[derive(Debug, Default)]
pub struct RawPayloadDecoder;

impl PayloadDecoder for RawPayloadDecoder {
    fn decode(
        &self,
        _primary: &PrimaryBlock,
        data: &[u8],
        _limits: &Limits,
        _diags: &mut Diagnostics,
    ) -> Option<usize> {
        Some(data.len())
    }
}

/// Fallback value decoder: validates that the value is one well-formed item.
#[derive(Debug, Default)]
pub struct RawItemDecoder;

impl SecurityValueDecoder for RawItemDecoder {
    fn decode(&self, raw: &[u8], limits: &Limits, diags: &mut Diagnostics) -> Option<usize> {
        let mut cursor = Cursor::new(raw);
        match cursor.skip_item(limits) {
            Ok(true) => Some(cursor.position()),
            Ok(false) => {
                diags.warning("security", 0, "security value is not a clean item");
                Some(cursor.position())
            }
            Err(err) => {
                diags.error("security", 0, err.to_string());
                None
            }
        }
    }
}

/// Registry mapping dispatch keys to decoder implementations.
///
/// Payload decoders are keyed by the destination EID's scheme code;
/// security value decoders by `(context id, parameter-or-result type id)`.
#[derive(Default)]
pub struct DecoderRegistry {
    payload_by_scheme: AHashMap<u64, Box<dyn PayloadDecoder>>,
    security_values: AHashMap<(i64, u64), Box<dyn SecurityValueDecoder>>,
    raw_payload: RawPayloadDecoder,
    raw_value: RawItemDecoder,
}

impl DecoderRegistry {
    /// Registry with only the raw fallbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a payload decoder for a destination scheme code.
    pub fn register_payload(&mut self, scheme: u64, decoder: Box<dyn PayloadDecoder>) {
        self.payload_by_scheme.insert(scheme, decoder);
    }

    /// Register a security value decoder for `(context id, type id)`.
    pub fn register_security_value(
        &mut self,
        context_id: i64,
        type_id: u64,
        decoder: Box<dyn SecurityValueDecoder>,
    ) {
        self.security_values.insert((context_id, type_id), decoder);
    }

    /// Look up the payload decoder for a scheme; raw fallback when absent.
    pub fn payload_decoder(&self, scheme: u64) -> &dyn PayloadDecoder {
        self.payload_by_scheme
            .get(&scheme)
            .map(|decoder| &**decoder)
            .unwrap_or(&self.raw_payload)
    }

    /// Look up the value decoder for `(context id, type id)`; raw fallback
    /// when absent.
    pub fn security_value_decoder(
        &self,
        context_id: i64,
        type_id: u64,
    ) -> &dyn SecurityValueDecoder {
        self.security_values
            .get(&(context_id, type_id))
            .map(|decoder| &**decoder)
            .unwrap_or(&self.raw_value)
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("payload_decoders", &self.payload_by_scheme.len())
            .field("security_value_decoders", &self.security_values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_value_fallback_always_present() {
        let registry = DecoderRegistry::new();
        let decoder = registry.security_value_decoder(1, 1);
        let mut diags = Diagnostics::new();
        // One definite byte string item.
        let consumed = decoder.decode(&[0x42, 0x01, 0x02], &Limits::default(), &mut diags);
        assert_eq!(consumed, Some(3));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_raw_value_flags_truncated_item() {
        let registry = DecoderRegistry::new();
        let mut diags = Diagnostics::new();
        let consumed =
            registry
                .security_value_decoder(9, 9)
                .decode(&[0x42, 0x01], &Limits::default(), &mut diags);
        assert_eq!(consumed, None);
        assert_eq!(diags.error_count(), 1);
    }
}
