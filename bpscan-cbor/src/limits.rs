//! Decode limits and configuration

/// Limits applied while decoding untrusted input.
///
/// Every limit has a permissive default; hosts decoding hostile captures
/// should tighten them to their own budget.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum materialized string payload length in bytes (default: 64 MiB).
    ///
    /// Declared lengths above this are clamped and recorded as an
    /// `Overflow` finding on the chunk.
    pub max_string_len: usize,
    /// Maximum container nesting depth the skipper will walk (default: 256).
    pub max_nesting_depth: usize,
    /// Maximum number of leading tags consumed for one item (default: 16).
    pub max_tag_chain: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_string_len: 64 * 1024 * 1024,
            max_nesting_depth: 256,
            max_tag_chain: 16,
        }
    }
}
