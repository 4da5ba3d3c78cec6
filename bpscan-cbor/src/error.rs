//! Error types for CBOR item decoding

use thiserror::Error;

/// Hard decode failures.
///
/// These abort the current item read and propagate to the caller; they are
/// distinct from the soft [`ChunkError`] list accumulated on a chunk, which
/// describes structural problems the decoder recovered from.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Not enough bytes remain to read a head or a definite-length payload.
    #[error("input exhausted at offset {offset}: need {needed} more byte(s)")]
    BoundsExceeded {
        /// Offset at which the read was attempted.
        offset: usize,
        /// Number of bytes missing from the buffer.
        needed: usize,
    },
    /// Nested containers exceeded the configured depth limit.
    #[error("nesting depth limit {0} exceeded")]
    DepthExceeded(usize),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Kinds of soft structural findings attached to a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The encoding itself is invalid per the format grammar.
    Malformed,
    /// A value is syntactically valid but exceeds the representable range.
    Overflow,
    /// Caller required a specific major type and got another.
    WrongType,
    /// Required element count bounds were violated.
    ArraySizeOutOfRange,
    /// An indefinite-length string was used (informational, not an error).
    IndefiniteString,
    /// A declared block-number target does not exist.
    ReferenceUnresolved,
    /// Conflicting claims across related items (e.g. fragment totals).
    Inconsistent,
}

impl ErrorKind {
    /// Short human-readable description used when no detail is attached.
    pub fn describe(self) -> &'static str {
        match self {
            ErrorKind::Malformed => "malformed encoding",
            ErrorKind::Overflow => "value exceeds representable range",
            ErrorKind::WrongType => "unexpected major type",
            ErrorKind::ArraySizeOutOfRange => "element count out of range",
            ErrorKind::IndefiniteString => "indefinite-length string used",
            ErrorKind::ReferenceUnresolved => "reference to non-existent block",
            ErrorKind::Inconsistent => "inconsistent values",
        }
    }
}

/// One soft finding recorded while decoding a chunk.
///
/// Multiple findings may attach to one chunk; none are fatal unless the
/// caller chooses to abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkError {
    /// Classification of the finding.
    pub kind: ErrorKind,
    /// Optional human-readable detail.
    pub detail: Option<String>,
}

impl ChunkError {
    /// A finding with no extra detail.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, detail: None }
    }

    /// A finding carrying a human-readable detail string.
    pub fn with_detail(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: Some(detail.into()),
        }
    }

    /// The message to surface for this finding.
    pub fn message(&self) -> &str {
        self.detail.as_deref().unwrap_or_else(|| self.kind.describe())
    }
}
