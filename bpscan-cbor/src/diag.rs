//! Diagnostic collection for structural findings
//!
//! The decode core never formats human-readable trees; it hands
//! (severity, category, offset, message) tuples to whoever is hosting it.

use crate::chunk::Chunk;
use crate::error::ErrorKind;

/// Severity of one diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational; the input is valid but worth mentioning.
    Note,
    /// Suspicious but decodable.
    Warning,
    /// Structurally wrong; the affected item is at best partially decoded.
    Error,
}

impl ErrorKind {
    /// Severity a finding of this kind surfaces at.
    pub fn severity(self) -> Severity {
        match self {
            ErrorKind::IndefiniteString => Severity::Note,
            ErrorKind::Overflow | ErrorKind::Inconsistent => Severity::Warning,
            ErrorKind::Malformed
            | ErrorKind::WrongType
            | ErrorKind::ArraySizeOutOfRange
            | ErrorKind::ReferenceUnresolved => Severity::Error,
        }
    }
}

/// One reported finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// How serious the finding is.
    pub severity: Severity,
    /// Subsystem that produced it, e.g. `"cbor"` or `"primary-block"`.
    pub category: &'static str,
    /// Byte offset the finding refers to.
    pub offset: usize,
    /// Human-readable message.
    pub message: String,
}

/// Ordered collection of findings for one decode invocation.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Record a note.
    pub fn note(&mut self, category: &'static str, offset: usize, message: impl Into<String>) {
        self.items.push(Diagnostic {
            severity: Severity::Note,
            category,
            offset,
            message: message.into(),
        });
    }

    /// Record a warning.
    pub fn warning(&mut self, category: &'static str, offset: usize, message: impl Into<String>) {
        self.items.push(Diagnostic {
            severity: Severity::Warning,
            category,
            offset,
            message: message.into(),
        });
    }

    /// Record an error.
    pub fn error(&mut self, category: &'static str, offset: usize, message: impl Into<String>) {
        self.items.push(Diagnostic {
            severity: Severity::Error,
            category,
            offset,
            message: message.into(),
        });
    }

    /// Convert every finding on `chunk` into a diagnostic under `category`.
    pub fn absorb_chunk(&mut self, category: &'static str, chunk: &Chunk<'_>) {
        for err in &chunk.errors {
            self.items.push(Diagnostic {
                severity: err.kind.severity(),
                category,
                offset: chunk.start,
                message: err.message().to_string(),
            });
        }
    }

    /// All findings in report order.
    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    /// Number of findings at `Severity::Error`.
    pub fn error_count(&self) -> usize {
        self.items
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// True when no finding rises above `Severity::Note`.
    pub fn is_clean(&self) -> bool {
        self.items.iter().all(|d| d.severity == Severity::Note)
    }

    /// True when nothing at all was reported.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Consume the collection.
    pub fn into_items(self) -> Vec<Diagnostic> {
        self.items
    }
}
