//! bpscan CBOR - Single-item decode primitives for untrusted input
//!
//! This crate provides the item-at-a-time decoding layer for bpscan with no
//! I/O dependencies. It includes:
//!
//! - Item head reading (major/minor type and numeric argument)
//! - Tag-aware chunk reading with indefinite-string assembly
//! - Recursive skipping of nested structures
//! - Typed extractors
//! - Error types and diagnostics
//! - Decode limits
//!
//! Soft structural findings accumulate on the chunk being decoded; only
//! exhausting the input buffer (or the nesting limit) is a hard error.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod chunk;
pub mod cursor;
pub mod diag;
pub mod error;
pub mod extract;
pub mod head;
pub mod limits;
pub mod skip;

// Re-export commonly used types
pub use chunk::{Chunk, TagHead};
pub use cursor::Cursor;
pub use diag::{Diagnostic, Diagnostics, Severity};
pub use error::{ChunkError, DecodeError, ErrorKind, Result};
pub use head::{ItemHead, MajorType};
pub use limits::Limits;
