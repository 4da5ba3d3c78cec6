//! Tag-aware chunk reading
//!
//! A chunk is one fully-resolved item head at a given offset: leading tags
//! consumed and recorded, and, for string types, the payload materialized
//! even when it arrives as an indefinite-length sequence of sub-chunks.

use std::borrow::Cow;

use smallvec::SmallVec;

use crate::cursor::Cursor;
use crate::error::{ChunkError, ErrorKind, Result};
use crate::head::{ItemHead, MajorType, MINOR_INDEFINITE};
use crate::limits::Limits;

/// One recorded tag head preceding an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagHead {
    /// Offset of the tag's control byte.
    pub offset: usize,
    /// Encoded length of the tag head.
    pub len: usize,
    /// Tag number.
    pub value: u64,
}

/// One decoded item with its tags, findings, and materialized payload.
///
/// Owned by the caller for the duration of one decode step; never shared
/// across steps.
#[derive(Debug, Clone)]
pub struct Chunk<'a> {
    /// Offset of the first byte belonging to this chunk (first tag, if any).
    pub start: usize,
    /// Encoded length of the head region: tags plus the item head itself.
    pub head_len: usize,
    /// Total encoded length consumed, including any string payload.
    pub total_len: usize,
    /// Major type of the item (after tag resolution).
    pub major: MajorType,
    /// Minor value of the item head.
    pub minor: u8,
    /// Numeric argument of the item head.
    pub argument: u64,
    /// Tags recorded in encoding order; not semantically interpreted.
    pub tags: SmallVec<[TagHead; 2]>,
    /// Soft findings accumulated while reading this chunk.
    pub errors: Vec<ChunkError>,
    /// Materialized payload; `Some` (possibly empty) for string types only.
    pub payload: Option<Cow<'a, [u8]>>,
}

impl<'a> Chunk<'a> {
    /// Whether the item declared indefinite length.
    pub fn is_indefinite(&self) -> bool {
        self.minor == MINOR_INDEFINITE
            && matches!(
                self.major,
                MajorType::ByteString | MajorType::TextString | MajorType::Array | MajorType::Map
            )
    }

    /// Whether this chunk is a bare break marker.
    pub fn is_break(&self) -> bool {
        self.major == MajorType::Simple && self.minor == MINOR_INDEFINITE
    }

    /// True when any finding above informational severity was recorded.
    pub fn has_structural_errors(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.kind != ErrorKind::IndefiniteString)
    }

    /// Append one finding.
    pub fn push_error(&mut self, error: ChunkError) {
        self.errors.push(error);
    }
}

/// Clamp a declared string length to the configured maximum, recording an
/// overflow finding when the claim exceeds it.
fn clamp_string_len(argument: u64, limits: &Limits, errors: &mut Vec<ChunkError>) -> usize {
    let max = limits.max_string_len as u64;
    if argument > max {
        errors.push(ChunkError::with_detail(
            ErrorKind::Overflow,
            format!("string length {argument} exceeds limit {max}"),
        ));
        limits.max_string_len
    } else {
        argument as usize
    }
}

impl<'a> Cursor<'a> {
    /// Read one logical item: consume leading tags, resolve the item head,
    /// and materialize string payloads.
    ///
    /// Structural findings are collected on the returned chunk instead of
    /// failing the read; only exhausting the buffer is a hard error.
    pub fn read_chunk(&mut self, limits: &Limits) -> Result<Chunk<'a>> {
        let start = self.position();
        let mut tags: SmallVec<[TagHead; 2]> = SmallVec::new();
        let mut errors = Vec::new();

        let head = loop {
            let tag_offset = self.position();
            let head = self.read_head()?;
            if head.major == MajorType::Tag && head.error.is_none() {
                if tags.len() == limits.max_tag_chain {
                    errors.push(ChunkError::with_detail(
                        ErrorKind::Malformed,
                        format!("tag chain longer than {}", limits.max_tag_chain),
                    ));
                }
                tags.push(TagHead {
                    offset: tag_offset,
                    len: head.encoded_len,
                    value: head.argument,
                });
                continue;
            }
            break head;
        };

        if let Some(kind) = head.error {
            errors.push(ChunkError::new(kind));
        }
        let head_len = self.position() - start;

        let payload = match head.major {
            MajorType::ByteString | MajorType::TextString => {
                Some(self.read_string_payload(&head, limits, &mut errors)?)
            }
            _ => None,
        };

        Ok(Chunk {
            start,
            head_len,
            total_len: self.position() - start,
            major: head.major,
            minor: head.minor,
            argument: head.argument,
            tags,
            errors,
            payload,
        })
    }

    fn read_string_payload(
        &mut self,
        head: &ItemHead,
        limits: &Limits,
        errors: &mut Vec<ChunkError>,
    ) -> Result<Cow<'a, [u8]>> {
        if head.error.is_some() {
            // Head was malformed; the payload length is unknowable. Yield an
            // empty payload so string callers never observe `None`.
            return Ok(Cow::Borrowed(&[]));
        }

        if !head.is_indefinite() {
            let len = clamp_string_len(head.argument, limits, errors);
            return Ok(Cow::Borrowed(self.take(len)?));
        }

        // Indefinite: assemble definite sub-chunks until a break marker.
        let mut assembled: Vec<u8> = Vec::new();
        loop {
            let child = self.read_head()?;
            if child.is_break() {
                break;
            }
            if let Some(kind) = child.error {
                errors.push(ChunkError::with_detail(
                    kind,
                    "invalid sub-chunk inside indefinite string",
                ));
                continue;
            }
            if child.major != head.major {
                errors.push(ChunkError::with_detail(
                    ErrorKind::WrongType,
                    "indefinite string sub-chunk of mismatched type",
                ));
                match child.major {
                    // A definite string of the wrong flavour can be stepped
                    // over; anything with nested content cannot be followed
                    // safely from here.
                    MajorType::ByteString | MajorType::TextString
                        if child.minor != MINOR_INDEFINITE =>
                    {
                        let len = clamp_string_len(child.argument, limits, errors);
                        self.take(len)?;
                        continue;
                    }
                    MajorType::UnsignedInt | MajorType::NegativeInt | MajorType::Simple => {
                        continue;
                    }
                    _ => break,
                }
            }
            if child.minor == MINOR_INDEFINITE {
                errors.push(ChunkError::with_detail(
                    ErrorKind::Malformed,
                    "nested indefinite string",
                ));
                continue;
            }
            let len = clamp_string_len(child.argument, limits, errors);
            assembled.extend_from_slice(self.take(len)?);
        }
        errors.push(ChunkError::new(ErrorKind::IndefiniteString));
        Ok(Cow::Owned(assembled))
    }
}
