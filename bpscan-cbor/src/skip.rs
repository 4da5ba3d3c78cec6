//! Recursive item skipping
//!
//! Walks one item, including arbitrarily nested contents, without
//! materializing it; used to discard unknown or invalid substructures while
//! keeping the cursor aligned on item boundaries.

use crate::cursor::Cursor;
use crate::error::{DecodeError, Result};
use crate::head::MajorType;
use crate::limits::Limits;

impl<'a> Cursor<'a> {
    /// Skip exactly one item, advancing past all of its nested contents.
    ///
    /// Returns `Ok(false)` when the skipped region contained structural
    /// errors (including a bare break marker outside any indefinite
    /// container); the caller decides whether to keep the advanced offset or
    /// rewind to the item's start. Exhausting the buffer or the nesting
    /// limit is a hard error.
    pub fn skip_item(&mut self, limits: &Limits) -> Result<bool> {
        self.skip_nested(limits, 0)
    }

    fn skip_nested(&mut self, limits: &Limits, depth: usize) -> Result<bool> {
        if depth > limits.max_nesting_depth {
            return Err(DecodeError::DepthExceeded(limits.max_nesting_depth));
        }

        // read_chunk consumes string payloads wholly, so only containers
        // need descending into.
        let chunk = self.read_chunk(limits)?;
        if chunk.is_break() {
            // Not a valid item on its own.
            return Ok(false);
        }
        let mut clean = !chunk.has_structural_errors();

        match chunk.major {
            MajorType::Array => {
                if chunk.is_indefinite() {
                    while !self.consume_break()? {
                        clean &= self.skip_nested(limits, depth + 1)?;
                    }
                } else {
                    for _ in 0..chunk.argument {
                        clean &= self.skip_nested(limits, depth + 1)?;
                    }
                }
            }
            MajorType::Map => {
                if chunk.is_indefinite() {
                    while !self.consume_break()? {
                        clean &= self.skip_nested(limits, depth + 1)?;
                        if self.consume_break()? {
                            // Break between a key and its value.
                            clean = false;
                            break;
                        }
                        clean &= self.skip_nested(limits, depth + 1)?;
                    }
                } else {
                    for _ in 0..chunk.argument {
                        clean &= self.skip_nested(limits, depth + 1)?;
                        clean &= self.skip_nested(limits, depth + 1)?;
                    }
                }
            }
            _ => {}
        }

        Ok(clean)
    }
}
