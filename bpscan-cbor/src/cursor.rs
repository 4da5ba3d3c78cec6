//! Byte cursor over one input buffer

use crate::error::{DecodeError, ErrorKind, Result};
use crate::head::{ItemHead, MajorType};

/// Forward-only cursor over a borrowed byte buffer.
///
/// All reads either complete and advance the position, or fail with a hard
/// [`DecodeError::BoundsExceeded`] leaving the position where the failed
/// read began its final access.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Cursor at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Cursor at an explicit offset into `buf`.
    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    /// Current byte offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Reset the byte offset, e.g. to re-skip a malformed item conservatively.
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Bytes remaining past the current position.
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Whether the cursor is at the end of the buffer.
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// The underlying buffer.
    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    /// Consume exactly `n` bytes or fail without advancing.
    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or(DecodeError::BoundsExceeded {
                offset: self.pos,
                needed: n.saturating_sub(self.remaining()),
            })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Read exactly one item head, advancing past it.
    ///
    /// An undefined minor encoding (28-30, or 31 on a major type that has no
    /// indefinite form) is flagged on the head but the control byte is still
    /// consumed, so the caller can keep walking the stream.
    pub fn read_head(&mut self) -> Result<ItemHead> {
        let start = self.pos;
        let control = self.take(1)?[0];
        let major = MajorType::from_code(control >> 5);
        let minor = control & 0x1F;

        let mut error = None;
        let argument = match minor {
            0..=23 => u64::from(minor),
            24..=27 => {
                let width = 1usize << (minor - 24);
                let bytes = self.take(width)?;
                bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
            }
            28..=30 => {
                error = Some(ErrorKind::Malformed);
                0
            }
            _ => {
                if !major.allows_indefinite() {
                    error = Some(ErrorKind::Malformed);
                }
                0
            }
        };

        Ok(ItemHead {
            major,
            minor,
            argument,
            encoded_len: self.pos - start,
            error,
        })
    }

    /// Consume a break marker if one is next; position is untouched otherwise.
    pub fn consume_break(&mut self) -> Result<bool> {
        let saved = self.pos;
        let head = self.read_head()?;
        if head.is_break() {
            Ok(true)
        } else {
            self.pos = saved;
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_head_small_literal() {
        let mut cursor = Cursor::new(&[0x17]);
        let head = cursor.read_head().unwrap();
        assert_eq!(head.major, MajorType::UnsignedInt);
        assert_eq!(head.argument, 23);
        assert_eq!(head.encoded_len, 1);
        assert!(head.error.is_none());
        assert!(cursor.is_at_end());
    }

    #[test]
    fn test_read_head_follow_on_widths() {
        // 1, 2, 4, 8 byte big-endian arguments
        let cases: &[(&[u8], u64)] = &[
            (&[0x18, 0x2A], 42),
            (&[0x19, 0x12, 0x34], 0x1234),
            (&[0x1A, 0xDE, 0xAD, 0xBE, 0xEF], 0xDEAD_BEEF),
            (
                &[0x1B, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08],
                0x0102_0304_0506_0708,
            ),
        ];
        for (bytes, expected) in cases {
            let mut cursor = Cursor::new(bytes);
            let head = cursor.read_head().unwrap();
            assert_eq!(head.argument, *expected);
            assert_eq!(head.encoded_len, bytes.len());
        }
    }

    #[test]
    fn test_read_head_reserved_minor_flagged_but_advances() {
        let mut cursor = Cursor::new(&[0x1C, 0x00]);
        let head = cursor.read_head().unwrap();
        assert_eq!(head.error, Some(ErrorKind::Malformed));
        assert_eq!(head.encoded_len, 1);
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_read_head_indefinite_on_integer_is_malformed() {
        // 0x3F = negative integer with minor 31
        let mut cursor = Cursor::new(&[0x3F]);
        let head = cursor.read_head().unwrap();
        assert_eq!(head.major, MajorType::NegativeInt);
        assert_eq!(head.error, Some(ErrorKind::Malformed));
    }

    #[test]
    fn test_read_head_break_marker() {
        let mut cursor = Cursor::new(&[0xFF]);
        let head = cursor.read_head().unwrap();
        assert!(head.is_break());
        assert!(head.error.is_none());
    }

    #[test]
    fn test_read_head_truncated_argument() {
        let mut cursor = Cursor::new(&[0x19, 0x12]);
        match cursor.read_head() {
            Err(DecodeError::BoundsExceeded { offset, needed }) => {
                assert_eq!(offset, 1);
                assert_eq!(needed, 1);
            }
            other => panic!("expected BoundsExceeded, got {other:?}"),
        }
    }

    #[test]
    fn test_read_head_empty_buffer() {
        let mut cursor = Cursor::new(&[]);
        assert!(matches!(
            cursor.read_head(),
            Err(DecodeError::BoundsExceeded { offset: 0, .. })
        ));
    }

    #[test]
    fn test_consume_break_restores_position() {
        let mut cursor = Cursor::new(&[0x00, 0xFF]);
        assert!(!cursor.consume_break().unwrap());
        assert_eq!(cursor.position(), 0);
        cursor.set_position(1);
        assert!(cursor.consume_break().unwrap());
        assert_eq!(cursor.position(), 2);
    }
}
