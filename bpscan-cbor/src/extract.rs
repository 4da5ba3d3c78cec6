//! Typed extraction from decoded chunks
//!
//! Each extractor converts a chunk into a required domain type, or records a
//! finding on the chunk and returns `None`. Findings go onto the chunk's own
//! error list, not a separate channel.

use std::borrow::Cow;

use crate::chunk::Chunk;
use crate::error::{ChunkError, ErrorKind};
use crate::head::{MajorType, SIMPLE_FALSE, SIMPLE_NULL, SIMPLE_TRUE, SIMPLE_UNDEFINED};

impl<'a> Chunk<'a> {
    /// Extract a boolean; requires the simple major with minor 20 or 21.
    pub fn require_bool(&mut self) -> Option<bool> {
        if self.major == MajorType::Simple {
            match self.minor {
                SIMPLE_FALSE => return Some(false),
                SIMPLE_TRUE => return Some(true),
                _ => {}
            }
        }
        self.push_error(ChunkError::with_detail(
            ErrorKind::WrongType,
            "expected boolean",
        ));
        None
    }

    /// Extract an unsigned integer; the value is the argument verbatim.
    pub fn require_uint(&mut self) -> Option<u64> {
        if self.major == MajorType::UnsignedInt {
            Some(self.argument)
        } else {
            self.push_error(ChunkError::with_detail(
                ErrorKind::WrongType,
                "expected unsigned integer",
            ));
            None
        }
    }

    /// Extract a signed integer from either integer major.
    ///
    /// Negative-integer arguments map to `-(argument)-1`. Values outside the
    /// signed 64-bit range saturate and record one overflow finding.
    pub fn require_int(&mut self) -> Option<i64> {
        match self.major {
            MajorType::UnsignedInt => {
                if self.argument > i64::MAX as u64 {
                    self.push_error(ChunkError::with_detail(
                        ErrorKind::Overflow,
                        format!("unsigned value {} saturated to i64::MAX", self.argument),
                    ));
                    Some(i64::MAX)
                } else {
                    Some(self.argument as i64)
                }
            }
            MajorType::NegativeInt => {
                if self.argument > i64::MAX as u64 {
                    self.push_error(ChunkError::with_detail(
                        ErrorKind::Overflow,
                        format!("negative value -({})-1 saturated to i64::MIN", self.argument),
                    ));
                    Some(i64::MIN)
                } else {
                    Some(-(self.argument as i64) - 1)
                }
            }
            _ => {
                self.push_error(ChunkError::with_detail(
                    ErrorKind::WrongType,
                    "expected integer",
                ));
                None
            }
        }
    }

    /// Extract a UTF-8 text string.
    pub fn require_text(&mut self) -> Option<Cow<'a, str>> {
        if self.major != MajorType::TextString {
            self.push_error(ChunkError::with_detail(
                ErrorKind::WrongType,
                "expected text string",
            ));
            return None;
        }
        match self.payload.clone() {
            Some(Cow::Borrowed(bytes)) => match std::str::from_utf8(bytes) {
                Ok(text) => Some(Cow::Borrowed(text)),
                Err(_) => {
                    self.push_error(ChunkError::with_detail(
                        ErrorKind::Malformed,
                        "text string is not valid UTF-8",
                    ));
                    None
                }
            },
            Some(Cow::Owned(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => Some(Cow::Owned(text)),
                Err(_) => {
                    self.push_error(ChunkError::with_detail(
                        ErrorKind::Malformed,
                        "text string is not valid UTF-8",
                    ));
                    None
                }
            },
            None => None,
        }
    }

    /// Extract a byte string payload; borrowed (zero-copy) when definite.
    pub fn require_bytes(&mut self) -> Option<Cow<'a, [u8]>> {
        if self.major != MajorType::ByteString {
            self.push_error(ChunkError::with_detail(
                ErrorKind::WrongType,
                "expected byte string",
            ));
            return None;
        }
        self.payload.clone()
    }

    /// Require a definite-length array whose element count lies in
    /// `[min, max]`; returns the count.
    pub fn require_array(&mut self, min: u64, max: u64) -> Option<u64> {
        self.require_countable(MajorType::Array, "array", min, max)
    }

    /// Require a definite-length map whose pair count lies in `[min, max]`;
    /// returns the count.
    pub fn require_map(&mut self, min: u64, max: u64) -> Option<u64> {
        self.require_countable(MajorType::Map, "map", min, max)
    }

    fn require_countable(
        &mut self,
        major: MajorType,
        name: &str,
        min: u64,
        max: u64,
    ) -> Option<u64> {
        if self.major != major {
            self.push_error(ChunkError::with_detail(
                ErrorKind::WrongType,
                format!("expected {name}"),
            ));
            return None;
        }
        if self.is_indefinite() {
            self.push_error(ChunkError::with_detail(
                ErrorKind::Malformed,
                format!("indefinite-length {name} where definite required"),
            ));
            return None;
        }
        if self.argument < min || self.argument > max {
            self.push_error(ChunkError::with_detail(
                ErrorKind::ArraySizeOutOfRange,
                format!(
                    "{name} has {} elements, expected {min}..={max}",
                    self.argument
                ),
            ));
            return None;
        }
        Some(self.argument)
    }

    /// Extract a float; requires the simple major with minor 25, 26, or 27.
    pub fn require_float(&mut self) -> Option<f64> {
        if self.major == MajorType::Simple {
            match self.minor {
                25 => return Some(half_to_f64(self.argument as u16)),
                26 => return Some(f64::from(f32::from_bits(self.argument as u32))),
                27 => return Some(f64::from_bits(self.argument)),
                _ => {}
            }
        }
        self.push_error(ChunkError::with_detail(
            ErrorKind::WrongType,
            "expected float",
        ));
        None
    }

    /// Whether this chunk encodes the simple value `null`.
    pub fn is_null(&self) -> bool {
        self.major == MajorType::Simple && self.minor == SIMPLE_NULL
    }

    /// Whether this chunk encodes the simple value `undefined`.
    pub fn is_undefined(&self) -> bool {
        self.major == MajorType::Simple && self.minor == SIMPLE_UNDEFINED
    }
}

/// Expand an IEEE 754 binary16 value to f64.
fn half_to_f64(half: u16) -> f64 {
    let sign = if half & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exponent = (half >> 10) & 0x1F;
    let mantissa = f64::from(half & 0x03FF);
    match exponent {
        0 => sign * mantissa * 2f64.powi(-24),
        31 => {
            if mantissa == 0.0 {
                sign * f64::INFINITY
            } else {
                f64::NAN
            }
        }
        _ => sign * (1.0 + mantissa / 1024.0) * 2f64.powi(i32::from(exponent) - 15),
    }
}
