//! Item head structures
//!
//! One encoded item starts with a control byte whose top three bits select
//! the major type and whose bottom five bits select the argument encoding.

use crate::error::ErrorKind;

/// Major type of one encoded item (control byte bits 7-5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MajorType {
    /// Unsigned integer; the argument is the value.
    UnsignedInt,
    /// Negative integer; the value is `-(argument)-1`.
    NegativeInt,
    /// Byte string; the argument is the payload length.
    ByteString,
    /// Text string; the argument is the UTF-8 payload length.
    TextString,
    /// Array; the argument is the element count.
    Array,
    /// Map; the argument is the pair count.
    Map,
    /// Tag; the argument is the tag number, followed by exactly one item.
    Tag,
    /// Float, simple value, or break marker.
    Simple,
}

impl MajorType {
    /// Decode from the top three bits of a control byte.
    pub fn from_code(code: u8) -> Self {
        match code & 0x07 {
            0 => MajorType::UnsignedInt,
            1 => MajorType::NegativeInt,
            2 => MajorType::ByteString,
            3 => MajorType::TextString,
            4 => MajorType::Array,
            5 => MajorType::Map,
            6 => MajorType::Tag,
            _ => MajorType::Simple,
        }
    }

    /// Whether minor value 31 is a defined encoding for this major type.
    ///
    /// Strings, arrays, and maps use it as the indefinite-length marker;
    /// the simple major uses it as the break marker.
    pub fn allows_indefinite(self) -> bool {
        matches!(
            self,
            MajorType::ByteString
                | MajorType::TextString
                | MajorType::Array
                | MajorType::Map
                | MajorType::Simple
        )
    }
}

/// Simple-value minor for `false`.
pub const SIMPLE_FALSE: u8 = 20;
/// Simple-value minor for `true`.
pub const SIMPLE_TRUE: u8 = 21;
/// Simple-value minor for `null`.
pub const SIMPLE_NULL: u8 = 22;
/// Simple-value minor for `undefined`.
pub const SIMPLE_UNDEFINED: u8 = 23;
/// Minor value marking indefinite length, or a break on the simple major.
pub const MINOR_INDEFINITE: u8 = 31;

/// One decoded item head.
///
/// Ephemeral: produced and consumed within a single chunk read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemHead {
    /// Major type from the control byte.
    pub major: MajorType,
    /// Minor value (control byte bits 4-0).
    pub minor: u8,
    /// Decoded numeric argument; zero for indefinite or malformed heads.
    pub argument: u64,
    /// Number of encoded bytes this head occupied.
    pub encoded_len: usize,
    /// Structural finding, if the head encoding was invalid.
    pub error: Option<ErrorKind>,
}

impl ItemHead {
    /// Whether this head is the break marker terminating an indefinite item.
    pub fn is_break(&self) -> bool {
        self.major == MajorType::Simple && self.minor == MINOR_INDEFINITE
    }

    /// Whether this head opens an indefinite-length string or container.
    pub fn is_indefinite(&self) -> bool {
        self.minor == MINOR_INDEFINITE
            && self.error.is_none()
            && matches!(
                self.major,
                MajorType::ByteString | MajorType::TextString | MajorType::Array | MajorType::Map
            )
    }
}
