//! Error types for n64rip-common.

use thiserror::Error;

/// Common error type for n64rip codec operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A read ran past the end of the buffer.
    #[error("out of bounds at {offset:#x}: needed {needed} bytes but only {available} available")]
    OutOfBounds {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A bitfield was requested before any integer was read.
    #[error("no integer has been read to extract a bitfield from")]
    NoBitfieldSource,

    /// Bitfield does not fit in a 32-bit word.
    #[error("invalid bitfield: width {width} at bit {bit_offset}")]
    InvalidBitfield { width: u32, bit_offset: u32 },

    /// Value does not fit in its bitfield.
    #[error("value {value} does not fit in bitfield {field}")]
    BitfieldOverflow { field: &'static str, value: i64 },

    /// Unknown resource kind tag in an envelope.
    #[error("unknown resource type tag {0:#010x}")]
    UnknownResourceType(u32),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
