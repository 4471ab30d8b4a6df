//! Error types for the ROM crate.

use thiserror::Error;

/// Failures reported by a decompression collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Requested window lies outside the source image.
    #[error("window {start:#x}..{end:#x} outside source of {len:#x} bytes")]
    OutOfRange { start: u32, end: u32, len: usize },

    /// Compressed data is malformed.
    #[error("malformed compressed data: {0}")]
    Malformed(String),

    /// Collaborator produced fewer bytes than the window requires.
    #[error("decoded {actual} bytes but the window needs {expected}")]
    ShortOutput { expected: usize, actual: usize },

    /// No decoder registered under this name.
    #[error("unknown codec: {0}")]
    UnknownCodec(String),
}

/// Errors that can occur when reading from ROM sources.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] n64rip_common::Error),

    /// Address names a segment that has not been declared yet.
    #[error("unmapped segment {segment:#04x} for address {address:#010x}")]
    UnmappedSegment { segment: u8, address: u32 },

    /// Source id is not registered.
    #[error("unknown source id {0}")]
    UnknownSource(u32),

    /// Decompression collaborator failed.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Result type for ROM operations.
pub type Result<T> = std::result::Result<T, Error>;
