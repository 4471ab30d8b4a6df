//! ROM access layer for n64rip.
//!
//! This crate turns logical N64 pointers into concrete bytes:
//!
//! - [`SourceImage`] - A memory-mapped or owned ROM image, normalized to
//!   big-endian (`.z64`) byte order
//! - [`SegmentTable`] - Resolves segment-tagged addresses against the
//!   segment windows declared so far in a run
//! - [`DecompressionCache`] - Serves decoded windows, decoding each range
//!   once through a [`Decompressor`] collaborator
//!
//! # Example
//!
//! ```
//! use n64rip_rom::{DecoderRegistry, DecompressionCache, SegmentTable, SourceId, SourceSet};
//!
//! let mut sources = SourceSet::new();
//! let rom = sources.add_bytes("rom", vec![0u8; 0x100]);
//!
//! let mut segments = SegmentTable::new();
//! segments.declare_segment(6, rom, 0x40, 0x80);
//! assert_eq!(segments.resolve(0x0600_0010).unwrap(), 0x50);
//!
//! let decoders = DecoderRegistry::new();
//! let mut cache = DecompressionCache::new();
//! let window = cache
//!     .fetch("none", decoders.get("none")?, sources.get(rom)?, 0x50, 0x60)?;
//! assert_eq!(window.len(), 0x10);
//! # Ok::<(), n64rip_rom::Error>(())
//! ```

mod cache;
mod error;
mod segment;
mod source;

pub use cache::{DecoderRegistry, DecompressionCache, Decompressor, Uncompressed, CODEC_NONE};
pub use error::{DecodeError, Error, Result};
pub use segment::{
    is_segmented, segment_number, segment_offset, LogicalAddress, ResolvedAddress,
    SegmentMapping, SegmentTable,
};
pub use source::{RomFormat, SourceId, SourceImage, SourceSet};
