//! Common utilities for n64rip.
//!
//! This crate provides the codec primitives every asset kind is built on:
//!
//! - [`BinaryReader`] - Endian-aware, zero-copy cursor over a byte slice
//! - [`BinaryWriter`] - Endian-aware byte sink with the resource envelope
//! - [`bitfield`] - Declarative bitfield schemas for packed records
//! - [`ResourceType`] - Kind tags written at the start of binary resources

mod endian;
mod error;
mod reader;
mod resource;
mod writer;

pub mod bitfield;

pub use endian::Endianness;
pub use error::{Error, Result};
pub use reader::BinaryReader;
pub use resource::{ResourceHeader, ResourceType, RESOURCE_HEADER_SIZE};
pub use writer::BinaryWriter;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
