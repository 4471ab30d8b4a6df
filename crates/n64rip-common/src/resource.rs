//! Binary resource envelope.
//!
//! Every binary export begins with an 8-byte envelope: a `u32` kind tag
//! followed by a `u32` format version, both little-endian. Loaders dispatch
//! on the tag alone.

use byteorder::{ByteOrder, LittleEndian};

use crate::{Error, Result};

/// Size of the envelope in bytes.
pub const RESOURCE_HEADER_SIZE: usize = 8;

/// Kind tags for binary resources.
///
/// Tags are four ASCII characters read as a big-endian `u32`, so they show
/// up readable in a hex dump of the little-endian file as reversed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ResourceType {
    /// Vertex list (`OVTX`)
    Vertex = 0x4F56_5458,
    /// Star Fox 64 animation (`OANM`)
    Animation = 0x4F41_4E4D,
    /// Banjo-Kazooie animation (`BKAN`)
    BkAnimation = 0x424B_414E,
    /// Banjo-Kazooie demo controller input (`BKDI`)
    BkDemoInput = 0x424B_4449,
    /// Banjo-Kazooie model summary (`BKMD`)
    BkModel = 0x424B_4D44,
    /// Raw texture pixels (`OTEX`)
    Texture = 0x4F54_4558,
    /// Opaque byte blob (`OBLB`)
    Blob = 0x4F42_4C42,
}

impl ResourceType {
    pub const ALL: [ResourceType; 7] = [
        Self::Vertex,
        Self::Animation,
        Self::BkAnimation,
        Self::BkDemoInput,
        Self::BkModel,
        Self::Texture,
        Self::Blob,
    ];

    /// The numeric tag written to the envelope.
    #[inline]
    pub const fn tag(self) -> u32 {
        self as u32
    }

    /// Look up a resource type by tag.
    pub fn from_tag(tag: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag() == tag)
            .ok_or(Error::UnknownResourceType(tag))
    }
}

/// Decoded resource envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceHeader {
    pub kind: ResourceType,
    pub version: u32,
}

impl ResourceHeader {
    /// Serialize the envelope.
    pub fn to_bytes(&self) -> [u8; RESOURCE_HEADER_SIZE] {
        let mut bytes = [0u8; RESOURCE_HEADER_SIZE];
        LittleEndian::write_u32(&mut bytes[0..4], self.kind.tag());
        LittleEndian::write_u32(&mut bytes[4..8], self.version);
        bytes
    }

    /// Parse the envelope from the start of a binary resource.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < RESOURCE_HEADER_SIZE {
            return Err(Error::OutOfBounds {
                offset: 0,
                needed: RESOURCE_HEADER_SIZE,
                available: data.len(),
            });
        }
        Ok(Self {
            kind: ResourceType::from_tag(LittleEndian::read_u32(&data[0..4]))?,
            version: LittleEndian::read_u32(&data[4..8]),
        })
    }
}
