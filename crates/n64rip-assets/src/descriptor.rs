//! Asset descriptors: the queued unit of work.

use std::hash::{Hash, Hasher};

use n64rip_rom::{SourceId, CODEC_NONE};

use crate::{AssetKind, Attributes, Result};

/// Identifies one asset to parse and export.
///
/// Two descriptors are the same asset when kind and offset match; symbol,
/// source and attributes do not take part in equality.
#[derive(Debug, Clone)]
pub struct AssetDescriptor {
    pub kind: AssetKind,
    pub source: SourceId,
    /// Absolute offset after segment resolution.
    pub offset: u32,
    pub symbol: String,
    pub attributes: Attributes,
}

impl AssetDescriptor {
    pub fn new(kind: AssetKind, offset: u32, symbol: impl Into<String>) -> Self {
        Self {
            kind,
            source: SourceId::MAIN,
            offset,
            symbol: symbol.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_source(mut self, source: SourceId) -> Self {
        self.source = source;
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Dedup identity.
    pub fn key(&self) -> (AssetKind, u32) {
        (self.kind, self.offset)
    }

    /// Element count, when the kind uses one.
    pub fn count(&self) -> Result<Option<u32>> {
        self.attributes.get_u32("count")
    }

    /// Codec name for the asset's window; `none` when uncompressed.
    pub fn compression(&self) -> Result<&str> {
        Ok(self.attributes.get_str("compression")?.unwrap_or(CODEC_NONE))
    }

    pub fn is_compressed(&self) -> Result<bool> {
        Ok(self.compression()? != CODEC_NONE)
    }

    /// Segments that must be declared before this asset can be parsed.
    pub fn required_segments(&self) -> Result<Vec<u8>> {
        self.attributes
            .get_u32_list("requires_segments")?
            .into_iter()
            .map(|segment| {
                u8::try_from(segment).map_err(|_| crate::Error::InvalidAttribute {
                    key: "requires_segments".to_string(),
                    reason: format!("{segment} is not a segment id"),
                })
            })
            .collect()
    }
}

impl PartialEq for AssetDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for AssetDescriptor {}

impl Hash for AssetDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}
