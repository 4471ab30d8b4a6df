//! Per-run state shared by every parse and export step.

use bytes::Bytes;
use n64rip_rom::{
    is_segmented, segment_number, DecoderRegistry, DecompressionCache, Decompressor,
    ResolvedAddress, SegmentTable, SourceId, SourceSet,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AssetDescriptor, Error, Result, SearchTable, SearchTableEntry, WorkQueue};

/// What the driver does when an export form has no exporter for a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsupportedPolicy {
    /// Skip that form for that asset and keep going.
    #[default]
    Skip,
    /// Stop the run.
    Abort,
}

/// Run options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Write vertex positions as `f32` in binary resources.
    pub gbi_floats: bool,
    /// Add diagnostic comments to code output.
    pub debug: bool,
    pub on_unsupported: UnsupportedPolicy,
}

/// All mutable state of one extraction run.
///
/// Parsing takes `&mut RunContext` and may declare segments, decode
/// windows and queue new assets. Exporting takes `&RunContext` only.
#[derive(Debug)]
pub struct RunContext {
    pub sources: SourceSet,
    pub segments: SegmentTable,
    pub cache: DecompressionCache,
    pub decoders: DecoderRegistry,
    pub queue: WorkQueue,
    pub search_table: SearchTable,
    pub options: Options,
}

impl RunContext {
    pub fn new(sources: SourceSet) -> Self {
        Self::with_options(sources, Options::default())
    }

    pub fn with_options(sources: SourceSet, options: Options) -> Self {
        Self {
            sources,
            segments: SegmentTable::new(),
            cache: DecompressionCache::new(),
            decoders: DecoderRegistry::new(),
            queue: WorkQueue::new(),
            search_table: SearchTable::new(),
            options,
        }
    }

    /// Map segment `segment` to `[base, window_end)` of `source`.
    pub fn declare_segment(&mut self, segment: u8, source: SourceId, base: u32, window_end: u32) {
        self.segments.declare_segment(segment, source, base, window_end);
    }

    pub fn resolve(&self, address: u32) -> Result<ResolvedAddress> {
        Ok(self.segments.resolve_address(address)?)
    }

    /// Queue a discovered asset. Returns `false` for duplicates.
    pub fn submit(&mut self, descriptor: AssetDescriptor) -> bool {
        self.queue.submit(descriptor)
    }

    pub fn register_search_table(&mut self, entry: SearchTableEntry) -> Result<()> {
        self.search_table.register(entry)
    }

    pub fn register_decoder(&mut self, name: impl Into<String>, decoder: impl Decompressor + 'static) {
        self.decoders.register(name, decoder);
    }

    /// Whether every segment the descriptor depends on is declared.
    pub fn is_ready(&self, descriptor: &AssetDescriptor) -> bool {
        segments_ready(&self.segments, descriptor)
    }

    /// Decoded bytes of `[start, end)` from `source` through `codec`.
    pub fn fetch(&mut self, source: SourceId, start: u32, end: u32, codec: &str) -> Result<Bytes> {
        let decoder = self.decoders.get(codec)?;
        let image = self.sources.get(source)?;
        Ok(self.cache.fetch(codec, decoder, image, start, end)?)
    }

    /// Follow a logical address and read `len` bytes there.
    pub fn read(&mut self, address: u32, len: u32, codec: &str) -> Result<Bytes> {
        let resolved = self.resolve(address)?;
        let end = resolved.offset.checked_add(len).ok_or_else(|| Error::InvalidAttribute {
            key: "offset".to_string(),
            reason: format!("{address:#x} + {len:#x} overflows"),
        })?;
        self.fetch(resolved.source, resolved.offset, end, codec)
    }

    /// The byte window of an asset.
    ///
    /// `size` is the decoded length the factory needs. Without one the
    /// `size` attribute is used; failing that an uncompressed window runs
    /// to the end of its source.
    pub fn window(&mut self, descriptor: &AssetDescriptor, size: Option<u32>) -> Result<Bytes> {
        let codec = descriptor.compression()?.to_string();
        let size = match size {
            Some(size) => Some(size),
            None => descriptor.attributes.get_u32("size")?,
        };
        let end = match size {
            Some(size) => descriptor
                .offset
                .checked_add(size)
                .ok_or_else(|| Error::InvalidAttribute {
                    key: "size".to_string(),
                    reason: format!("{:#x} + {size:#x} overflows", descriptor.offset),
                })?,
            None if descriptor.is_compressed()? => {
                return Err(Error::MissingAttribute("size".to_string()));
            }
            None => {
                let len = self.sources.get(descriptor.source)?.len();
                u32::try_from(len).unwrap_or(u32::MAX)
            }
        };
        debug!(
            symbol = %descriptor.symbol,
            start = format_args!("{:#x}", descriptor.offset),
            end = format_args!("{end:#x}"),
            codec = %codec,
            "fetching asset window"
        );
        self.fetch(descriptor.source, descriptor.offset, end, &codec)
    }
}

/// A descriptor is ready once the segment of its own offset (if still
/// segmented) and all of its `requires_segments` are mapped.
pub(crate) fn segments_ready(segments: &SegmentTable, descriptor: &AssetDescriptor) -> bool {
    let own = !is_segmented(descriptor.offset) || segments.is_mapped(segment_number(descriptor.offset));
    own && descriptor
        .required_segments()
        .map(|required| required.iter().all(|&s| segments.is_mapped(s)))
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use n64rip_rom::DecodeError;

    use super::*;
    use crate::{AssetKind, Attributes};

    fn context() -> RunContext {
        let mut sources = SourceSet::new();
        sources.add_bytes("rom", (0..=255u8).collect());
        RunContext::new(sources)
    }

    #[test]
    fn test_read_through_segment() {
        let mut ctx = context();
        assert!(matches!(
            ctx.read(0x0600_0004, 4, "none"),
            Err(Error::Rom(n64rip_rom::Error::UnmappedSegment { segment: 6, .. }))
        ));

        ctx.declare_segment(6, SourceId::MAIN, 0x40, 0x80);
        let bytes = ctx.read(0x0600_0004, 4, "none").unwrap();
        assert_eq!(&bytes[..], &[0x44, 0x45, 0x46, 0x47]);
    }

    #[test]
    fn test_window_sizes() {
        let mut ctx = context();
        let desc = AssetDescriptor::new(AssetKind::Blob, 0xF0, "tail");
        assert_eq!(ctx.window(&desc, None).unwrap().len(), 0x10);
        assert_eq!(ctx.window(&desc, Some(4)).unwrap().len(), 4);

        let sized = desc.clone().with_attributes(Attributes::new().with("size", 2));
        assert_eq!(ctx.window(&sized, None).unwrap().len(), 2);

        let compressed = desc.with_attributes(Attributes::new().with("compression", "none2"));
        assert!(matches!(ctx.window(&compressed, None), Err(Error::MissingAttribute(_))));
        assert!(matches!(
            ctx.window(&compressed, Some(4)),
            Err(Error::Rom(n64rip_rom::Error::Decode(DecodeError::UnknownCodec(_))))
        ));
    }

    #[test]
    fn test_ready_tracks_segments() {
        let mut ctx = context();
        let desc = AssetDescriptor::new(AssetKind::Vertex, 0x0100_0000, "v")
            .with_attributes(Attributes::new().with("requires_segments", 1));
        assert!(!ctx.is_ready(&desc));
        ctx.declare_segment(1, SourceId::MAIN, 0, 0x10);
        assert!(ctx.is_ready(&desc));

        let unresolved = AssetDescriptor::new(AssetKind::Vertex, 0x0500_0010, "v");
        assert!(!ctx.is_ready(&unresolved));
        ctx.declare_segment(5, SourceId::MAIN, 0x20, 0x40);
        assert!(ctx.is_ready(&unresolved));
    }
}
