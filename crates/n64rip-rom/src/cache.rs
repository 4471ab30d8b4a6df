//! Decompression window cache.
//!
//! Parsers ask for `[start, end)` windows of a source through a named
//! codec. The cache hands out a view into an earlier decode by the same
//! codec when one already covers the window and otherwise asks the
//! registered [`Decompressor`] to decode it. Entries
//! live for the whole run, so bytes for an offset never change once seen.

use bytes::Bytes;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::{DecodeError, SourceId, SourceImage};

/// Name of the identity codec that is always registered.
pub const CODEC_NONE: &str = "none";

/// Turns a compressed source window into decoded bytes.
///
/// Implementations must be deterministic: decoding the same window twice
/// yields the same bytes.
pub trait Decompressor: Send + Sync {
    fn decode(&self, source: &SourceImage, start: u32, end: u32) -> Result<Vec<u8>, DecodeError>;
}

impl<F> Decompressor for F
where
    F: Fn(&SourceImage, u32, u32) -> Result<Vec<u8>, DecodeError> + Send + Sync,
{
    fn decode(&self, source: &SourceImage, start: u32, end: u32) -> Result<Vec<u8>, DecodeError> {
        self(source, start, end)
    }
}

/// Identity codec for uncompressed regions: copies the window verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uncompressed;

impl Decompressor for Uncompressed {
    fn decode(&self, source: &SourceImage, start: u32, end: u32) -> Result<Vec<u8>, DecodeError> {
        source
            .bytes()
            .get(start as usize..end as usize)
            .map(<[u8]>::to_vec)
            .ok_or(DecodeError::OutOfRange {
                start,
                end,
                len: source.len(),
            })
    }
}

/// Codec lookup by the name used in the `compression` attribute.
pub struct DecoderRegistry {
    decoders: FxHashMap<String, Box<dyn Decompressor>>,
}

impl DecoderRegistry {
    /// A registry holding only the identity codec.
    pub fn new() -> Self {
        let mut registry = Self {
            decoders: FxHashMap::default(),
        };
        registry.register(CODEC_NONE, Uncompressed);
        registry
    }

    /// Register (or replace) a codec.
    pub fn register(&mut self, name: impl Into<String>, decoder: impl Decompressor + 'static) {
        self.decoders.insert(name.into(), Box::new(decoder));
    }

    pub fn get(&self, name: &str) -> Result<&dyn Decompressor, DecodeError> {
        self.decoders
            .get(name)
            .map(|decoder| decoder.as_ref())
            .ok_or_else(|| DecodeError::UnknownCodec(name.to_string()))
    }

    /// Registered codec names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("codecs", &self.names())
            .finish()
    }
}

#[derive(Debug)]
struct CacheEntry {
    source: SourceId,
    codec: String,
    start: u32,
    data: Bytes,
}

impl CacheEntry {
    fn covers(&self, source: SourceId, codec: &str, start: u32, end: u32) -> bool {
        let covered_end = u64::from(self.start) + self.data.len() as u64;
        self.source == source
            && self.codec == codec
            && start >= self.start
            && u64::from(end) <= covered_end
    }

    fn view(&self, start: u32, end: u32) -> Bytes {
        let from = (start - self.start) as usize;
        let to = (end - self.start) as usize;
        self.data.slice(from..to)
    }
}

/// Decoded windows keyed by `(source, codec, start, end)`.
///
/// A window decoded by one codec never serves a request made through
/// another. Requests only partially covered by an earlier entry are decoded again
/// in full; entries are never merged or evicted.
#[derive(Debug, Default)]
pub struct DecompressionCache {
    entries: Vec<CacheEntry>,
    index: FxHashMap<(SourceId, String, u32, u32), usize>,
    decodes: usize,
    hits: usize,
}

impl DecompressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the bytes of `[start, end)` from `source` as decoded by the
    /// codec registered under `codec`.
    ///
    /// The returned [`Bytes`] shares the cached buffer.
    pub fn fetch(
        &mut self,
        codec: &str,
        decoder: &dyn Decompressor,
        source: &SourceImage,
        start: u32,
        end: u32,
    ) -> Result<Bytes, DecodeError> {
        if end < start {
            return Err(DecodeError::OutOfRange {
                start,
                end,
                len: source.len(),
            });
        }

        let id = source.id();
        if let Some(entry) = self.lookup(id, codec, start, end) {
            let view = entry.view(start, end);
            self.hits += 1;
            trace!(source = %id, codec, start, end, "decompression cache hit");
            return Ok(view);
        }

        let decoded = decoder.decode(source, start, end)?;
        let expected = (end - start) as usize;
        if decoded.len() < expected {
            return Err(DecodeError::ShortOutput {
                expected,
                actual: decoded.len(),
            });
        }

        self.decodes += 1;
        debug!(source = %id, codec, start, end, decoded = decoded.len(), "decoded window");

        let entry = CacheEntry {
            source: id,
            codec: codec.to_string(),
            start,
            data: Bytes::from(decoded),
        };
        let view = entry.view(start, end);
        self.index
            .insert((id, codec.to_string(), start, end), self.entries.len());
        self.entries.push(entry);
        Ok(view)
    }

    fn lookup(&self, source: SourceId, codec: &str, start: u32, end: u32) -> Option<&CacheEntry> {
        if let Some(&index) = self.index.get(&(source, codec.to_string(), start, end)) {
            return self.entries.get(index);
        }
        self.entries
            .iter()
            .find(|entry| entry.covers(source, codec, start, end))
    }

    /// Number of collaborator calls that produced an entry.
    pub fn decode_count(&self) -> usize {
        self.decodes
    }

    /// Number of requests served from an existing entry.
    pub fn hit_count(&self) -> usize {
        self.hits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Counting {
        calls: AtomicUsize,
    }

    impl Counting {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Decompressor for Counting {
        fn decode(&self, source: &SourceImage, start: u32, end: u32) -> Result<Vec<u8>, DecodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Uncompressed.decode(source, start, end)
        }
    }

    fn image() -> SourceImage {
        SourceImage::from_bytes(SourceId::MAIN, "test", (0..=255u8).collect())
    }

    #[test]
    fn test_equal_ranges_return_identical_bytes() {
        let source = image();
        let decoder = Counting::new();
        let mut cache = DecompressionCache::new();

        let first = cache.fetch("count", &decoder, &source, 0x10, 0x20).unwrap();
        let second = cache.fetch("count", &decoder, &source, 0x10, 0x20).unwrap();

        assert_eq!(first, second);
        assert_eq!(&first[..], &source.bytes()[0x10..0x20]);
        assert_eq!(decoder.calls(), 1);
    }

    #[test]
    fn test_contained_request_does_not_decode() {
        let source = image();
        let decoder = Counting::new();
        let mut cache = DecompressionCache::new();

        cache.fetch("count", &decoder, &source, 0x00, 0x80).unwrap();
        let inner = cache.fetch("count", &decoder, &source, 0x20, 0x30).unwrap();

        assert_eq!(&inner[..], &source.bytes()[0x20..0x30]);
        assert_eq!(decoder.calls(), 1);
        assert_eq!(cache.hit_count(), 1);
    }

    #[test]
    fn test_partial_overlap_decodes_full_range() {
        let source = image();
        let decoder = Counting::new();
        let mut cache = DecompressionCache::new();

        cache.fetch("count", &decoder, &source, 0x00, 0x40).unwrap();
        let overlapping = cache.fetch("count", &decoder, &source, 0x30, 0x50).unwrap();

        assert_eq!(&overlapping[..], &source.bytes()[0x30..0x50]);
        assert_eq!(decoder.calls(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_decode_errors_propagate() {
        let source = image();
        let mut cache = DecompressionCache::new();
        let failing = |_: &SourceImage, _: u32, _: u32| -> Result<Vec<u8>, DecodeError> {
            Err(DecodeError::Malformed("bad header".into()))
        };

        assert!(matches!(
            cache.fetch("failing", &failing, &source, 0, 4),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            cache.fetch(CODEC_NONE, &Uncompressed, &source, 0x100, 0x110),
            Err(DecodeError::OutOfRange { .. })
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_short_output_is_rejected() {
        let source = image();
        let mut cache = DecompressionCache::new();
        let short = |_: &SourceImage, _: u32, _: u32| -> Result<Vec<u8>, DecodeError> { Ok(vec![0; 2]) };

        assert!(matches!(
            cache.fetch("short", &short, &source, 0, 4),
            Err(DecodeError::ShortOutput {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_entries_are_not_shared_across_codecs() {
        let source = image();
        let decoder = Counting::new();
        let inverted = |source: &SourceImage, start: u32, end: u32| -> Result<Vec<u8>, DecodeError> {
            Ok(source.bytes()[start as usize..end as usize].iter().map(|b| !b).collect())
        };
        let mut cache = DecompressionCache::new();

        let raw = cache.fetch(CODEC_NONE, &Uncompressed, &source, 0x00, 0x100).unwrap();
        let decoded = cache.fetch("invert", &inverted, &source, 0x10, 0x14).unwrap();
        assert_eq!(&raw[0x10..0x14], &[0x10, 0x11, 0x12, 0x13]);
        assert_eq!(&decoded[..], &[0xEF, 0xEE, 0xED, 0xEC]);
        assert_eq!(cache.hit_count(), 0);

        // Same range through a third codec decodes again as well.
        cache.fetch("count", &decoder, &source, 0x10, 0x14).unwrap();
        assert_eq!(decoder.calls(), 1);
        assert_eq!(cache.len(), 3);

        let again = cache.fetch("invert", &inverted, &source, 0x11, 0x13).unwrap();
        assert_eq!(&again[..], &[0xEE, 0xED]);
        assert_eq!(cache.hit_count(), 1);
    }

    #[test]
    fn test_registry_lookup() {
        let registry = DecoderRegistry::new();
        assert!(registry.get(CODEC_NONE).is_ok());
        assert!(matches!(
            registry.get("yay0"),
            Err(DecodeError::UnknownCodec(name)) if name == "yay0"
        ));
    }
}
