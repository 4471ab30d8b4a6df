//! Source images that assets are read from.

use std::fmt;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tracing::debug;

use crate::{Error, Result};

/// Identifies one source image within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SourceId(pub u32);

impl SourceId {
    /// The primary ROM image; plain (non-segmented) addresses refer to it.
    pub const MAIN: SourceId = SourceId(0);
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// On-disk byte order of an N64 cartridge dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomFormat {
    /// Big-endian `.z64`, the native order.
    Z64,
    /// 16-bit byte-swapped `.v64`.
    V64,
    /// 32-bit little-endian `.n64`.
    N64,
    /// Not a cartridge header; bytes are used as-is.
    Raw,
}

impl RomFormat {
    /// Detect the dump format from the first four bytes.
    pub fn detect(data: &[u8]) -> Self {
        match data.get(..4) {
            Some([0x80, 0x37, 0x12, 0x40]) => Self::Z64,
            Some([0x37, 0x80, 0x40, 0x12]) => Self::V64,
            Some([0x40, 0x12, 0x37, 0x80]) => Self::N64,
            _ => Self::Raw,
        }
    }

    /// Rewrite `data` in place into big-endian order.
    pub fn normalize(self, data: &mut [u8]) {
        match self {
            Self::Z64 | Self::Raw => {}
            Self::V64 => data.chunks_exact_mut(2).for_each(|c| c.swap(0, 1)),
            Self::N64 => data.chunks_exact_mut(4).for_each(|c| c.reverse()),
        }
    }
}

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

/// A ROM or archive buffer.
///
/// Big-endian and raw files stay memory-mapped; swapped dumps are copied
/// and normalized once at open time.
pub struct SourceImage {
    id: SourceId,
    name: String,
    format: RomFormat,
    backing: Backing,
}

impl SourceImage {
    /// Open a source image from disk.
    pub fn open<P: AsRef<Path>>(id: SourceId, path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: the file is opened read-only and not modified during the run.
        let mmap = unsafe { Mmap::map(&file)? };
        let format = RomFormat::detect(&mmap);

        let backing = match format {
            RomFormat::Z64 | RomFormat::Raw => Backing::Mapped(mmap),
            RomFormat::V64 | RomFormat::N64 => {
                let mut data = mmap.to_vec();
                format.normalize(&mut data);
                Backing::Owned(data)
            }
        };

        debug!(path = %path.display(), ?format, "opened source image");

        Ok(Self {
            id,
            name: path.display().to_string(),
            format,
            backing,
        })
    }

    /// Wrap an in-memory buffer, normalizing cartridge byte order.
    pub fn from_bytes(id: SourceId, name: impl Into<String>, mut data: Vec<u8>) -> Self {
        let format = RomFormat::detect(&data);
        format.normalize(&mut data);
        Self {
            id,
            name: name.into(),
            format,
            backing: Backing::Owned(data),
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Format detected when the image was loaded.
    pub fn format(&self) -> RomFormat {
        self.format
    }

    /// The full image in big-endian order.
    pub fn bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Mapped(mmap) => &mmap[..],
            Backing::Owned(data) => data.as_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}

impl fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceImage")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("format", &self.format)
            .field("len", &self.len())
            .finish()
    }
}

/// All source images of a run, indexed by [`SourceId`].
#[derive(Debug, Default)]
pub struct SourceSet {
    images: Vec<SourceImage>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a file as the next source.
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P) -> Result<SourceId> {
        let id = SourceId(self.images.len() as u32);
        self.images.push(SourceImage::open(id, path)?);
        Ok(id)
    }

    /// Add an in-memory buffer as the next source.
    pub fn add_bytes(&mut self, name: impl Into<String>, data: Vec<u8>) -> SourceId {
        let id = SourceId(self.images.len() as u32);
        self.images.push(SourceImage::from_bytes(id, name, data));
        id
    }

    pub fn get(&self, id: SourceId) -> Result<&SourceImage> {
        self.images
            .get(id.0 as usize)
            .ok_or(Error::UnknownSource(id.0))
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_detect_formats() {
        assert_eq!(RomFormat::detect(&[0x80, 0x37, 0x12, 0x40]), RomFormat::Z64);
        assert_eq!(RomFormat::detect(&[0x37, 0x80, 0x40, 0x12]), RomFormat::V64);
        assert_eq!(RomFormat::detect(&[0x40, 0x12, 0x37, 0x80]), RomFormat::N64);
        assert_eq!(RomFormat::detect(&[0x00, 0x01]), RomFormat::Raw);
    }

    #[test]
    fn test_swapped_dumps_are_normalized() {
        let v64 = SourceImage::from_bytes(SourceId::MAIN, "v64", vec![0x37, 0x80, 0x40, 0x12, 0xBB, 0xAA]);
        assert_eq!(v64.bytes(), &[0x80, 0x37, 0x12, 0x40, 0xAA, 0xBB]);

        let n64 = SourceImage::from_bytes(SourceId::MAIN, "n64", vec![0x40, 0x12, 0x37, 0x80]);
        assert_eq!(n64.bytes(), &[0x80, 0x37, 0x12, 0x40]);
    }

    #[test]
    fn test_open_maps_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x80, 0x37, 0x12, 0x40, 1, 2, 3, 4]).unwrap();

        let mut sources = SourceSet::new();
        let id = sources.add_file(file.path()).unwrap();
        let image = sources.get(id).unwrap();

        assert_eq!(image.format(), RomFormat::Z64);
        assert_eq!(image.len(), 8);
        assert!(matches!(
            sources.get(SourceId(7)),
            Err(Error::UnknownSource(7))
        ));
    }
}
