//! `TEXTURE` and `BLOB`: raw byte assets.
//!
//! Neither kind interprets its bytes. Textures only need their size,
//! which follows from pixel format and dimensions; blobs carry an
//! explicit `size`.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use n64rip_common::{BinaryWriter, ResourceType};

use super::TAB;
use crate::dispatch::{ExportResult, Exporter, Factory};
use crate::{AssetDescriptor, AssetKind, Error, ExportForm, ParsedAsset, Result, RunContext};

/// N64 texel formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba16,
    Rgba32,
    Ci4,
    Ci8,
    I4,
    I8,
    Ia4,
    Ia8,
    Ia16,
    /// Palette of `colors` RGBA16 entries.
    Tlut,
}

impl TextureFormat {
    const ALL: [TextureFormat; 10] = [
        Self::Rgba16,
        Self::Rgba32,
        Self::Ci4,
        Self::Ci8,
        Self::I4,
        Self::I8,
        Self::Ia4,
        Self::Ia8,
        Self::Ia16,
        Self::Tlut,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rgba16 => "RGBA16",
            Self::Rgba32 => "RGBA32",
            Self::Ci4 => "CI4",
            Self::Ci8 => "CI8",
            Self::I4 => "I4",
            Self::I8 => "I8",
            Self::Ia4 => "IA4",
            Self::Ia8 => "IA8",
            Self::Ia16 => "IA16",
            Self::Tlut => "TLUT",
        }
    }

    pub const fn bits_per_texel(self) -> u32 {
        match self {
            Self::Ci4 | Self::I4 | Self::Ia4 => 4,
            Self::Ci8 | Self::I8 | Self::Ia8 => 8,
            Self::Rgba16 | Self::Ia16 | Self::Tlut => 16,
            Self::Rgba32 => 32,
        }
    }

    /// Element type used when no `ctype` is given.
    pub const fn default_ctype(self) -> CType {
        match self {
            Self::Rgba16 | Self::Ia16 | Self::Tlut => CType::U16,
            Self::Rgba32 => CType::U32,
            _ => CType::U8,
        }
    }

    /// Resource tag value written in binary exports.
    const fn code(self) -> u32 {
        self as u32
    }
}

impl FromStr for TextureFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidAttribute {
                key: "format".to_string(),
                reason: format!("unknown texture format `{s}`"),
            })
    }
}

impl fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// C element type of a raw array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CType {
    U8,
    U16,
    U32,
    U64,
}

impl CType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
        }
    }

    pub const fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }
}

impl FromStr for CType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "u8" => Ok(Self::U8),
            "u16" => Ok(Self::U16),
            "u32" => Ok(Self::U32),
            "u64" => Ok(Self::U64),
            _ => Err(Error::InvalidAttribute {
                key: "ctype".to_string(),
                reason: format!("unknown element type `{s}`"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub ctype: CType,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
}

struct TextureParams {
    format: TextureFormat,
    width: u32,
    height: u32,
    ctype: CType,
    size: u32,
}

fn texture_params(descriptor: &AssetDescriptor) -> Result<TextureParams> {
    let attrs = &descriptor.attributes;
    let format: TextureFormat = attrs.require_str("format")?.parse()?;
    let ctype = match attrs.get_str("ctype")? {
        Some(ctype) => ctype.parse()?,
        None => format.default_ctype(),
    };
    let (width, height, size) = if format == TextureFormat::Tlut {
        let colors = attrs.require_u32("colors")?;
        let size = colors.checked_mul(2).ok_or_else(|| Error::InvalidAttribute {
            key: "colors".to_string(),
            reason: format!("{colors} colors is too large"),
        })?;
        (colors, 1, size)
    } else {
        let width = attrs.require_u32("width")?;
        let height = attrs.require_u32("height")?;
        let bits = u64::from(width) * u64::from(height) * u64::from(format.bits_per_texel());
        let size = u32::try_from(bits.div_ceil(8)).map_err(|_| Error::InvalidAttribute {
            key: "width".to_string(),
            reason: format!("{width}x{height} texture is too large"),
        })?;
        (width, height, size)
    };
    Ok(TextureParams {
        format,
        width,
        height,
        ctype,
        size,
    })
}

/// Write `data` as comma-separated hex words of `ctype`, 16 bytes per line.
fn write_words(sink: &mut dyn Write, data: &[u8], ctype: CType) -> Result<()> {
    let size = ctype.size();
    let per_line = 16 / size;
    for (i, word) in data.chunks(size).enumerate() {
        if i % per_line == 0 {
            if i > 0 {
                writeln!(sink)?;
            }
            write!(sink, "{TAB}")?;
        } else {
            write!(sink, " ")?;
        }
        let value = word.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
        write!(sink, "0x{value:0width$X},", width = size * 2)?;
    }
    if !data.is_empty() {
        writeln!(sink)?;
    }
    Ok(())
}

fn texture(asset: &ParsedAsset) -> Result<&Texture> {
    match asset {
        ParsedAsset::Texture(texture) => Ok(texture),
        other => Err(other.mismatch(AssetKind::Texture)),
    }
}

fn blob(asset: &ParsedAsset) -> Result<&Blob> {
    match asset {
        ParsedAsset::Blob(blob) => Ok(blob),
        other => Err(other.mismatch(AssetKind::Blob)),
    }
}

pub struct TextureFactory;

impl Factory for TextureFactory {
    fn kind(&self) -> AssetKind {
        AssetKind::Texture
    }

    fn window_size(&self, descriptor: &AssetDescriptor) -> Result<Option<u32>> {
        texture_params(descriptor).map(|params| Some(params.size))
    }

    fn parse(&self, window: &[u8], descriptor: &AssetDescriptor, _ctx: &mut RunContext) -> Result<ParsedAsset> {
        let params = texture_params(descriptor)?;
        let data = window
            .get(..params.size as usize)
            .ok_or(n64rip_common::Error::OutOfBounds {
                offset: 0,
                needed: params.size as usize,
                available: window.len(),
            })?
            .to_vec();
        if data.len() % params.ctype.size() != 0 {
            return Err(Error::parse(
                self.kind(),
                format!("{} bytes do not divide into {} words", data.len(), params.ctype.as_str()),
            ));
        }
        Ok(ParsedAsset::Texture(Texture {
            format: params.format,
            width: params.width,
            height: params.height,
            ctype: params.ctype,
            data,
        }))
    }

    fn exporters(&self) -> Vec<(ExportForm, Box<dyn Exporter>)> {
        vec![
            (ExportForm::Header, Box::new(RawHeaderExporter)),
            (ExportForm::Code, Box::new(TextureCodeExporter)),
            (ExportForm::Binary, Box::new(TextureBinaryExporter)),
        ]
    }
}

pub struct BlobFactory;

impl Factory for BlobFactory {
    fn kind(&self) -> AssetKind {
        AssetKind::Blob
    }

    fn window_size(&self, descriptor: &AssetDescriptor) -> Result<Option<u32>> {
        descriptor.attributes.require_u32("size").map(Some)
    }

    fn parse(&self, window: &[u8], _descriptor: &AssetDescriptor, _ctx: &mut RunContext) -> Result<ParsedAsset> {
        Ok(ParsedAsset::Blob(Blob {
            data: window.to_vec(),
        }))
    }

    fn exporters(&self) -> Vec<(ExportForm, Box<dyn Exporter>)> {
        vec![
            (ExportForm::Header, Box::new(RawHeaderExporter)),
            (ExportForm::Code, Box::new(BlobCodeExporter)),
            (ExportForm::Binary, Box::new(BlobBinaryExporter)),
        ]
    }
}

/// `extern <ctype> sym[];` for any raw array.
pub struct RawHeaderExporter;

impl Exporter for RawHeaderExporter {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        descriptor: &AssetDescriptor,
        _ctx: &RunContext,
    ) -> Result<ExportResult> {
        writeln!(sink, "extern {} {}[];", asset.c_type(), descriptor.symbol)?;
        Ok(ExportResult::Nothing)
    }
}

pub struct TextureCodeExporter;

impl Exporter for TextureCodeExporter {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        descriptor: &AssetDescriptor,
        ctx: &RunContext,
    ) -> Result<ExportResult> {
        let texture = texture(asset)?;
        writeln!(sink, "{} {}[] = {{", texture.ctype.as_str(), descriptor.symbol)?;
        write_words(sink, &texture.data, texture.ctype)?;
        writeln!(sink, "}};")?;
        if ctx.options.debug {
            writeln!(
                sink,
                "// {} {}x{}, {} bytes",
                texture.format,
                texture.width,
                texture.height,
                texture.data.len()
            )?;
        }
        writeln!(sink)?;
        Ok(ExportResult::after(descriptor.offset, texture.data.len() as u64))
    }
}

pub struct TextureBinaryExporter;

impl Exporter for TextureBinaryExporter {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        _descriptor: &AssetDescriptor,
        _ctx: &RunContext,
    ) -> Result<ExportResult> {
        let texture = texture(asset)?;
        let mut writer = BinaryWriter::new();
        writer.write_header(ResourceType::Texture, 0);
        writer.write_u32(texture.format.code());
        writer.write_u32(texture.width);
        writer.write_u32(texture.height);
        writer.write_u32(texture.data.len() as u32);
        writer.write_bytes(&texture.data);
        writer.finish(sink)?;
        Ok(ExportResult::Nothing)
    }
}

pub struct BlobCodeExporter;

impl Exporter for BlobCodeExporter {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        descriptor: &AssetDescriptor,
        _ctx: &RunContext,
    ) -> Result<ExportResult> {
        let blob = blob(asset)?;
        writeln!(sink, "u8 {}[] = {{", descriptor.symbol)?;
        write_words(sink, &blob.data, CType::U8)?;
        writeln!(sink, "}};\n")?;
        Ok(ExportResult::after(descriptor.offset, blob.data.len() as u64))
    }
}

pub struct BlobBinaryExporter;

impl Exporter for BlobBinaryExporter {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        _descriptor: &AssetDescriptor,
        _ctx: &RunContext,
    ) -> Result<ExportResult> {
        let blob = blob(asset)?;
        let mut writer = BinaryWriter::new();
        writer.write_header(ResourceType::Blob, 0);
        writer.write_u32(blob.data.len() as u32);
        writer.write_bytes(&blob.data);
        writer.finish(sink)?;
        Ok(ExportResult::Nothing)
    }
}

#[cfg(test)]
mod tests {
    use n64rip_rom::SourceSet;

    use super::*;
    use crate::Attributes;

    fn texture_desc(attrs: Attributes) -> AssetDescriptor {
        AssetDescriptor::new(AssetKind::Texture, 0, "gTex").with_attributes(attrs)
    }

    #[test]
    fn test_texture_sizes() {
        let size = |attrs| TextureFactory.window_size(&texture_desc(attrs)).unwrap();
        let dims = |format: &str| Attributes::new().with("format", format).with("width", 4).with("height", 2);

        assert_eq!(size(dims("RGBA16")), Some(16));
        assert_eq!(size(dims("rgba32")), Some(32));
        assert_eq!(size(dims("CI4")), Some(4));
        assert_eq!(size(dims("IA8")), Some(8));
        assert_eq!(size(Attributes::new().with("format", "TLUT").with("colors", 16)), Some(32));
    }

    #[test]
    fn test_texture_attribute_errors() {
        assert!(matches!(
            TextureFactory.window_size(&texture_desc(Attributes::new().with("format", "RGBA16"))),
            Err(Error::MissingAttribute(key)) if key == "width"
        ));
        assert!(matches!(
            TextureFactory.window_size(&texture_desc(Attributes::new().with("format", "XYZ"))),
            Err(Error::InvalidAttribute { .. })
        ));
        assert!(matches!(
            TextureFactory.window_size(&texture_desc(
                Attributes::new().with("format", "TLUT").with("colors", 0x8000_0000u32)
            )),
            Err(Error::InvalidAttribute { key, .. }) if key == "colors"
        ));
    }

    #[test]
    fn test_texture_code_words() {
        let mut ctx = RunContext::new(SourceSet::new());
        let desc = texture_desc(
            Attributes::new()
                .with("format", "RGBA16")
                .with("width", 2)
                .with("height", 1),
        );
        let asset = TextureFactory.parse(&[0x12, 0x34, 0xAB, 0xCD], &desc, &mut ctx).unwrap();

        let mut out = Vec::new();
        let result = TextureCodeExporter.export(&mut out, &asset, &desc, &ctx).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "u16 gTex[] = {\n    0x1234, 0xABCD,\n};\n\n"
        );
        assert_eq!(result, ExportResult::Successor(4));
    }

    #[test]
    fn test_blob_requires_size() {
        let desc = AssetDescriptor::new(AssetKind::Blob, 0, "gBlob");
        assert!(matches!(
            BlobFactory.window_size(&desc),
            Err(Error::MissingAttribute(key)) if key == "size"
        ));
    }

    #[test]
    fn test_blob_at_end_of_address_space_has_no_successor() {
        let ctx = RunContext::new(SourceSet::new());
        let desc = AssetDescriptor::new(AssetKind::Blob, 0xFFFF_FFFE, "gTail");
        let asset = ParsedAsset::Blob(Blob { data: vec![0; 4] });

        let result = BlobCodeExporter.export(&mut Vec::new(), &asset, &desc, &ctx).unwrap();
        assert_eq!(result, ExportResult::Nothing);
    }

    #[test]
    fn test_blob_lines() {
        let ctx = RunContext::new(SourceSet::new());
        let desc = AssetDescriptor::new(AssetKind::Blob, 0x20, "gBlob");
        let asset = ParsedAsset::Blob(Blob {
            data: (0..18).collect(),
        });

        let mut out = Vec::new();
        BlobCodeExporter.export(&mut out, &asset, &desc, &ctx).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "u8 gBlob[] = {");
        assert!(lines[1].starts_with("    0x00, 0x01,"));
        assert_eq!(lines[2], "    0x10, 0x11,");
        assert_eq!(lines[3], "};");
    }
}
