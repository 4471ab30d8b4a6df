//! `BK64:MODEL`: Banjo-Kazooie model files.
//!
//! Only the parts of the model that locate other assets are decoded. The
//! texture setup declares segment 2 over the texture data and queues one
//! `TEXTURE` per entry (plus its palette for CI formats); the vertex setup
//! declares segment 1 over the vertex array and queues it as `VTX`.

use std::io::Write;

use n64rip_common::{BinaryReader, BinaryWriter, ResourceType};
use serde_yaml::Value;
use tracing::debug;

use crate::dispatch::{ExportResult, Exporter, Factory};
use crate::{
    AssetDescriptor, AssetKind, Attributes, Error, ExportForm, ParsedAsset, Result, RunContext,
};

const MODEL_MAGIC: u32 = 0xB;
const MODEL_HEADER_SIZE: usize = 0x34;
const TEXTURE_HEADER_SIZE: u32 = 0x8;
const TEXTURE_METADATA_SIZE: u32 = 0x10;
const VTX_HEADER_SIZE: u32 = 0x18;

/// Segment that addresses the texture data block.
pub const TEXTURE_SEGMENT: u8 = 2;
/// Segment that addresses the vertex array.
pub const VERTEX_SEGMENT: u8 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSummary {
    pub geo_type: u16,
    pub tri_count: u16,
    pub vert_count: u16,
    pub texture_count: u16,
    /// Vertices in the vertex setup; may differ from `vert_count`.
    pub setup_vertex_count: u16,
}

fn model(asset: &ParsedAsset) -> Result<&ModelSummary> {
    match asset {
        ParsedAsset::Bk64Model(model) => Ok(model),
        other => Err(other.mismatch(AssetKind::Bk64Model)),
    }
}

/// `(format, palette colors)` for a texture type code.
fn texture_format(code: u16) -> Option<(&'static str, Option<u32>)> {
    match code {
        0x1 => Some(("CI4", Some(0x10))),
        0x2 => Some(("CI8", Some(0x100))),
        0x4 => Some(("RGBA16", None)),
        0x8 => Some(("RGBA32", None)),
        0x10 => Some(("IA8", None)),
        _ => None,
    }
}

/// Attributes shared by every asset discovered inside a model.
fn child_attributes(parent: &AssetDescriptor) -> Result<Attributes> {
    let mut attrs = Attributes::new();
    if parent.is_compressed()? {
        attrs.insert("compression", parent.compression()?);
    }
    Ok(attrs)
}

pub struct ModelFactory;

impl ModelFactory {
    /// `base + offset` as a ROM offset, failing the model on overflow.
    fn offset(&self, base: u32, offset: u32) -> Result<u32> {
        base.checked_add(offset)
            .ok_or_else(|| Error::parse(self.kind(), format!("offset {base:#x} + {offset:#x} overflows")))
    }

    fn parse_textures(
        &self,
        reader: &mut BinaryReader<'_>,
        setup: u32,
        descriptor: &AssetDescriptor,
        ctx: &mut RunContext,
    ) -> Result<u16> {
        reader.seek(setup as usize);
        let data_size = reader.read_u32()?;
        let count = reader.read_u16()?;
        reader.read_u16()?;

        let data_start = self.offset(
            self.offset(descriptor.offset, setup)?,
            TEXTURE_HEADER_SIZE + u32::from(count) * TEXTURE_METADATA_SIZE,
        )?;
        let data_end = self.offset(data_start, data_size)?;
        ctx.declare_segment(TEXTURE_SEGMENT, descriptor.source, data_start, data_end);

        for i in 0..count {
            let data_offset = reader.read_u32()?;
            let code = reader.read_u16()?;
            reader.read_u16()?;
            let width = reader.read_u8()?;
            let height = reader.read_u8()?;
            reader.read_u16()?;
            reader.read_u32()?;

            let (format, colors) = texture_format(code)
                .ok_or_else(|| Error::parse(self.kind(), format!("invalid texture format {code:#x}")))?;

            let mut texture_offset = self.offset(data_start, data_offset)?;
            let mut attrs = child_attributes(descriptor)?
                .with("format", format)
                .with("width", u32::from(width))
                .with("height", u32::from(height));

            if let Some(colors) = colors {
                let tlut = child_attributes(descriptor)?
                    .with("format", "TLUT")
                    .with("ctype", "u16")
                    .with("colors", colors);
                ctx.submit(
                    AssetDescriptor::new(AssetKind::Texture, texture_offset, format!("{}_TLUT_{i}", descriptor.symbol))
                        .with_source(descriptor.source)
                        .with_attributes(tlut),
                );
                attrs.insert("tlut", Value::from(texture_offset));
                texture_offset = self.offset(texture_offset, colors * 2)?;
            }

            ctx.submit(
                AssetDescriptor::new(AssetKind::Texture, texture_offset, format!("{}_TEX_{i}", descriptor.symbol))
                    .with_source(descriptor.source)
                    .with_attributes(attrs),
            );
        }
        Ok(count)
    }

    fn parse_vertices(
        &self,
        reader: &mut BinaryReader<'_>,
        setup: u32,
        descriptor: &AssetDescriptor,
        ctx: &mut RunContext,
    ) -> Result<u16> {
        reader.seek(setup as usize);
        // min, max and center coordinates
        reader.advance(9 * 2);
        let _largest_dist_to_center = reader.read_u16()?;
        let count = reader.read_u16()?;
        let _largest_dist_to_origin = reader.read_u16()?;

        let base = self.offset(self.offset(descriptor.offset, setup)?, VTX_HEADER_SIZE)?;
        let end = self.offset(base, u32::from(count) * super::VTX_SIZE)?;
        ctx.declare_segment(VERTEX_SEGMENT, descriptor.source, base, end);

        let attrs = child_attributes(descriptor)?.with("count", u32::from(count));
        ctx.submit(
            AssetDescriptor::new(AssetKind::Vertex, base, format!("{}_VTX", descriptor.symbol))
                .with_source(descriptor.source)
                .with_attributes(attrs),
        );
        Ok(count)
    }
}

impl Factory for ModelFactory {
    fn kind(&self) -> AssetKind {
        AssetKind::Bk64Model
    }

    fn parse(&self, window: &[u8], descriptor: &AssetDescriptor, ctx: &mut RunContext) -> Result<ParsedAsset> {
        if window.len() < MODEL_HEADER_SIZE {
            return Err(Error::parse(self.kind(), format!("{} bytes is too short for a model", window.len())));
        }

        let mut reader = BinaryReader::big_endian(window);
        let magic = reader.read_u32()?;
        if magic != MODEL_MAGIC {
            return Err(Error::parse(self.kind(), format!("bad magic {magic:#x}")));
        }

        let _geo_layout = reader.read_u32()?;
        let texture_setup = u32::from(reader.read_u16()?);
        let geo_type = reader.read_u16()?;
        let _display_list_setup = reader.read_u32()?;
        let vertex_setup = reader.read_u32()?;
        // hitbox, animation, collision, unk20, effects, unk28, animated textures
        reader.advance(7 * 4);
        let tri_count = reader.read_u16()?;
        let vert_count = reader.read_u16()?;

        let texture_count = if texture_setup != 0 {
            self.parse_textures(&mut reader, texture_setup, descriptor, ctx)?
        } else {
            0
        };

        let setup_vertex_count = if vertex_setup != 0 {
            self.parse_vertices(&mut reader, vertex_setup, descriptor, ctx)?
        } else {
            0
        };

        debug!(
            symbol = %descriptor.symbol,
            textures = texture_count,
            vertices = setup_vertex_count,
            "parsed model"
        );

        Ok(ParsedAsset::Bk64Model(ModelSummary {
            geo_type,
            tri_count,
            vert_count,
            texture_count,
            setup_vertex_count,
        }))
    }

    fn exporters(&self) -> Vec<(ExportForm, Box<dyn Exporter>)> {
        vec![
            (ExportForm::Header, Box::new(ModelHeaderExporter)),
            (ExportForm::Binary, Box::new(ModelBinaryExporter)),
        ]
    }
}

pub struct ModelHeaderExporter;

impl Exporter for ModelHeaderExporter {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        descriptor: &AssetDescriptor,
        _ctx: &RunContext,
    ) -> Result<ExportResult> {
        let model = model(asset)?;
        writeln!(
            sink,
            "extern BKModel {}; // tris: {}, verts: {}, textures: {}",
            descriptor.symbol, model.tri_count, model.vert_count, model.texture_count
        )?;
        Ok(ExportResult::Nothing)
    }
}

pub struct ModelBinaryExporter;

impl Exporter for ModelBinaryExporter {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        _descriptor: &AssetDescriptor,
        _ctx: &RunContext,
    ) -> Result<ExportResult> {
        let model = model(asset)?;
        let mut writer = BinaryWriter::new();
        writer.write_header(ResourceType::BkModel, 0);
        writer.write_u16(model.geo_type);
        writer.write_u16(model.tri_count);
        writer.write_u16(model.vert_count);
        writer.write_u16(model.texture_count);
        writer.write_u16(model.setup_vertex_count);
        writer.finish(sink)?;
        Ok(ExportResult::Nothing)
    }
}
