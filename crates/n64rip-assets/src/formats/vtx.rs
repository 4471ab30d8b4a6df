//! `VTX`: F3D vertex lists.

use std::io::Write;

use n64rip_common::{BinaryReader, BinaryWriter, ResourceType};
use serde::{Deserialize, Serialize};
use zerocopy::byteorder::big_endian::{I16, U16};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::{merged_placement, TAB};
use crate::dispatch::{ExportResult, Exporter, Factory};
use crate::modding::{read_document, write_document};
use crate::{AssetDescriptor, AssetKind, Error, ExportForm, ParsedAsset, Result, RunContext};

/// Size of one vertex record in ROM.
pub const VTX_SIZE: u32 = 16;

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct VtxRaw {
    ob: [I16; 3],
    flag: U16,
    tc: [I16; 2],
    cn: [u8; 4],
}

/// One decoded vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Vertex {
    pub position: [i16; 3],
    pub flag: u16,
    pub tex_coord: [i16; 2],
    pub color: [u8; 4],
}

impl From<VtxRaw> for Vertex {
    fn from(raw: VtxRaw) -> Self {
        Self {
            position: raw.ob.map(|v| v.get()),
            flag: raw.flag.get(),
            tex_coord: raw.tc.map(|v| v.get()),
            color: raw.cn,
        }
    }
}

impl Vertex {
    /// C initializer: `{{{ x, y, z}, flag, {tc1, tc2}, {c1, c2, c3, c4}}}`.
    fn literal(&self) -> String {
        let [x, y, z] = self.position;
        let [t1, t2] = self.tex_coord;
        let [c1, c2, c3, c4] = self.color;
        format!(
            "{{{{{{{x:>6}, {y:>6}, {z:>6}}}, {flag}, {{{t1:>6}, {t2:>6}}}, {{{c1:>3}, {c2:>3}, {c3:>3}, {c4:>3}}}}}}}",
            flag = self.flag
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VertexList {
    pub vertices: Vec<Vertex>,
}

impl VertexList {
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

fn vertices(asset: &ParsedAsset) -> Result<&VertexList> {
    match asset {
        ParsedAsset::Vertex(list) => Ok(list),
        other => Err(other.mismatch(AssetKind::Vertex)),
    }
}

pub struct VtxFactory;

impl Factory for VtxFactory {
    fn kind(&self) -> AssetKind {
        AssetKind::Vertex
    }

    fn window_size(&self, descriptor: &AssetDescriptor) -> Result<Option<u32>> {
        let count = descriptor
            .count()?
            .ok_or_else(|| Error::MissingAttribute("count".to_string()))?;
        let size = count.checked_mul(VTX_SIZE).ok_or_else(|| Error::InvalidAttribute {
            key: "count".to_string(),
            reason: format!("{count} vertices is too large"),
        })?;
        Ok(Some(size))
    }

    fn parse(&self, window: &[u8], descriptor: &AssetDescriptor, _ctx: &mut RunContext) -> Result<ParsedAsset> {
        let count = descriptor.count()?.unwrap_or(0);
        let mut reader = BinaryReader::big_endian(window);
        let vertices = (0..count)
            .map(|_| reader.read_struct::<VtxRaw>().map(Vertex::from))
            .collect::<n64rip_common::Result<Vec<_>>>()?;
        Ok(ParsedAsset::Vertex(VertexList { vertices }))
    }

    fn parse_modding(&self, document: &[u8]) -> Result<(String, ParsedAsset)> {
        let (symbol, list) = read_document::<VertexList>(document)?;
        Ok((symbol, ParsedAsset::Vertex(list)))
    }

    fn exporters(&self) -> Vec<(ExportForm, Box<dyn Exporter>)> {
        vec![
            (ExportForm::Header, Box::new(VtxHeaderExporter)),
            (ExportForm::Code, Box::new(VtxCodeExporter)),
            (ExportForm::Binary, Box::new(VtxBinaryExporter)),
            (ExportForm::Modding, Box::new(VtxModdingExporter)),
        ]
    }
}

pub struct VtxHeaderExporter;

impl Exporter for VtxHeaderExporter {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        descriptor: &AssetDescriptor,
        ctx: &RunContext,
    ) -> Result<ExportResult> {
        let list = vertices(asset)?;
        match merged_placement(ctx, descriptor) {
            Some(placement) if placement.state.opens() => {
                let width = placement.entry.index_size.unwrap_or(list.len() as u32);
                writeln!(sink, "extern Vtx {}[][{width}];", placement.entry.name)?;
            }
            Some(_) => {}
            None => writeln!(sink, "extern Vtx {}[];", descriptor.symbol)?,
        }
        Ok(ExportResult::Nothing)
    }
}

pub struct VtxCodeExporter;

impl Exporter for VtxCodeExporter {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        descriptor: &AssetDescriptor,
        ctx: &RunContext,
    ) -> Result<ExportResult> {
        let list = vertices(asset)?;

        if let Some(placement) = merged_placement(ctx, descriptor) {
            if placement.state.opens() {
                let width = placement.entry.index_size.unwrap_or(list.len() as u32);
                writeln!(sink, "Vtx {}[][{width}] = {{", placement.entry.name)?;
            }
            write!(sink, "{TAB}{{")?;
            for vertex in &list.vertices {
                write!(sink, "\n{TAB}{TAB}{},", vertex.literal())?;
            }
            writeln!(sink, "\n{TAB}}},")?;
            if placement.state.closes() {
                writeln!(sink, "}};\n")?;
            }
        } else {
            writeln!(sink, "Vtx {}[] = {{", descriptor.symbol)?;
            for vertex in &list.vertices {
                writeln!(sink, "{TAB}{},", vertex.literal())?;
            }
            writeln!(sink, "}};")?;
            if ctx.options.debug {
                writeln!(sink, "// count: {} Vtxs", list.len())?;
            } else {
                writeln!(sink)?;
            }
        }

        Ok(ExportResult::after(
            descriptor.offset,
            list.len() as u64 * u64::from(VTX_SIZE),
        ))
    }
}

pub struct VtxBinaryExporter;

impl Exporter for VtxBinaryExporter {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        _descriptor: &AssetDescriptor,
        ctx: &RunContext,
    ) -> Result<ExportResult> {
        let list = vertices(asset)?;
        let mut writer = BinaryWriter::new();
        writer.write_header(ResourceType::Vertex, 0);
        writer.write_u32(list.len() as u32);
        for vertex in &list.vertices {
            for coord in vertex.position {
                if ctx.options.gbi_floats {
                    writer.write_f32(f32::from(coord));
                } else {
                    writer.write_i16(coord);
                }
            }
            writer.write_u16(vertex.flag);
            writer.write_i16(vertex.tex_coord[0]);
            writer.write_i16(vertex.tex_coord[1]);
            writer.write_bytes(&vertex.color);
        }
        writer.finish(sink)?;
        Ok(ExportResult::Nothing)
    }
}

pub struct VtxModdingExporter;

impl Exporter for VtxModdingExporter {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        descriptor: &AssetDescriptor,
        _ctx: &RunContext,
    ) -> Result<ExportResult> {
        write_document(sink, &descriptor.symbol, vertices(asset)?)?;
        Ok(ExportResult::Nothing)
    }
}
