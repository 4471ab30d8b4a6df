//! `BK64:ANIM`: Banjo-Kazooie animation files.

use std::io::Write;

use n64rip_common::bitfield::{BitField, BitfieldSchema};
use n64rip_common::{BinaryReader, BinaryWriter, ResourceType};
use serde::{Deserialize, Serialize};

use super::TAB;
use crate::dispatch::{ExportResult, Exporter, Factory};
use crate::modding::{read_document, write_document};
use crate::{AssetDescriptor, AssetKind, Error, ExportForm, ParsedAsset, Result, RunContext};

const HEADER_SIZE: u32 = 8;

/// Element word: which bone and which transform channel.
static ELEMENT: BitfieldSchema = BitfieldSchema::new(
    "element",
    &[
        BitField::unsigned("bone_index", 12, 4),
        BitField::unsigned("transform_type", 4, 0),
    ],
);

/// Key word: two flags and a 14-bit frame.
static KEY: BitfieldSchema = BitfieldSchema::new(
    "key",
    &[
        BitField::unsigned("flag_hi", 1, 15),
        BitField::unsigned("flag_lo", 1, 14),
        BitField::unsigned("frame", 14, 0),
    ],
);

/// One keyframe. Written to modding documents as `[flag_hi, flag_lo, frame, value]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u8, u8, u16, i16)", into = "(u8, u8, u16, i16)")]
pub struct AnimKey {
    pub flag_hi: u8,
    pub flag_lo: u8,
    pub frame: u16,
    pub value: i16,
}

impl From<(u8, u8, u16, i16)> for AnimKey {
    fn from((flag_hi, flag_lo, frame, value): (u8, u8, u16, i16)) -> Self {
        Self {
            flag_hi,
            flag_lo,
            frame,
            value,
        }
    }
}

impl From<AnimKey> for (u8, u8, u16, i16) {
    fn from(key: AnimKey) -> Self {
        (key.flag_hi, key.flag_lo, key.frame, key.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnimElement {
    pub bone_index: i16,
    pub transform_type: i16,
    pub data: Vec<AnimKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Bk64Animation {
    pub start_frame: i16,
    pub end_frame: i16,
    pub elements: Vec<AnimElement>,
}

impl Bk64Animation {
    /// Size of the encoded file in bytes.
    pub fn byte_len(&self) -> u32 {
        self.elements
            .iter()
            .map(|element| 4 + 4 * element.data.len() as u32)
            .sum::<u32>()
            + HEADER_SIZE
    }

    /// Reject values that do not fit their packed fields.
    fn validate(&self) -> Result<()> {
        for element in &self.elements {
            ELEMENT.encode(&[i64::from(element.bone_index), i64::from(element.transform_type)])?;
            for key in &element.data {
                KEY.encode(&[i64::from(key.flag_hi), i64::from(key.flag_lo), i64::from(key.frame)])?;
            }
        }
        Ok(())
    }
}

fn animation(asset: &ParsedAsset) -> Result<&Bk64Animation> {
    match asset {
        ParsedAsset::Bk64Animation(anim) => Ok(anim),
        other => Err(other.mismatch(AssetKind::Bk64Animation)),
    }
}

pub struct Bk64AnimFactory;

impl Factory for Bk64AnimFactory {
    fn kind(&self) -> AssetKind {
        AssetKind::Bk64Animation
    }

    fn parse(&self, window: &[u8], _descriptor: &AssetDescriptor, _ctx: &mut RunContext) -> Result<ParsedAsset> {
        let mut reader = BinaryReader::big_endian(window);
        let start_frame = reader.read_i16()?;
        let end_frame = reader.read_i16()?;
        let element_count = reader.read_i16()?;
        reader.read_i16()?;

        if element_count < 0 {
            return Err(Error::parse(self.kind(), format!("negative element count {element_count}")));
        }

        let mut elements = Vec::with_capacity(element_count as usize);
        for _ in 0..element_count {
            let word = ELEMENT.decode(u32::from(reader.read_u16()?))?;
            let key_count = reader.read_i16()?;
            if key_count < 0 {
                return Err(Error::parse(self.kind(), format!("negative key count {key_count}")));
            }

            let mut data = Vec::with_capacity(key_count as usize);
            for _ in 0..key_count {
                let packed = KEY.decode(u32::from(reader.read_u16()?))?;
                data.push(AnimKey {
                    flag_hi: packed.get("flag_hi").unwrap_or_default() as u8,
                    flag_lo: packed.get("flag_lo").unwrap_or_default() as u8,
                    frame: packed.get("frame").unwrap_or_default() as u16,
                    value: reader.read_i16()?,
                });
            }

            elements.push(AnimElement {
                bone_index: word.get("bone_index").unwrap_or_default() as i16,
                transform_type: word.get("transform_type").unwrap_or_default() as i16,
                data,
            });
        }

        Ok(ParsedAsset::Bk64Animation(Bk64Animation {
            start_frame,
            end_frame,
            elements,
        }))
    }

    fn parse_modding(&self, document: &[u8]) -> Result<(String, ParsedAsset)> {
        let (symbol, anim) = read_document::<Bk64Animation>(document)?;
        anim.validate()
            .map_err(|e| Error::MalformedModdingDocument(e.to_string()))?;
        Ok((symbol, ParsedAsset::Bk64Animation(anim)))
    }

    fn exporters(&self) -> Vec<(ExportForm, Box<dyn Exporter>)> {
        vec![
            (ExportForm::Header, Box::new(AnimHeaderExporter)),
            (ExportForm::Code, Box::new(AnimCodeExporter)),
            (ExportForm::Binary, Box::new(AnimBinaryExporter)),
            (ExportForm::Modding, Box::new(AnimModdingExporter)),
        ]
    }
}

pub struct AnimHeaderExporter;

impl Exporter for AnimHeaderExporter {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        descriptor: &AssetDescriptor,
        _ctx: &RunContext,
    ) -> Result<ExportResult> {
        animation(asset)?;
        let symbol = &descriptor.symbol;
        writeln!(sink, "extern AnimationFile {symbol}_File;")?;
        writeln!(sink, "extern AnimationFileElement {symbol}_Data[];")?;
        Ok(ExportResult::Nothing)
    }
}

pub struct AnimCodeExporter;

impl Exporter for AnimCodeExporter {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        descriptor: &AssetDescriptor,
        _ctx: &RunContext,
    ) -> Result<ExportResult> {
        let anim = animation(asset)?;
        let symbol = &descriptor.symbol;

        writeln!(
            sink,
            "AnimationFile {symbol}_File = {{ {}, {}, {} }};\n",
            anim.start_frame,
            anim.end_frame,
            anim.elements.len()
        )?;
        writeln!(sink, "AnimationFileElement {symbol}_Data[] = {{")?;
        for element in &anim.elements {
            writeln!(sink, "{TAB}{{")?;
            writeln!(
                sink,
                "{TAB}{TAB}{}, {}, {},",
                element.bone_index,
                element.transform_type,
                element.data.len()
            )?;
            for key in &element.data {
                writeln!(
                    sink,
                    "{TAB}{TAB}{{ {}, {}, {}, {} }},",
                    key.flag_hi, key.flag_lo, key.frame, key.value
                )?;
            }
            writeln!(sink, "{TAB}}},")?;
        }
        writeln!(sink, "}};\n")?;

        Ok(ExportResult::after(descriptor.offset, u64::from(anim.byte_len())))
    }
}

pub struct AnimBinaryExporter;

impl Exporter for AnimBinaryExporter {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        _descriptor: &AssetDescriptor,
        _ctx: &RunContext,
    ) -> Result<ExportResult> {
        let anim = animation(asset)?;
        let mut writer = BinaryWriter::new();
        writer.write_header(ResourceType::BkAnimation, 0);
        writer.write_i16(anim.start_frame);
        writer.write_i16(anim.end_frame);
        writer.write_u32(anim.elements.len() as u32);
        for element in &anim.elements {
            writer.write_i16(element.bone_index);
            writer.write_i16(element.transform_type);
            writer.write_u32(element.data.len() as u32);
            for key in &element.data {
                writer.write_u8(key.flag_hi);
                writer.write_u8(key.flag_lo);
                writer.write_u16(key.frame);
                writer.write_i16(key.value);
            }
        }
        writer.finish(sink)?;
        Ok(ExportResult::Nothing)
    }
}

pub struct AnimModdingExporter;

impl Exporter for AnimModdingExporter {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        descriptor: &AssetDescriptor,
        _ctx: &RunContext,
    ) -> Result<ExportResult> {
        write_document(sink, &descriptor.symbol, animation(asset)?)?;
        Ok(ExportResult::Nothing)
    }
}
