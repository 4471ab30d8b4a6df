//! `BK64:DEMO_INPUT`: recorded controller input for attract-mode demos.

use std::io::Write;

use n64rip_common::{BinaryReader, BinaryWriter, ResourceType};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::TAB;
use crate::dispatch::{ExportResult, Exporter, Factory};
use crate::modding::{read_document, write_document};
use crate::{AssetDescriptor, AssetKind, ExportForm, ParsedAsset, Result, RunContext};

const INPUT_SIZE: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ControllerInput {
    pub stick_x: i8,
    pub stick_y: i8,
    pub buttons: u16,
    pub frames: u8,
    pub flag: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DemoInput {
    pub controller_inputs: Vec<ControllerInput>,
}

impl DemoInput {
    /// Value of the leading size word.
    pub fn byte_size(&self) -> u32 {
        self.controller_inputs.len() as u32 * INPUT_SIZE
    }
}

fn demo(asset: &ParsedAsset) -> Result<&DemoInput> {
    match asset {
        ParsedAsset::Bk64DemoInput(demo) => Ok(demo),
        other => Err(other.mismatch(AssetKind::Bk64DemoInput)),
    }
}

pub struct DemoInputFactory;

impl Factory for DemoInputFactory {
    fn kind(&self) -> AssetKind {
        AssetKind::Bk64DemoInput
    }

    fn parse(&self, window: &[u8], descriptor: &AssetDescriptor, _ctx: &mut RunContext) -> Result<ParsedAsset> {
        // Files shorter than the size word hold no input.
        if window.len() < 4 {
            return Ok(ParsedAsset::Bk64DemoInput(DemoInput::default()));
        }

        let mut reader = BinaryReader::big_endian(window);
        let size = reader.read_u32()?;
        let controller_inputs = (0..size / INPUT_SIZE)
            .map(|_| -> Result<ControllerInput> {
                Ok(ControllerInput {
                    stick_x: reader.read_i8()?,
                    stick_y: reader.read_i8()?,
                    buttons: reader.read_u16()?,
                    frames: reader.read_u8()?,
                    flag: reader.read_u8()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(symbol = %descriptor.symbol, inputs = controller_inputs.len(), "parsed demo input");
        Ok(ParsedAsset::Bk64DemoInput(DemoInput { controller_inputs }))
    }

    fn parse_modding(&self, document: &[u8]) -> Result<(String, ParsedAsset)> {
        let (symbol, demo) = read_document::<DemoInput>(document)?;
        Ok((symbol, ParsedAsset::Bk64DemoInput(demo)))
    }

    fn exporters(&self) -> Vec<(ExportForm, Box<dyn Exporter>)> {
        vec![
            (ExportForm::Header, Box::new(DemoInputHeaderExporter)),
            (ExportForm::Code, Box::new(DemoInputCodeExporter)),
            (ExportForm::Binary, Box::new(DemoInputBinaryExporter)),
            (ExportForm::Modding, Box::new(DemoInputModdingExporter)),
        ]
    }
}

pub struct DemoInputHeaderExporter;

impl Exporter for DemoInputHeaderExporter {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        descriptor: &AssetDescriptor,
        _ctx: &RunContext,
    ) -> Result<ExportResult> {
        demo(asset)?;
        writeln!(sink, "extern DemoFileHeader {};", descriptor.symbol)?;
        Ok(ExportResult::Nothing)
    }
}

pub struct DemoInputCodeExporter;

impl Exporter for DemoInputCodeExporter {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        descriptor: &AssetDescriptor,
        _ctx: &RunContext,
    ) -> Result<ExportResult> {
        let demo = demo(asset)?;
        writeln!(sink, "DemoFileHeader {} = {{", descriptor.symbol)?;
        writeln!(sink, "{TAB}{},", demo.byte_size())?;
        for input in &demo.controller_inputs {
            writeln!(
                sink,
                "{TAB}{{ {}, {}, 0x{:04X}, {}, {} }},",
                input.stick_x, input.stick_y, input.buttons, input.frames, input.flag
            )?;
        }
        writeln!(sink, "}};\n")?;
        Ok(ExportResult::after(descriptor.offset, 4 + u64::from(demo.byte_size())))
    }
}

pub struct DemoInputBinaryExporter;

impl Exporter for DemoInputBinaryExporter {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        _descriptor: &AssetDescriptor,
        _ctx: &RunContext,
    ) -> Result<ExportResult> {
        let demo = demo(asset)?;
        let mut writer = BinaryWriter::new();
        writer.write_header(ResourceType::BkDemoInput, 0);
        writer.write_u32(demo.controller_inputs.len() as u32);
        for input in &demo.controller_inputs {
            writer.write_i8(input.stick_x);
            writer.write_i8(input.stick_y);
            writer.write_u16(input.buttons);
            writer.write_u8(input.frames);
            writer.write_u8(input.flag);
        }
        writer.finish(sink)?;
        Ok(ExportResult::Nothing)
    }
}

pub struct DemoInputModdingExporter;

impl Exporter for DemoInputModdingExporter {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        descriptor: &AssetDescriptor,
        _ctx: &RunContext,
    ) -> Result<ExportResult> {
        write_document(sink, &descriptor.symbol, demo(asset)?)?;
        Ok(ExportResult::Nothing)
    }
}
