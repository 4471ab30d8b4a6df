//! `SF64:ANIM`: Star Fox 64 skeletal animations.
//!
//! The 0xC-byte header points (usually through a segment) at a joint key
//! table and a frame data array. Neither array stores its own length: the
//! key table has one entry per limb plus the root, and the frame data
//! length is derived from the keys.

use std::io::Write;

use n64rip_common::{BinaryReader, BinaryWriter, ResourceType};
use n64rip_rom::{is_segmented, segment_offset, CODEC_NONE};
use tracing::{info, warn};

use super::TAB;
use crate::dispatch::{ExportResult, Exporter, Factory};
use crate::{AssetDescriptor, AssetKind, Error, ExportForm, ParsedAsset, Result, RunContext};

const HEADER_SIZE: u32 = 0xC;
const JOINT_KEY_SIZE: u32 = 12;

/// `{x_len, x, y_len, y, z_len, z}`: per-axis frame count and data index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointKey(pub [u16; 6]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sf64Animation {
    pub frame_count: i16,
    pub limb_count: i16,
    pub data_offset: u32,
    pub key_offset: u32,
    pub frame_data: Vec<u16>,
    pub joint_keys: Vec<JointKey>,
}

fn animation(asset: &ParsedAsset) -> Result<&Sf64Animation> {
    match asset {
        ParsedAsset::Sf64Animation(anim) => Ok(anim),
        other => Err(other.mismatch(AssetKind::Sf64Animation)),
    }
}

/// Number of frame data entries the keys reach.
fn frame_data_len(keys: &[JointKey], frame_count: i16) -> usize {
    let frames = frame_count.max(0) as usize;
    let mut count = 1usize;
    let mut max_index = 0usize;
    for JointKey(key) in keys {
        for axis in key.chunks_exact(2) {
            let (len, index) = (axis[0] as usize, axis[1] as usize);
            max_index = max_index.max(index);
            if index != 0 && len != 0 {
                count += len.min(frames);
            }
        }
    }
    count.max(max_index + 1)
}

pub struct Sf64AnimFactory;

impl Factory for Sf64AnimFactory {
    fn kind(&self) -> AssetKind {
        AssetKind::Sf64Animation
    }

    fn window_size(&self, _descriptor: &AssetDescriptor) -> Result<Option<u32>> {
        Ok(Some(HEADER_SIZE))
    }

    fn parse(&self, window: &[u8], descriptor: &AssetDescriptor, ctx: &mut RunContext) -> Result<ParsedAsset> {
        let mut reader = BinaryReader::big_endian(window);
        let frame_count = reader.read_i16()?;
        let limb_count = reader.read_i16()?;
        let data_offset = reader.read_u32()?;
        let key_offset = reader.read_u32()?;

        if limb_count < 0 {
            return Err(Error::parse(self.kind(), format!("negative limb count {limb_count}")));
        }

        let key_count = limb_count as u32 + 1;
        let key_bytes = ctx.read(key_offset, key_count * JOINT_KEY_SIZE, CODEC_NONE)?;
        let mut keys = BinaryReader::big_endian(&key_bytes);
        let joint_keys = (0..key_count)
            .map(|_| -> Result<JointKey> {
                let mut key = [0u16; 6];
                for slot in &mut key {
                    *slot = keys.read_u16()?;
                }
                Ok(JointKey(key))
            })
            .collect::<Result<Vec<_>>>()?;

        let data_len = frame_data_len(&joint_keys, frame_count);
        let data_bytes = ctx.read(data_offset, data_len as u32 * 2, CODEC_NONE)?;
        let mut data = BinaryReader::big_endian(&data_bytes);
        let frame_data = (0..data_len)
            .map(|_| data.read_u16())
            .collect::<n64rip_common::Result<Vec<_>>>()?;

        if frame_data.first().is_some_and(|&v| v != 0) {
            info!(symbol = %descriptor.symbol, "non-zero frame data on the first frame");
        }
        if joint_keys.first().is_some_and(|k| k.0[1] != 0) {
            info!(symbol = %descriptor.symbol, "non-zero joint key on the first frame");
        }

        Ok(ParsedAsset::Sf64Animation(Sf64Animation {
            frame_count,
            limb_count,
            data_offset,
            key_offset,
            frame_data,
            joint_keys,
        }))
    }

    fn exporters(&self) -> Vec<(ExportForm, Box<dyn Exporter>)> {
        vec![
            (ExportForm::Header, Box::new(AnimHeaderExporter)),
            (ExportForm::Code, Box::new(AnimCodeExporter)),
            (ExportForm::Binary, Box::new(AnimBinaryExporter)),
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
        let anim = animation(asset)?;
        writeln!(
            sink,
            "extern Animation {}; // frames: {}, limbs: {}",
            descriptor.symbol,
            anim.frame_count,
            i32::from(anim.limb_count) + 1
        )?;
        Ok(ExportResult::Nothing)
    }
}

fn strip_segment(address: u32) -> u32 {
    if is_segmented(address) {
        segment_offset(address)
    } else {
        address
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
        let data_offset = strip_segment(anim.data_offset);
        let key_offset = strip_segment(anim.key_offset);

        let data_name = match descriptor.attributes.get_str("data_symbol")? {
            Some(name) => name.to_string(),
            None => format!("{symbol}_frame_data_{data_offset:X}"),
        };
        let key_name = match descriptor.attributes.get_str("key_symbol")? {
            Some(name) => name.to_string(),
            None => format!("{symbol}_joint_key_{key_offset:X}"),
        };

        let mut data_count = anim.frame_data.len();
        let data_end = u64::from(data_offset) + 2 * data_count as u64;
        if data_offset < key_offset && data_end > u64::from(key_offset) {
            data_count = ((key_offset - data_offset) / 2) as usize;
            warn!(symbol = %symbol, "frame data overlaps joint keys, truncating");
            writeln!(sink, "// SF64:ANIM error: Frame data overlaps joint key.")?;
        }

        write!(sink, "u16 {data_name}[] = {{")?;
        for (i, value) in anim.frame_data[..data_count].iter().enumerate() {
            if i % 12 == 0 {
                write!(sink, "\n{TAB}")?;
            }
            write!(sink, "{value:>7},")?;
        }
        writeln!(sink, "\n}};\n")?;

        writeln!(sink, "JointKey {key_name}[] = {{")?;
        for JointKey(key) in &anim.joint_keys {
            write!(sink, "{TAB}{{")?;
            for value in key {
                write!(sink, "{value:>5}, ")?;
            }
            writeln!(sink, "}},")?;
        }
        writeln!(sink, "}};\n")?;

        writeln!(sink, "Animation {symbol} = {{")?;
        writeln!(
            sink,
            "{TAB}{}, {}, {data_name}, {key_name},",
            anim.frame_count, anim.limb_count
        )?;
        writeln!(sink, "}};")?;

        Ok(ExportResult::OffsetPair {
            data: anim.data_offset,
            end: descriptor.offset + HEADER_SIZE,
        })
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
        writer.write_header(ResourceType::Animation, 0);
        writer.write_i16(anim.frame_count);
        writer.write_i16(anim.limb_count);
        writer.write_u32(anim.joint_keys.len() as u32);
        for JointKey(key) in &anim.joint_keys {
            for &value in key {
                writer.write_u16(value);
            }
        }
        writer.write_u32(anim.frame_data.len() as u32);
        for &value in &anim.frame_data {
            writer.write_u16(value);
        }
        writer.finish(sink)?;
        Ok(ExportResult::Nothing)
    }
}
