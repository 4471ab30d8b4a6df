//! Binary writer for building resource payloads in memory.

use std::io::Write;

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

use crate::{Endianness, ResourceHeader, ResourceType, Result};

macro_rules! write_ordered {
    ($self:ident, $method:ident, $value:expr) => {{
        // Writing into a Vec cannot fail.
        let _ = match $self.endianness {
            Endianness::Big => $self.buffer.$method::<BigEndian>($value),
            Endianness::Little => $self.buffer.$method::<LittleEndian>($value),
        };
    }};
}

/// Appends typed values to an in-memory buffer.
///
/// Nothing reaches the destination until [`finish`](Self::finish).
///
/// # Example
///
/// ```
/// use n64rip_common::{BinaryWriter, ResourceType};
///
/// let mut writer = BinaryWriter::new();
/// writer.write_header(ResourceType::Blob, 0);
/// writer.write_u32(3);
///
/// let mut out = Vec::new();
/// writer.finish(&mut out).unwrap();
/// assert_eq!(out.len(), 12);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BinaryWriter {
    buffer: Vec<u8>,
    endianness: Endianness,
}

impl BinaryWriter {
    /// Create a little-endian writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with an explicit byte order.
    pub fn with_endianness(endianness: Endianness) -> Self {
        Self {
            buffer: Vec::new(),
            endianness,
        }
    }

    /// Current length of the buffered output.
    #[inline]
    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    /// Write the resource envelope. Must precede any payload.
    pub fn write_header(&mut self, kind: ResourceType, version: u32) {
        let header = ResourceHeader { kind, version };
        self.buffer.extend_from_slice(&header.to_bytes());
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buffer.push(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        write_ordered!(self, write_u16, value);
    }

    pub fn write_i16(&mut self, value: i16) {
        write_ordered!(self, write_i16, value);
    }

    pub fn write_u32(&mut self, value: u32) {
        write_ordered!(self, write_u32, value);
    }

    pub fn write_i32(&mut self, value: i32) {
        write_ordered!(self, write_i32, value);
    }

    pub fn write_f32(&mut self, value: f32) {
        write_ordered!(self, write_f32, value);
    }

    /// Write raw bytes verbatim.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Borrow the buffered bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Take the buffered bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    /// Flush the buffered bytes to `sink`.
    pub fn finish<W: Write + ?Sized>(self, sink: &mut W) -> Result<()> {
        sink.write_all(&self.buffer)?;
        sink.flush()?;
        Ok(())
    }
}
