//! Binary reader for zero-copy parsing of byte slices.
//!
//! This module provides [`BinaryReader`], a cursor-like type that reads
//! typed values from a byte slice in a selectable byte order.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use zerocopy::FromBytes;

use crate::bitfield;
use crate::{Endianness, Error, Result};

macro_rules! read_ordered {
    ($self:ident, $ty:ty, $method:ident) => {{
        let bytes = $self.read_bytes(std::mem::size_of::<$ty>())?;
        let value = match $self.endianness {
            Endianness::Big => BigEndian::$method(bytes),
            Endianness::Little => LittleEndian::$method(bytes),
        };
        value
    }};
}

/// A binary reader that provides zero-copy reading from a byte slice.
///
/// Reads advance the position and fail with [`Error::OutOfBounds`] when
/// fewer bytes remain than requested. [`seek`](Self::seek) is not
/// bounds-checked; the next read reports the problem.
///
/// # Example
///
/// ```
/// use n64rip_common::{BinaryReader, Endianness};
///
/// let data = [0x01, 0x02, 0x03, 0x04];
/// let mut reader = BinaryReader::with_endianness(&data, Endianness::Big);
///
/// assert_eq!(reader.read_u16().unwrap(), 0x0102);
/// assert_eq!(reader.read_u16().unwrap(), 0x0304);
/// assert!(reader.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
    endianness: Endianness,
    last_value: Option<u32>,
}

impl<'a> BinaryReader<'a> {
    /// Create a new little-endian reader from a byte slice.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self::with_endianness(data, Endianness::Little)
    }

    /// Create a new reader with an explicit byte order.
    #[inline]
    pub const fn with_endianness(data: &'a [u8], endianness: Endianness) -> Self {
        Self {
            data,
            position: 0,
            endianness,
            last_value: None,
        }
    }

    /// Shorthand for a big-endian reader, the native order of N64 data.
    #[inline]
    pub const fn big_endian(data: &'a [u8]) -> Self {
        Self::with_endianness(data, Endianness::Big)
    }

    /// Change the byte order used by subsequent reads.
    #[inline]
    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    /// Get the byte order used by reads.
    #[inline]
    pub const fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Get the current position in the buffer.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Get the total length of the underlying buffer.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Get the number of bytes remaining to read.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check if there are no more bytes to read.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Seek to an absolute position.
    #[inline]
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// Advance the position by a number of bytes.
    #[inline]
    pub fn advance(&mut self, count: usize) {
        self.position = self.position.saturating_add(count);
    }

    /// Get the remaining bytes as a slice.
    #[inline]
    pub fn remaining_bytes(&self) -> &'a [u8] {
        &self.data[self.position.min(self.data.len())..]
    }

    /// Peek at bytes without advancing the position.
    #[inline]
    pub fn peek_bytes(&self, count: usize) -> Result<&'a [u8]> {
        if self.position > self.data.len() || self.remaining() < count {
            return Err(Error::OutOfBounds {
                offset: self.position,
                needed: count,
                available: self.remaining(),
            });
        }
        Ok(&self.data[self.position..self.position + count])
    }

    /// Read bytes and advance the position.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(count)?;
        self.position += count;
        Ok(bytes)
    }

    /// Read a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        let value = self.read_bytes(1).map(|b| b[0])?;
        self.last_value = Some(u32::from(value));
        Ok(value)
    }

    /// Read a signed byte.
    #[inline]
    pub fn read_i8(&mut self) -> Result<i8> {
        self.read_u8().map(|b| b as i8)
    }

    /// Read a u16 in the reader's byte order.
    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        let value = read_ordered!(self, u16, read_u16);
        self.last_value = Some(u32::from(value));
        Ok(value)
    }

    /// Read an i16 in the reader's byte order.
    #[inline]
    pub fn read_i16(&mut self) -> Result<i16> {
        self.read_u16().map(|v| v as i16)
    }

    /// Read a u32 in the reader's byte order.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        let value = read_ordered!(self, u32, read_u32);
        self.last_value = Some(value);
        Ok(value)
    }

    /// Read an i32 in the reader's byte order.
    #[inline]
    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_u32().map(|v| v as i32)
    }

    /// Read an f32 in the reader's byte order.
    #[inline]
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(read_ordered!(self, f32, read_f32))
    }

    /// Extract `width` bits at `bit_offset` from the integer read last.
    ///
    /// The field is zero-extended; use [`bitfield::sign_extend`] when the
    /// field is signed.
    pub fn read_bitfield(&self, width: u32, bit_offset: u32) -> Result<u32> {
        let value = self.last_value.ok_or(Error::NoBitfieldSource)?;
        bitfield::extract(value, width, bit_offset)
    }

    /// Read a struct using zerocopy.
    ///
    /// The struct must implement `FromBytes` from the zerocopy crate. Byte
    /// order is the struct's concern (use zerocopy's `byteorder` types).
    #[inline]
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let offset = self.position;
        let bytes = self.read_bytes(size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::OutOfBounds {
            offset,
            needed: size,
            available: bytes.len(),
        })
    }

    /// Peek at a u32 without advancing.
    #[inline]
    pub fn peek_u32(&self) -> Result<u32> {
        let bytes = self.peek_bytes(4)?;
        Ok(match self.endianness {
            Endianness::Big => BigEndian::read_u32(bytes),
            Endianness::Little => LittleEndian::read_u32(bytes),
        })
    }
}
