//! Bitfield extraction and declarative record schemas.
//!
//! Packed N64 records are described as data: each field names its width,
//! bit offset (from the least significant bit) and signedness, and a
//! [`BitfieldSchema`] decodes or re-packs a whole word at once.
//!
//! ```
//! use n64rip_common::bitfield::{BitField, BitfieldSchema};
//!
//! const ELEMENT: BitfieldSchema = BitfieldSchema::new(
//!     "element",
//!     &[
//!         BitField::unsigned("bone_index", 12, 4),
//!         BitField::unsigned("transform_type", 4, 0),
//!     ],
//! );
//!
//! let fields = ELEMENT.decode(0x0123).unwrap();
//! assert_eq!(fields.get("bone_index"), Some(0x12));
//! assert_eq!(fields.get("transform_type"), Some(0x3));
//! assert_eq!(ELEMENT.encode(&[0x12, 0x3]).unwrap(), 0x0123);
//! ```

use crate::{Error, Result};

#[inline]
fn mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1u32 << width) - 1
    }
}

#[inline]
fn check(width: u32, bit_offset: u32) -> Result<()> {
    if width == 0 || width.checked_add(bit_offset).map_or(true, |end| end > 32) {
        return Err(Error::InvalidBitfield { width, bit_offset });
    }
    Ok(())
}

/// Extract `width` bits starting at `bit_offset`, zero-extended.
pub fn extract(value: u32, width: u32, bit_offset: u32) -> Result<u32> {
    check(width, bit_offset)?;
    Ok((value >> bit_offset) & mask(width))
}

/// Sign-extend the low `width` bits of `value`.
pub fn sign_extend(value: u32, width: u32) -> i32 {
    if width == 0 || width >= 32 {
        return value as i32;
    }
    let shift = 32 - width;
    ((value << shift) as i32) >> shift
}

/// Replace `width` bits at `bit_offset` in `word` with `value`.
pub fn insert(word: u32, value: u32, width: u32, bit_offset: u32) -> Result<u32> {
    check(width, bit_offset)?;
    let field_mask = mask(width) << bit_offset;
    Ok((word & !field_mask) | ((value << bit_offset) & field_mask))
}

/// One named field of a packed word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub name: &'static str,
    pub width: u32,
    pub bit_offset: u32,
    pub signed: bool,
}

impl BitField {
    pub const fn unsigned(name: &'static str, width: u32, bit_offset: u32) -> Self {
        Self {
            name,
            width,
            bit_offset,
            signed: false,
        }
    }

    pub const fn signed(name: &'static str, width: u32, bit_offset: u32) -> Self {
        Self {
            name,
            width,
            bit_offset,
            signed: true,
        }
    }

    /// Decode this field from a packed word.
    pub fn decode(&self, word: u32) -> Result<i64> {
        let raw = extract(word, self.width, self.bit_offset)?;
        Ok(if self.signed {
            i64::from(sign_extend(raw, self.width))
        } else {
            i64::from(raw)
        })
    }

    /// Pack `value` into `word`, rejecting values that do not fit.
    pub fn encode(&self, word: u32, value: i64) -> Result<u32> {
        check(self.width, self.bit_offset)?;
        let (min, max) = if self.signed {
            let half = 1i64 << (self.width - 1);
            (-half, half - 1)
        } else {
            (0, i64::from(mask(self.width)))
        };
        if value < min || value > max {
            return Err(Error::BitfieldOverflow {
                field: self.name,
                value,
            });
        }
        insert(word, value as u32, self.width, self.bit_offset)
    }
}

/// Layout of a packed word as an ordered list of fields.
#[derive(Debug, Clone, Copy)]
pub struct BitfieldSchema {
    name: &'static str,
    fields: &'static [BitField],
}

impl BitfieldSchema {
    pub const fn new(name: &'static str, fields: &'static [BitField]) -> Self {
        Self { name, fields }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn fields(&self) -> &'static [BitField] {
        self.fields
    }

    /// Decode every field of `word`, in schema order.
    pub fn decode(&self, word: u32) -> Result<FieldValues<'_>> {
        let values = self
            .fields
            .iter()
            .map(|field| field.decode(word))
            .collect::<Result<Vec<_>>>()?;
        Ok(FieldValues {
            schema: self,
            values,
        })
    }

    /// Pack `values` (in schema order) into a word.
    pub fn encode(&self, values: &[i64]) -> Result<u32> {
        self.fields
            .iter()
            .zip(values)
            .try_fold(0u32, |word, (field, &value)| field.encode(word, value))
    }
}

/// Field values decoded by a [`BitfieldSchema`].
#[derive(Debug, Clone)]
pub struct FieldValues<'s> {
    schema: &'s BitfieldSchema,
    values: Vec<i64>,
}

impl FieldValues<'_> {
    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<i64> {
        self.schema
            .fields
            .iter()
            .position(|field| field.name == name)
            .map(|index| self.values[index])
    }

    /// Values in schema order.
    pub fn values(&self) -> &[i64] {
        &self.values
    }
}
