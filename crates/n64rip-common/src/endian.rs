//! Byte order selection for cursors.

/// Byte order used by a [`BinaryReader`](crate::BinaryReader) or
/// [`BinaryWriter`](crate::BinaryWriter).
///
/// N64 data is big-endian; binary resources are written little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Endianness {
    Big,
    #[default]
    Little,
}

impl Endianness {
    /// The byte order of the host machine.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }
}
