//! Segmented address resolution.
//!
//! N64 code refers to data through segment-tagged pointers: the top byte
//! selects one of the RSP segments and the low 24 bits are an offset into
//! it. Segments are declared incrementally as parsers discover the data
//! windows they describe, so resolution depends on processing order.

use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use crate::{Error, Result, SourceId};

const SEGMENT_SHIFT: u32 = 24;
const SEGMENT_OFFSET_MASK: u32 = 0x00FF_FFFF;
const SEGMENT_LIMIT: u8 = 0x20;

/// Segment id encoded in the high byte of an address.
#[inline]
pub const fn segment_number(address: u32) -> u8 {
    (address >> SEGMENT_SHIFT) as u8
}

/// Offset within the segment, the low 24 bits.
#[inline]
pub const fn segment_offset(address: u32) -> u32 {
    address & SEGMENT_OFFSET_MASK
}

/// Whether `address` carries a segment tag (segments `0x01..0x20`).
#[inline]
pub const fn is_segmented(address: u32) -> bool {
    let segment = segment_number(address);
    segment > 0 && segment < SEGMENT_LIMIT
}

/// A pointer as it appears in ROM data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalAddress {
    /// A plain offset into the main source image.
    Absolute(u32),
    /// An offset relative to a declared segment window.
    Segmented { segment: u8, offset: u32 },
}

impl LogicalAddress {
    pub const fn from_raw(address: u32) -> Self {
        if is_segmented(address) {
            Self::Segmented {
                segment: segment_number(address),
                offset: segment_offset(address),
            }
        } else {
            Self::Absolute(address)
        }
    }

    pub const fn to_raw(self) -> u32 {
        match self {
            Self::Absolute(address) => address,
            Self::Segmented { segment, offset } => {
                ((segment as u32) << SEGMENT_SHIFT) | (offset & SEGMENT_OFFSET_MASK)
            }
        }
    }
}

impl From<u32> for LogicalAddress {
    fn from(address: u32) -> Self {
        Self::from_raw(address)
    }
}

/// Where a declared segment points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentMapping {
    pub source: SourceId,
    /// Absolute offset that segment offset 0 resolves to.
    pub base: u32,
    pub window_start: u32,
    pub window_end: u32,
}

impl SegmentMapping {
    /// Whether an absolute offset lies inside the declared window.
    pub fn contains(&self, absolute: u32) -> bool {
        absolute >= self.window_start && absolute < self.window_end
    }
}

/// A resolved address: which source and where in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub source: SourceId,
    pub offset: u32,
}

/// Run-wide segment table.
///
/// The last declaration for a segment id wins.
#[derive(Debug, Clone, Default)]
pub struct SegmentTable {
    mappings: FxHashMap<u8, SegmentMapping>,
}

impl SegmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or redeclare) segment `segment` as the window
    /// `[base, window_end)` of `source`.
    pub fn declare_segment(&mut self, segment: u8, source: SourceId, base: u32, window_end: u32) {
        let mapping = SegmentMapping {
            source,
            base,
            window_start: base,
            window_end,
        };
        if let Some(previous) = self.mappings.insert(segment, mapping) {
            if previous != mapping {
                trace!(segment, ?previous, ?mapping, "segment redeclared");
            }
        } else {
            trace!(segment, ?mapping, "segment declared");
        }
    }

    /// Look up the current mapping of a segment.
    pub fn get(&self, segment: u8) -> Option<&SegmentMapping> {
        self.mappings.get(&segment)
    }

    pub fn is_mapped(&self, segment: u8) -> bool {
        self.mappings.contains_key(&segment)
    }

    /// Resolve a logical address to its source and absolute offset.
    pub fn resolve_address(&self, address: u32) -> Result<ResolvedAddress> {
        match LogicalAddress::from_raw(address) {
            LogicalAddress::Absolute(offset) => Ok(ResolvedAddress {
                source: SourceId::MAIN,
                offset,
            }),
            LogicalAddress::Segmented { segment, offset } => {
                let mapping = self.mappings.get(&segment).ok_or_else(|| {
                    warn!(segment, address = format_args!("{address:#010x}"), "address uses an unmapped segment");
                    Error::UnmappedSegment { segment, address }
                })?;
                let absolute = mapping.base.wrapping_add(offset);
                if !mapping.contains(absolute) {
                    trace!(
                        segment,
                        address = format_args!("{address:#010x}"),
                        "resolved address falls outside the declared window"
                    );
                }
                Ok(ResolvedAddress {
                    source: mapping.source,
                    offset: absolute,
                })
            }
        }
    }

    /// Resolve a logical address to an absolute offset.
    pub fn resolve(&self, address: u32) -> Result<u32> {
        self.resolve_address(address).map(|resolved| resolved.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_helpers() {
        assert!(is_segmented(0x0600_1234));
        assert!(!is_segmented(0x0000_1234));
        assert!(!is_segmented(0x8000_1234));
        assert_eq!(segment_number(0x0600_1234), 6);
        assert_eq!(segment_offset(0x0600_1234), 0x1234);

        let address = LogicalAddress::from_raw(0x0200_0010);
        assert_eq!(
            address,
            LogicalAddress::Segmented {
                segment: 2,
                offset: 0x10
            }
        );
        assert_eq!(address.to_raw(), 0x0200_0010);
    }

    #[test]
    fn test_absolute_addresses_pass_through() {
        let table = SegmentTable::new();
        assert_eq!(table.resolve(0x1234).unwrap(), 0x1234);
    }

    #[test]
    fn test_unmapped_segment_fails() {
        let table = SegmentTable::new();
        assert!(matches!(
            table.resolve(0x0600_0010),
            Err(Error::UnmappedSegment {
                segment: 6,
                address: 0x0600_0010
            })
        ));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let mut table = SegmentTable::new();
        table.declare_segment(6, SourceId::MAIN, 0x1000, 0x2000);

        let first = table.resolve(0x0600_0040).unwrap();
        let second = table.resolve(0x0600_0040).unwrap();
        assert_eq!(first, 0x1040);
        assert_eq!(first, second);
    }

    #[test]
    fn test_last_declaration_wins() {
        let mut table = SegmentTable::new();
        table.declare_segment(1, SourceId::MAIN, 0x100, 0x200);
        table.declare_segment(1, SourceId(1), 0x800, 0x900);

        let resolved = table.resolve_address(0x0100_0004).unwrap();
        assert_eq!(resolved.source, SourceId(1));
        assert_eq!(resolved.offset, 0x804);
    }
}
