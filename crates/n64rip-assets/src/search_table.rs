//! Search tables: configured runs of same-kind assets emitted as one array.
//!
//! Each entry covers the inclusive offset range `[start, end]`, where `end`
//! is the offset of the last member. Header and Code exporters ask the
//! table where an asset sits in its run and open, continue, or close the
//! merged array accordingly.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AssetKind, Error, Result};

/// How members of a table are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Members are written inline as rows of one array.
    #[default]
    Append,
    /// Members are written standalone; a pointer table follows the last one.
    Reference,
}

/// One configured table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTableEntry {
    pub name: String,
    /// Restricts the table to one kind; `None` matches any kind.
    #[serde(default)]
    pub kind: Option<AssetKind>,
    pub start: u32,
    pub end: u32,
    #[serde(default)]
    pub mode: MergeMode,
    /// Overrides the element stride used for the array dimension.
    #[serde(default)]
    pub index_size: Option<u32>,
}

impl SearchTableEntry {
    pub fn new(name: impl Into<String>, start: u32, end: u32) -> Self {
        Self {
            name: name.into(),
            kind: None,
            start,
            end,
            mode: MergeMode::Append,
            index_size: None,
        }
    }

    pub fn with_kind(mut self, kind: AssetKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_mode(mut self, mode: MergeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn contains(&self, offset: u32) -> bool {
        offset >= self.start && offset <= self.end
    }

    fn matches_kind(&self, kind: AssetKind) -> bool {
        self.kind.map_or(true, |k| k == kind)
    }

    fn shares_kinds_with(&self, other: &SearchTableEntry) -> bool {
        match (self.kind, other.kind) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

/// Position of an asset within a merged array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArrayState {
    NotInTable,
    Opening,
    Continuing,
    Closing,
    /// Single-member table: opens and closes on the same asset.
    OpeningAndClosing,
}

impl ArrayState {
    /// State of `offset` relative to `entry`. A pure function of its inputs.
    pub fn of(offset: u32, entry: Option<&SearchTableEntry>) -> Self {
        let Some(entry) = entry.filter(|e| e.contains(offset)) else {
            return Self::NotInTable;
        };
        match (offset == entry.start, offset == entry.end) {
            (true, true) => Self::OpeningAndClosing,
            (true, false) => Self::Opening,
            (false, true) => Self::Closing,
            (false, false) => Self::Continuing,
        }
    }

    pub fn opens(self) -> bool {
        matches!(self, Self::Opening | Self::OpeningAndClosing)
    }

    pub fn closes(self) -> bool {
        matches!(self, Self::Closing | Self::OpeningAndClosing)
    }

    pub fn in_table(self) -> bool {
        self != Self::NotInTable
    }
}

/// Where an asset lands in the configured tables.
#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    pub entry: &'a SearchTableEntry,
    pub state: ArrayState,
}

impl Placement<'_> {
    /// Whether the asset is written as a row of a merged array.
    pub fn is_merged(&self) -> bool {
        self.entry.mode == MergeMode::Append
    }
}

/// Run-wide set of search tables. Populated before parsing starts and
/// only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct SearchTable {
    entries: Vec<SearchTableEntry>,
}

impl SearchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table. Fails if the range is inverted or overlaps a table that
    /// can hold the same kind.
    pub fn register(&mut self, entry: SearchTableEntry) -> Result<()> {
        if entry.start > entry.end {
            return Err(Error::InvalidSearchTable {
                name: entry.name,
                reason: format!("start {:#x} is past end {:#x}", entry.start, entry.end),
            });
        }
        if let Some(other) = self.entries.iter().find(|other| {
            other.shares_kinds_with(&entry) && other.start <= entry.end && entry.start <= other.end
        }) {
            return Err(Error::InvalidSearchTable {
                name: entry.name.clone(),
                reason: format!("overlaps `{}`", other.name),
            });
        }
        debug!(
            name = %entry.name,
            start = format_args!("{:#x}", entry.start),
            end = format_args!("{:#x}", entry.end),
            mode = ?entry.mode,
            "registered search table"
        );
        self.entries.push(entry);
        Ok(())
    }

    /// Find the table holding an asset of `kind` at `offset`.
    pub fn lookup(&self, kind: AssetKind, offset: u32) -> Option<&SearchTableEntry> {
        self.entries
            .iter()
            .find(|entry| entry.matches_kind(kind) && entry.contains(offset))
    }

    /// Table and array state for an asset, if it belongs to a table.
    pub fn placement(&self, kind: AssetKind, offset: u32) -> Option<Placement<'_>> {
        self.lookup(kind, offset).map(|entry| Placement {
            entry,
            state: ArrayState::of(offset, Some(entry)),
        })
    }

    pub fn entries(&self) -> &[SearchTableEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
