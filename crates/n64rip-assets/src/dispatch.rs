//! Factory and exporter registration.
//!
//! Kinds are only known once the run configuration is loaded, so lookup
//! stays dynamic: one [`Factory`] per [`AssetKind`] and one [`Exporter`]
//! per `(AssetKind, ExportForm)`. A missing pair is reported as
//! [`Error::UnsupportedExport`]; there is no fallback exporter.

use std::io::Write;

use rustc_hash::FxHashMap;

use crate::{AssetDescriptor, AssetKind, Error, ExportForm, ParsedAsset, Result, RunContext};

/// What an exporter tells the driver about the layout it just wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportResult {
    #[default]
    Nothing,
    /// Offset where the next contiguous asset is expected to start.
    Successor(u32),
    /// Data offset referenced by the asset and the offset just past its header.
    OffsetPair { data: u32, end: u32 },
}

impl ExportResult {
    /// Successor of an asset of `len` bytes at `offset`, or nothing when
    /// it would fall past the end of the address space.
    pub fn after(offset: u32, len: u64) -> Self {
        u32::try_from(u64::from(offset) + len).map_or(Self::Nothing, Self::Successor)
    }

    /// The offset the next asset of a merged array should start at.
    pub fn successor(self) -> Option<u32> {
        match self {
            Self::Nothing => None,
            Self::Successor(offset) => Some(offset),
            Self::OffsetPair { end, .. } => Some(end),
        }
    }
}

/// Writes a parsed asset in one output form.
pub trait Exporter: Send + Sync {
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        descriptor: &AssetDescriptor,
        ctx: &RunContext,
    ) -> Result<ExportResult>;
}

impl<F> Exporter for F
where
    F: Fn(&mut dyn Write, &ParsedAsset, &AssetDescriptor, &RunContext) -> Result<ExportResult>
        + Send
        + Sync,
{
    fn export(
        &self,
        sink: &mut dyn Write,
        asset: &ParsedAsset,
        descriptor: &AssetDescriptor,
        ctx: &RunContext,
    ) -> Result<ExportResult> {
        self(sink, asset, descriptor, ctx)
    }
}

/// Parses one asset kind and supplies its exporters.
pub trait Factory: Send + Sync {
    fn kind(&self) -> AssetKind;

    /// Decoded window length this asset needs, if it can be known up front.
    fn window_size(&self, _descriptor: &AssetDescriptor) -> Result<Option<u32>> {
        Ok(None)
    }

    /// Decode the asset from its window. May declare segments and queue
    /// further assets through `ctx`.
    fn parse(
        &self,
        window: &[u8],
        descriptor: &AssetDescriptor,
        ctx: &mut RunContext,
    ) -> Result<ParsedAsset>;

    /// Rebuild an asset from its modding document. Returns the document's symbol.
    fn parse_modding(&self, _document: &[u8]) -> Result<(String, ParsedAsset)> {
        Err(Error::UnsupportedExport {
            kind: self.kind(),
            form: ExportForm::Modding,
        })
    }

    fn exporters(&self) -> Vec<(ExportForm, Box<dyn Exporter>)>;
}

/// The `(kind, form)` dispatch matrix.
#[derive(Default)]
pub struct Dispatcher {
    factories: FxHashMap<AssetKind, Box<dyn Factory>>,
    exporters: FxHashMap<(AssetKind, ExportForm), Box<dyn Exporter>>,
}

impl Dispatcher {
    /// An empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher with every built-in kind registered.
    pub fn with_builtin() -> Self {
        let mut dispatcher = Self::new();
        crate::formats::register_builtin(&mut dispatcher);
        dispatcher
    }

    /// Register a factory together with the exporters it supplies.
    pub fn register_factory(&mut self, factory: impl Factory + 'static) {
        let kind = factory.kind();
        for (form, exporter) in factory.exporters() {
            self.exporters.insert((kind, form), exporter);
        }
        self.factories.insert(kind, Box::new(factory));
    }

    /// Register (or replace) one exporter.
    pub fn register_exporter(&mut self, kind: AssetKind, form: ExportForm, exporter: impl Exporter + 'static) {
        self.exporters.insert((kind, form), Box::new(exporter));
    }

    pub fn factory(&self, kind: AssetKind) -> Result<&dyn Factory> {
        self.factories
            .get(&kind)
            .map(|factory| factory.as_ref())
            .ok_or(Error::UnsupportedKind(kind))
    }

    pub fn exporter(&self, kind: AssetKind, form: ExportForm) -> Result<&dyn Exporter> {
        self.exporters
            .get(&(kind, form))
            .map(|exporter| exporter.as_ref())
            .ok_or(Error::UnsupportedExport { kind, form })
    }

    pub fn supports(&self, kind: AssetKind, form: ExportForm) -> bool {
        self.exporters.contains_key(&(kind, form))
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<AssetKind> {
        let mut kinds: Vec<_> = self.factories.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut pairs: Vec<_> = self.exporters.keys().copied().collect();
        pairs.sort_unstable();
        f.debug_struct("Dispatcher")
            .field("kinds", &self.kinds())
            .field("exporters", &pairs)
            .finish()
    }
}
