//! The extraction loop.
//!
//! [`Driver`] pulls descriptors from the work queue, parses each one and
//! runs every requested exporter on it before moving on. Assets that fail
//! are logged and recorded in the [`RunReport`]; only sink failures stop
//! the run.

use std::io::Write;

use n64rip_rom::{is_segmented, segment_number, SourceSet};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{AssetEntry, ExtractionConfig};
use crate::context::segments_ready;
use crate::dispatch::{Dispatcher, ExportResult};
use crate::{
    AssetDescriptor, AssetKind, Error, ExportForm, MergeMode, ParsedAsset, Result, RunContext,
    UnsupportedPolicy,
};

/// Receives rendered output.
///
/// Header and code output of all assets goes to one shared stream per
/// form, in processing order. Binary and modding output is one artifact
/// per asset.
pub trait OutputSink {
    fn write(&mut self, form: ExportForm, descriptor: &AssetDescriptor, bytes: &[u8]) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Collects all output in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    shared: FxHashMap<ExportForm, Vec<u8>>,
    artifacts: Vec<(ExportForm, String, Vec<u8>)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of a shared header or code stream.
    pub fn text(&self, form: ExportForm) -> String {
        self.shared
            .get(&form)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default()
    }

    /// The binary or modding artifact written for `symbol`.
    pub fn artifact(&self, form: ExportForm, symbol: &str) -> Option<&[u8]> {
        self.artifacts
            .iter()
            .find(|(f, s, _)| *f == form && s == symbol)
            .map(|(_, _, bytes)| bytes.as_slice())
    }

    pub fn artifacts(&self) -> impl Iterator<Item = (ExportForm, &str, &[u8])> {
        self.artifacts
            .iter()
            .map(|(form, symbol, bytes)| (*form, symbol.as_str(), bytes.as_slice()))
    }
}

impl OutputSink for MemorySink {
    fn write(&mut self, form: ExportForm, descriptor: &AssetDescriptor, bytes: &[u8]) -> Result<()> {
        if form.is_shared_stream() {
            self.shared.entry(form).or_default().extend_from_slice(bytes);
        } else {
            self.artifacts
                .push((form, descriptor.symbol.clone(), bytes.to_vec()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetFailure {
    pub symbol: String,
    pub kind: AssetKind,
    pub offset: u32,
    pub form: Option<ExportForm>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedExport {
    pub symbol: String,
    pub kind: AssetKind,
    pub form: ExportForm,
}

/// A merged array member that does not start where the previous one ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutGap {
    pub table: String,
    pub symbol: String,
    pub expected: u32,
    pub actual: u32,
}

/// Summary of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub seeded: usize,
    pub discovered: usize,
    pub parsed: usize,
    pub exported: usize,
    pub failures: Vec<AssetFailure>,
    pub skipped_exports: Vec<SkippedExport>,
    pub layout_gaps: Vec<LayoutGap>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.layout_gaps.is_empty()
    }

    #[cfg(feature = "json-report")]
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Rendered bytes of one export, not yet handed to the sink.
#[derive(Debug)]
pub(crate) enum Rendered {
    Output(Vec<u8>, ExportResult),
    Unsupported,
    Failed(Error),
}

#[derive(Debug, Default)]
struct TableProgress {
    next: Option<u32>,
    members: Vec<String>,
}

pub struct Driver {
    ctx: RunContext,
    dispatcher: Dispatcher,
    forms: Vec<ExportForm>,
    tables: FxHashMap<String, TableProgress>,
    report: RunReport,
}

impl Driver {
    pub fn new(ctx: RunContext, dispatcher: Dispatcher) -> Self {
        Self {
            ctx,
            dispatcher,
            forms: ExportForm::ALL.to_vec(),
            tables: FxHashMap::default(),
            report: RunReport::default(),
        }
    }

    /// Set up a run from a loaded configuration: declare its segments,
    /// register its tables and seed its assets.
    pub fn from_config(config: &ExtractionConfig, sources: SourceSet, dispatcher: Dispatcher) -> Result<Self> {
        let mut ctx = RunContext::with_options(sources, config.options.clone());
        for segment in &config.segments {
            ctx.declare_segment(
                segment.id,
                n64rip_rom::SourceId(segment.source),
                segment.base,
                segment.end,
            );
        }
        for table in &config.tables {
            ctx.register_search_table(table.clone())?;
        }

        let mut driver = Self::new(ctx, dispatcher);
        for entry in config.entries()? {
            driver.seed(entry);
        }
        Ok(driver)
    }

    /// Restrict the run to these output forms.
    pub fn with_forms(mut self, forms: impl IntoIterator<Item = ExportForm>) -> Self {
        self.forms = forms.into_iter().collect();
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut RunContext {
        &mut self.ctx
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Queue a configured asset.
    ///
    /// A segmented offset is resolved against the segments declared so far.
    /// If its segment is not declared yet the descriptor keeps the logical
    /// offset and waits in the queue until a parse declares it.
    pub fn seed(&mut self, entry: AssetEntry) -> bool {
        let pending = AssetDescriptor::new(entry.kind, entry.offset, entry.symbol)
            .with_source(entry.source)
            .with_attributes(entry.attributes);
        if is_segmented(entry.offset) && !self.ctx.segments.is_mapped(segment_number(entry.offset)) {
            debug!(
                symbol = %pending.symbol,
                address = format_args!("{:#010x}", entry.offset),
                "deferring resolution until segment is declared"
            );
            return self.seed_descriptor(pending);
        }
        match self.locate(pending) {
            Ok(descriptor) => self.seed_descriptor(descriptor),
            Err((descriptor, error)) => {
                self.fail(&descriptor, None, &error);
                false
            }
        }
    }

    pub fn seed_descriptor(&mut self, descriptor: AssetDescriptor) -> bool {
        let queued = self.ctx.submit(descriptor);
        if queued {
            self.report.seeded += 1;
        }
        queued
    }

    /// Process the whole queue.
    pub fn run(&mut self, sink: &mut dyn OutputSink) -> Result<RunReport> {
        self.run_with_progress(sink, |_, _| {})
    }

    /// Like [`Driver::run`], calling `progress(done, pending)` after each asset.
    pub fn run_with_progress<F>(&mut self, sink: &mut dyn OutputSink, mut progress: F) -> Result<RunReport>
    where
        F: FnMut(usize, usize),
    {
        let mut done = 0;
        while let Some((descriptor, asset)) = self.parse_next()? {
            for form in self.forms.clone() {
                let rendered = self.render(&descriptor, &asset, form);
                self.commit(sink, &descriptor, &asset, form, rendered)?;
            }
            done += 1;
            progress(done, self.ctx.queue.len());
        }
        self.finish(sink)
    }

    /// Parse queued descriptors until one succeeds or the queue is empty.
    ///
    /// Per-asset failures are recorded and skipped; only errors fatal to
    /// the run are returned.
    pub fn parse_next(&mut self) -> Result<Option<(AssetDescriptor, ParsedAsset)>> {
        while let Some(pending) = self.next_ready() {
            let deferred = is_segmented(pending.offset);
            let descriptor = match self.locate(pending) {
                Ok(descriptor) => descriptor,
                Err((descriptor, error)) => {
                    self.fail(&descriptor, None, &error);
                    continue;
                }
            };
            if deferred && !self.ctx.queue.claim(descriptor.kind, descriptor.offset) {
                debug!(
                    symbol = %descriptor.symbol,
                    offset = format_args!("{:#x}", descriptor.offset),
                    "resolved to an asset already seen, dropping"
                );
                continue;
            }
            match self.parse(&descriptor) {
                Ok(asset) => {
                    self.report.parsed += 1;
                    return Ok(Some((descriptor, asset)));
                }
                Err(error) if error.is_fatal_to_run() => return Err(error),
                Err(error) => self.fail(&descriptor, None, &error),
            }
        }
        Ok(None)
    }

    /// Parse everything, discoveries included, without exporting.
    pub fn parse_all(&mut self) -> Result<Vec<(AssetDescriptor, ParsedAsset)>> {
        let mut parsed = Vec::new();
        while let Some(entry) = self.parse_next()? {
            parsed.push(entry);
        }
        Ok(parsed)
    }

    fn next_ready(&mut self) -> Option<AssetDescriptor> {
        let RunContext { queue, segments, .. } = &mut self.ctx;
        queue.next_ready(|descriptor| segments_ready(segments, descriptor))
    }

    /// Replace a segmented offset with its source and absolute offset.
    fn locate(&self, descriptor: AssetDescriptor) -> std::result::Result<AssetDescriptor, (AssetDescriptor, Error)> {
        if !is_segmented(descriptor.offset) {
            return Ok(descriptor);
        }
        match self.ctx.resolve(descriptor.offset) {
            Ok(resolved) => {
                let mut located = descriptor.with_source(resolved.source);
                located.offset = resolved.offset;
                Ok(located)
            }
            Err(error) => Err((descriptor, error)),
        }
    }

    fn parse(&mut self, descriptor: &AssetDescriptor) -> Result<ParsedAsset> {
        let factory = self.dispatcher.factory(descriptor.kind)?;
        let size = factory.window_size(descriptor)?;
        let window = self.ctx.window(descriptor, size)?;
        let before = self.ctx.queue.submitted();
        let asset = factory.parse(&window, descriptor, &mut self.ctx)?;
        let discovered = self.ctx.queue.submitted() - before;
        self.report.discovered += discovered;
        debug!(
            symbol = %descriptor.symbol,
            kind = %descriptor.kind,
            offset = format_args!("{:#x}", descriptor.offset),
            discovered,
            "parsed asset"
        );
        Ok(asset)
    }

    /// Run one exporter into a buffer. Reads shared state only.
    pub(crate) fn render(&self, descriptor: &AssetDescriptor, asset: &ParsedAsset, form: ExportForm) -> Rendered {
        let exporter = match self.dispatcher.exporter(descriptor.kind, form) {
            Ok(exporter) => exporter,
            Err(_) => return Rendered::Unsupported,
        };
        let mut buffer = Vec::new();
        match exporter.export(&mut buffer, asset, descriptor, &self.ctx) {
            Ok(result) => Rendered::Output(buffer, result),
            Err(error) => Rendered::Failed(error),
        }
    }

    /// Hand a rendered export to the sink and track table layout.
    pub(crate) fn commit(
        &mut self,
        sink: &mut dyn OutputSink,
        descriptor: &AssetDescriptor,
        asset: &ParsedAsset,
        form: ExportForm,
        rendered: Rendered,
    ) -> Result<()> {
        let (bytes, result) = match rendered {
            Rendered::Output(bytes, result) => (bytes, result),
            Rendered::Unsupported => {
                if self.ctx.options.on_unsupported == UnsupportedPolicy::Abort {
                    return Err(Error::UnsupportedExport {
                        kind: descriptor.kind,
                        form,
                    });
                }
                debug!(symbol = %descriptor.symbol, %form, "no exporter, skipping");
                self.report.skipped_exports.push(SkippedExport {
                    symbol: descriptor.symbol.clone(),
                    kind: descriptor.kind,
                    form,
                });
                return Ok(());
            }
            Rendered::Failed(error) if error.is_fatal_to_run() => return Err(error),
            Rendered::Failed(error) => {
                self.fail(descriptor, Some(form), &error);
                return Ok(());
            }
        };

        sink.write(form, descriptor, &bytes)?;
        self.report.exported += 1;

        if form.is_shared_stream() {
            self.track_layout(sink, descriptor, asset, form, result)?;
        }
        Ok(())
    }

    fn track_layout(
        &mut self,
        sink: &mut dyn OutputSink,
        descriptor: &AssetDescriptor,
        asset: &ParsedAsset,
        form: ExportForm,
        result: ExportResult,
    ) -> Result<()> {
        let Some(placement) = self.ctx.search_table.placement(descriptor.kind, descriptor.offset) else {
            return Ok(());
        };
        let entry = placement.entry.clone();
        let state = placement.state;
        let progress = self.tables.entry(entry.name.clone()).or_default();

        if form == ExportForm::Code {
            if state.opens() {
                progress.next = None;
                progress.members.clear();
            }
            if let Some(expected) = progress.next {
                if expected != descriptor.offset {
                    warn!(
                        table = %entry.name,
                        symbol = %descriptor.symbol,
                        expected = format_args!("{expected:#x}"),
                        actual = format_args!("{:#x}", descriptor.offset),
                        "gap in table layout"
                    );
                    self.report.layout_gaps.push(LayoutGap {
                        table: entry.name.clone(),
                        symbol: descriptor.symbol.clone(),
                        expected,
                        actual: descriptor.offset,
                    });
                }
            }
            progress.next = result.successor();
            progress.members.push(asset.pointer_to(&descriptor.symbol));
        }

        if entry.mode == MergeMode::Reference && state.closes() {
            let mut out = Vec::new();
            match form {
                ExportForm::Header => writeln!(out, "extern {}* {}[];", asset.c_type(), entry.name)?,
                _ => {
                    writeln!(out, "{}* {}[] = {{", asset.c_type(), entry.name)?;
                    for member in &progress.members {
                        writeln!(out, "{}{member},", crate::formats::TAB)?;
                    }
                    writeln!(out, "}};\n")?;
                }
            }
            sink.write(form, descriptor, &out)?;
        }
        Ok(())
    }

    fn fail(&mut self, descriptor: &AssetDescriptor, form: Option<ExportForm>, error: &Error) {
        warn!(
            symbol = %descriptor.symbol,
            kind = %descriptor.kind,
            offset = format_args!("{:#x}", descriptor.offset),
            form = form.map(|f| f.as_str()).unwrap_or("parse"),
            %error,
            "asset failed"
        );
        self.report.failures.push(AssetFailure {
            symbol: descriptor.symbol.clone(),
            kind: descriptor.kind,
            offset: descriptor.offset,
            form,
            error: error.to_string(),
        });
    }

    #[cfg(feature = "parallel")]
    pub(crate) fn forms(&self) -> &[ExportForm] {
        &self.forms
    }

    pub(crate) fn finish(&mut self, sink: &mut dyn OutputSink) -> Result<RunReport> {
        sink.finish()?;
        let pending = self.ctx.queue.len();
        if pending > 0 {
            warn!(pending, "assets left in queue");
        }
        info!(
            parsed = self.report.parsed,
            discovered = self.report.discovered,
            failed = self.report.failures.len(),
            skipped = self.report.skipped_exports.len(),
            "extraction finished"
        );
        Ok(std::mem::take(&mut self.report))
    }
}

/// Rebuild the binary resource of an asset from its modding document.
pub fn import(dispatcher: &Dispatcher, kind: AssetKind, document: &[u8], out: &mut dyn Write) -> Result<String> {
    let (symbol, asset) = dispatcher.factory(kind)?.parse_modding(document)?;
    let exporter = dispatcher.exporter(kind, ExportForm::Binary)?;
    let descriptor = AssetDescriptor::new(kind, 0, symbol.clone());
    let ctx = RunContext::new(SourceSet::new());
    exporter.export(out, &asset, &descriptor, &ctx)?;
    Ok(symbol)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{Attributes, SearchTableEntry};

    fn driver(rom: Vec<u8>) -> Driver {
        let mut sources = SourceSet::new();
        sources.add_bytes("rom", rom);
        Driver::new(RunContext::new(sources), Dispatcher::with_builtin())
    }

    fn blob(offset: u32, size: u32, symbol: &str) -> AssetDescriptor {
        AssetDescriptor::new(AssetKind::Blob, offset, symbol)
            .with_attributes(Attributes::new().with("size", size))
    }

    #[test]
    fn test_failure_does_not_stop_run() {
        let mut driver = driver(vec![0xAB; 16]);
        driver.seed_descriptor(blob(0x0, 4, "ok_a"));
        driver.seed_descriptor(blob(0xC, 8, "too_long"));
        driver.seed_descriptor(blob(0x4, 4, "ok_b"));

        let mut sink = MemorySink::new();
        let report = driver.run(&mut sink).unwrap();

        assert_eq!(report.parsed, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].symbol, "too_long");
        assert_eq!(report.failures[0].form, None);
        assert!(sink.text(ExportForm::Header).contains("extern u8 ok_b[];"));
        assert!(sink.artifact(ExportForm::Binary, "ok_a").is_some());
    }

    #[cfg(feature = "json-report")]
    #[test]
    fn test_report_json() {
        let mut driver = driver(vec![0; 8]);
        driver.seed_descriptor(blob(0, 4, "b"));
        let report = driver.run(&mut MemorySink::new()).unwrap();

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["parsed"], 1);
        assert_eq!(json["skipped_exports"][0]["form"], "modding");
        assert_eq!(json["skipped_exports"][0]["kind"], "BLOB");
    }

    #[test]
    fn test_unsupported_policy() {
        let mut skip = driver(vec![0; 16]).with_forms([ExportForm::Modding]);
        skip.seed_descriptor(blob(0, 4, "b"));
        let report = skip.run(&mut MemorySink::new()).unwrap();
        assert_eq!(report.skipped_exports.len(), 1);
        assert_eq!(report.skipped_exports[0].form, ExportForm::Modding);

        let mut abort = driver(vec![0; 16]).with_forms([ExportForm::Modding]);
        abort.context_mut().options.on_unsupported = UnsupportedPolicy::Abort;
        abort.seed_descriptor(blob(0, 4, "b"));
        assert!(matches!(
            abort.run(&mut MemorySink::new()),
            Err(Error::UnsupportedExport {
                kind: AssetKind::Blob,
                form: ExportForm::Modding
            })
        ));
    }

    #[test]
    fn test_layout_gap_and_reference_table() {
        let mut driver = driver(vec![0; 32]).with_forms([ExportForm::Header, ExportForm::Code]);
        driver
            .context_mut()
            .register_search_table(SearchTableEntry::new("gBlobs", 0, 12).with_mode(MergeMode::Reference))
            .unwrap();
        driver.seed_descriptor(blob(0, 4, "first"));
        driver.seed_descriptor(blob(8, 4, "second"));
        driver.seed_descriptor(blob(12, 4, "third"));

        let mut sink = MemorySink::new();
        let report = driver.run(&mut sink).unwrap();

        assert_eq!(
            report.layout_gaps,
            vec![LayoutGap {
                table: "gBlobs".to_string(),
                symbol: "second".to_string(),
                expected: 4,
                actual: 8,
            }]
        );

        let code = sink.text(ExportForm::Code);
        assert!(code.ends_with("u8* gBlobs[] = {\n    first,\n    second,\n    third,\n};\n\n"));
        assert!(sink.text(ExportForm::Header).ends_with("extern u8* gBlobs[];\n"));
    }

    #[test]
    fn test_seed_resolves_segments() {
        let mut driver = driver(vec![0; 0x40]);
        driver
            .context_mut()
            .declare_segment(6, n64rip_rom::SourceId::MAIN, 0x20, 0x40);

        let entry = AssetEntry {
            kind: AssetKind::Blob,
            source: n64rip_rom::SourceId::MAIN,
            offset: 0x0600_0004,
            symbol: "seg".to_string(),
            attributes: Attributes::new().with("size", 4),
        };
        assert!(driver.seed(entry.clone()));
        assert!(driver.context().queue.contains(AssetKind::Blob, 0x24));

        // Segment 7 is never declared: the entry waits, then fails alone.
        let unmapped = AssetEntry {
            offset: 0x0700_0000,
            symbol: "late".to_string(),
            ..entry
        };
        assert!(driver.seed(unmapped));
        assert!(driver.context().queue.contains(AssetKind::Blob, 0x0700_0000));

        let report = driver.run(&mut MemorySink::new()).unwrap();
        assert_eq!(report.parsed, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].symbol, "late");
    }

    #[test]
    fn test_import_writes_binary() {
        let dispatcher = Dispatcher::with_builtin();
        let doc = b"gDemo:\n  ControllerInputs:\n  - StickX: 1\n    StickY: -1\n    Buttons: 4\n    Frames: 2\n    Flag: 0\n";
        let mut out = Vec::new();
        let symbol = import(&dispatcher, AssetKind::Bk64DemoInput, doc, &mut out).unwrap();

        assert_eq!(symbol, "gDemo");
        assert_eq!(out.len(), 8 + 4 + 6);

        assert!(matches!(
            import(&dispatcher, AssetKind::Blob, doc, &mut Vec::new()),
            Err(Error::UnsupportedExport { .. })
        ));
    }
}
