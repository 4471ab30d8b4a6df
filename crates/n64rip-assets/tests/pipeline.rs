//! End-to-end runs over small in-memory ROMs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use n64rip_assets::{
    import, AssetDescriptor, AssetEntry, AssetKind, Attributes, Dispatcher, Driver, Error, ExportForm,
    ExtractionConfig, Factory, MemorySink, ParsedAsset, Result, RunContext, SearchTableEntry,
};
use n64rip_assets::formats::{Blob, BlobFactory};
use n64rip_common::{ResourceHeader, ResourceType};
use n64rip_rom::{DecodeError, SourceId, SourceImage, SourceSet};
use pretty_assertions::assert_eq;

fn vertex(x: i16) -> [u8; 16] {
    let mut raw = [0u8; 16];
    raw[0..2].copy_from_slice(&x.to_be_bytes());
    raw[12..16].copy_from_slice(&[0xFF, 0x80, 0x00, 0xFF]);
    raw
}

fn sources(rom: Vec<u8>) -> SourceSet {
    let mut sources = SourceSet::new();
    sources.add_bytes("rom", rom);
    sources
}

fn three_vertices() -> Vec<u8> {
    [vertex(1), vertex(2), vertex(3)].concat()
}

#[test]
fn test_three_vertices_merge_into_one_array() {
    let config = ExtractionConfig::from_yaml_str(
        r#"
tables:
  - { name: gVtxTable, kind: VTX, start: 0, end: 32 }
assets:
  vtx_a: { type: VTX, offset: 0, count: 1 }
  vtx_b: { type: VTX, offset: 16, count: 1 }
  vtx_c: { type: VTX, offset: 32, count: 1 }
"#,
    )
    .unwrap();
    let mut driver = Driver::from_config(&config, sources(three_vertices()), Dispatcher::with_builtin())
        .unwrap()
        .with_forms([ExportForm::Header, ExportForm::Code]);

    let mut sink = MemorySink::new();
    let report = driver.run(&mut sink).unwrap();
    assert!(report.is_clean());

    let code = sink.text(ExportForm::Code);
    assert_eq!(code.matches("Vtx gVtxTable[][1] = {").count(), 1);
    assert_eq!(code.matches("{{{").count(), 3);
    assert!(code.ends_with("    },\n};\n\n"));
    assert!(!code.contains("vtx_b"));

    assert_eq!(sink.text(ExportForm::Header), "extern Vtx gVtxTable[][1];\n");
}

#[test]
fn test_duplicate_descriptors_parse_once() {
    let mut driver = Driver::new(RunContext::new(sources(three_vertices())), Dispatcher::with_builtin());
    let attrs = Attributes::new().with("count", 1);
    assert!(driver.seed_descriptor(AssetDescriptor::new(AssetKind::Vertex, 16, "first").with_attributes(attrs.clone())));
    assert!(!driver.seed_descriptor(AssetDescriptor::new(AssetKind::Vertex, 16, "second").with_attributes(attrs)));

    let mut sink = MemorySink::new();
    let report = driver.run(&mut sink).unwrap();
    assert_eq!(report.parsed, 1);
    assert!(sink.artifact(ExportForm::Binary, "first").is_some());
    assert!(sink.artifact(ExportForm::Binary, "second").is_none());
}

#[test]
fn test_decoded_window_is_cached() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut ctx = RunContext::new(sources((0..64u8).collect()));
    ctx.register_decoder("test", move |image: &SourceImage, start: u32, end: u32| -> std::result::Result<Vec<u8>, DecodeError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(image.bytes()[start as usize..end as usize].to_vec())
    });

    let whole = ctx.fetch(SourceId::MAIN, 0, 32, "test").unwrap();
    let inner = ctx.fetch(SourceId::MAIN, 8, 16, "test").unwrap();
    let again = ctx.fetch(SourceId::MAIN, 0, 32, "test").unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(&inner[..], &whole[8..16]);
    assert_eq!(again, whole);
}

/// Declares segment 6 over the second half of the ROM when parsed.
struct SegmentLoader;

impl Factory for SegmentLoader {
    fn kind(&self) -> AssetKind {
        AssetKind::Blob
    }

    fn window_size(&self, _descriptor: &AssetDescriptor) -> Result<Option<u32>> {
        Ok(Some(4))
    }

    fn parse(&self, window: &[u8], _descriptor: &AssetDescriptor, ctx: &mut RunContext) -> Result<ParsedAsset> {
        ctx.declare_segment(6, SourceId::MAIN, 0x20, 0x40);
        Ok(ParsedAsset::Blob(Blob { data: window.to_vec() }))
    }

    fn exporters(&self) -> Vec<(ExportForm, Box<dyn n64rip_assets::Exporter>)> {
        BlobFactory.exporters()
    }
}

#[test]
fn test_segment_dependency_defers_asset() {
    let mut dispatcher = Dispatcher::with_builtin();
    dispatcher.register_factory(SegmentLoader);
    let mut driver = Driver::new(RunContext::new(sources(vec![0; 0x40])), dispatcher)
        .with_forms([ExportForm::Header]);

    driver.seed_descriptor(
        AssetDescriptor::new(AssetKind::Vertex, 0x20, "needs_segment")
            .with_attributes(Attributes::new().with("count", 1).with("requires_segments", 6)),
    );
    driver.seed_descriptor(AssetDescriptor::new(AssetKind::Blob, 0, "loader"));

    let mut sink = MemorySink::new();
    let report = driver.run(&mut sink).unwrap();

    assert_eq!(report.parsed, 2);
    assert_eq!(
        sink.text(ExportForm::Header),
        "extern u8 loader[];\nextern Vtx needs_segment[];\n"
    );
}

#[test]
fn test_deferred_seed_resolving_to_seen_asset_is_dropped() {
    let mut dispatcher = Dispatcher::with_builtin();
    dispatcher.register_factory(SegmentLoader);
    let mut driver = Driver::new(RunContext::new(sources(vec![0; 0x40])), dispatcher)
        .with_forms([ExportForm::Header]);

    let vertex = |offset: u32, symbol: &str| AssetEntry {
        kind: AssetKind::Vertex,
        source: SourceId::MAIN,
        offset,
        symbol: symbol.to_string(),
        attributes: Attributes::new().with("count", 1),
    };
    driver.seed_descriptor(AssetDescriptor::new(AssetKind::Blob, 0, "loader"));
    assert!(driver.seed(vertex(0x20, "absolute")));
    // Segment 6 maps 0x20.. once the loader has been parsed.
    assert!(driver.seed(vertex(0x0600_0000, "segmented")));

    let mut sink = MemorySink::new();
    let report = driver.run(&mut sink).unwrap();

    assert_eq!(report.parsed, 2);
    assert!(report.failures.is_empty());
    assert_eq!(
        sink.text(ExportForm::Header),
        "extern u8 loader[];\nextern Vtx absolute[];\n"
    );
}

fn invert(image: &SourceImage, start: u32, end: u32) -> std::result::Result<Vec<u8>, DecodeError> {
    Ok(image.bytes()[start as usize..end as usize].iter().map(|b| !b).collect())
}

#[test]
fn test_uncompressed_window_does_not_serve_compressed_request() {
    let mut ctx = RunContext::new(sources(vec![0x11; 0x40]));
    ctx.register_decoder("invert", invert);

    let raw = ctx.fetch(SourceId::MAIN, 0, 0x40, "none").unwrap();
    let decoded = ctx.fetch(SourceId::MAIN, 0x10, 0x14, "invert").unwrap();
    assert_eq!(&raw[0x10..0x14], &[0x11; 4]);
    assert_eq!(&decoded[..], &[0xEE; 4]);

    // Same through the driver: a model window runs to the end of the ROM.
    let mut rom = model_rom();
    rom.extend([0x11; 4]);
    let mut driver = Driver::new(RunContext::new(sources(rom)), Dispatcher::with_builtin())
        .with_forms([ExportForm::Binary]);
    driver.context_mut().register_decoder("invert", invert);
    driver.seed_descriptor(AssetDescriptor::new(AssetKind::Bk64Model, 0x100, "gModel"));
    driver.seed_descriptor(
        AssetDescriptor::new(AssetKind::Blob, 0x200, "gPacked")
            .with_attributes(Attributes::new().with("size", 4).with("compression", "invert")),
    );

    let mut sink = MemorySink::new();
    let report = driver.run(&mut sink).unwrap();
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    let binary = sink.artifact(ExportForm::Binary, "gPacked").unwrap();
    assert!(binary.ends_with(&[0xEE; 4]));
}

#[test]
fn test_decode_error_fails_one_asset() {
    let mut driver = Driver::new(RunContext::new(sources(vec![0x5A; 0x20])), Dispatcher::with_builtin())
        .with_forms([ExportForm::Binary]);
    driver.context_mut().register_decoder(
        "broken",
        |_: &SourceImage, _: u32, _: u32| -> std::result::Result<Vec<u8>, DecodeError> {
            Err(DecodeError::Malformed("bad header".into()))
        },
    );
    driver.seed_descriptor(
        AssetDescriptor::new(AssetKind::Blob, 0, "gBroken")
            .with_attributes(Attributes::new().with("size", 8).with("compression", "broken")),
    );
    driver.seed_descriptor(
        AssetDescriptor::new(AssetKind::Blob, 0x10, "gFine").with_attributes(Attributes::new().with("size", 4)),
    );

    let mut sink = MemorySink::new();
    let report = driver.run(&mut sink).unwrap();

    assert_eq!(report.parsed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].symbol, "gBroken");
    assert!(report.failures[0].error.contains("bad header"));
    assert!(sink.artifact(ExportForm::Binary, "gBroken").is_none());
    assert!(sink.artifact(ExportForm::Binary, "gFine").unwrap().ends_with(&[0x5A; 4]));
}

#[test]
fn test_malformed_model_fails_alone() {
    let mut rom = model_rom();
    rom[0x140..0x144].copy_from_slice(&0xFFFF_FFF0u32.to_be_bytes());
    let mut driver = Driver::new(RunContext::new(sources(rom)), Dispatcher::with_builtin())
        .with_forms([ExportForm::Binary]);
    driver.seed_descriptor(AssetDescriptor::new(AssetKind::Bk64Model, 0x100, "gModel"));
    driver.seed_descriptor(
        AssetDescriptor::new(AssetKind::Blob, 0x10, "gFine").with_attributes(Attributes::new().with("size", 4)),
    );

    let mut sink = MemorySink::new();
    let report = driver.run(&mut sink).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].symbol, "gModel");
    assert!(sink.artifact(ExportForm::Binary, "gFine").is_some());
}

#[test]
fn test_unmapped_segment_fails_one_asset() {
    // SF64 animation header whose key and data pointers are in segment 6.
    let mut rom = vec![0u8; 0x20];
    rom[0..2].copy_from_slice(&1u16.to_be_bytes());
    rom[4..8].copy_from_slice(&0x0600_0000u32.to_be_bytes());
    rom[8..12].copy_from_slice(&0x0600_0010u32.to_be_bytes());

    let mut driver = Driver::new(RunContext::new(sources(rom)), Dispatcher::with_builtin());
    driver.seed_descriptor(AssetDescriptor::new(AssetKind::Sf64Animation, 0, "anim"));
    driver.seed_descriptor(
        AssetDescriptor::new(AssetKind::Blob, 0x10, "fine").with_attributes(Attributes::new().with("size", 4)),
    );

    let report = driver.run(&mut MemorySink::new()).unwrap();
    assert_eq!(report.parsed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].symbol, "anim");
    assert!(report.failures[0].error.contains("segment"));
}

fn mixed_rom() -> (Vec<u8>, &'static str) {
    let mut rom = vec![0u8; 0x100];
    rom[0x00..0x10].copy_from_slice(&vertex(7));
    // BK64 animation: frames 1..2, one element with one key.
    rom[0x40..0x50].copy_from_slice(&[
        0x00, 0x01, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x01, 0x00, 0x01, 0x00, 0x05,
    ]);
    // BK64 demo input: one record.
    rom[0x60..0x6A].copy_from_slice(&[0x00, 0x00, 0x00, 0x06, 0x01, 0x02, 0x00, 0x10, 0x04, 0x00]);
    for (i, b) in rom[0x80..0xA0].iter_mut().enumerate() {
        *b = i as u8;
    }
    let config = r#"
assets:
  gVtx: { type: VTX, offset: 0x0, count: 1 }
  gAnim: { type: "BK64:ANIM", offset: 0x40 }
  gDemo: { type: "BK64:DEMO_INPUT", offset: 0x60 }
  gTex: { type: TEXTURE, offset: 0x80, format: I8, width: 4, height: 4 }
  gBlob: { type: BLOB, offset: 0x90, size: 16 }
"#;
    (rom, config)
}

#[test]
fn test_binary_envelopes() {
    let (rom, config) = mixed_rom();
    let config = ExtractionConfig::from_yaml_str(config).unwrap();
    let mut driver = Driver::from_config(&config, sources(rom), Dispatcher::with_builtin())
        .unwrap()
        .with_forms([ExportForm::Binary]);

    let mut sink = MemorySink::new();
    let report = driver.run(&mut sink).unwrap();
    assert!(report.failures.is_empty(), "{:?}", report.failures);

    let expected = [
        ("gVtx", ResourceType::Vertex),
        ("gAnim", ResourceType::BkAnimation),
        ("gDemo", ResourceType::BkDemoInput),
        ("gTex", ResourceType::Texture),
        ("gBlob", ResourceType::Blob),
    ];
    for (symbol, kind) in expected {
        let bytes = sink.artifact(ExportForm::Binary, symbol).unwrap();
        let header = ResourceHeader::parse(bytes).unwrap();
        assert_eq!(header.kind, kind, "{symbol}");
        assert_eq!(header.version, 0);
    }
}

#[test]
fn test_modding_documents_import_to_same_binary() {
    let (rom, config) = mixed_rom();
    let config = ExtractionConfig::from_yaml_str(config).unwrap();
    let dispatcher = Dispatcher::with_builtin();
    let mut driver = Driver::from_config(&config, sources(rom), Dispatcher::with_builtin())
        .unwrap()
        .with_forms([ExportForm::Binary, ExportForm::Modding]);

    let mut sink = MemorySink::new();
    let report = driver.run(&mut sink).unwrap();

    // Textures and blobs have no modding form.
    assert_eq!(report.skipped_exports.len(), 2);

    for (symbol, kind) in [
        ("gVtx", AssetKind::Vertex),
        ("gAnim", AssetKind::Bk64Animation),
        ("gDemo", AssetKind::Bk64DemoInput),
    ] {
        let document = sink.artifact(ExportForm::Modding, symbol).unwrap();
        let mut rebuilt = Vec::new();
        let name = import(&dispatcher, kind, document, &mut rebuilt).unwrap();
        assert_eq!(name, symbol);
        assert_eq!(rebuilt, sink.artifact(ExportForm::Binary, symbol).unwrap());
    }
}

#[test]
fn test_overlapping_tables_are_rejected() {
    let mut ctx = RunContext::new(SourceSet::new());
    ctx.register_search_table(SearchTableEntry::new("a", 0, 0x20).with_kind(AssetKind::Vertex))
        .unwrap();
    assert!(matches!(
        ctx.register_search_table(SearchTableEntry::new("b", 0x10, 0x30).with_kind(AssetKind::Vertex)),
        Err(Error::InvalidSearchTable { .. })
    ));
    ctx.register_search_table(SearchTableEntry::new("c", 0x10, 0x30).with_kind(AssetKind::Blob))
        .unwrap();
}

/// ROM with an SF64 animation at 0x0 (data and keys in segment 6) and a
/// BK64 model at 0x100 holding one CI4 texture and two vertices.
fn model_rom() -> Vec<u8> {
    let mut rom = vec![0u8; 0x200];
    rom[0x00..0x0C].copy_from_slice(&[
        0x00, 0x01, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00, 0x06, 0x00, 0x00, 0x10,
    ]);

    let model = &mut rom[0x100..];
    model[0x00..0x04].copy_from_slice(&0xBu32.to_be_bytes());
    model[0x08..0x0A].copy_from_slice(&0x40u16.to_be_bytes());
    model[0x10..0x14].copy_from_slice(&0x80u32.to_be_bytes());
    model[0x40..0x44].copy_from_slice(&0x30u32.to_be_bytes());
    model[0x44..0x46].copy_from_slice(&1u16.to_be_bytes());
    model[0x4C..0x4E].copy_from_slice(&1u16.to_be_bytes());
    model[0x50] = 4;
    model[0x51] = 8;
    model[0x94..0x96].copy_from_slice(&2u16.to_be_bytes());
    rom
}

#[test]
fn test_model_discovery_and_remaining_envelopes() {
    let config = ExtractionConfig::from_yaml_str(
        r#"
segments:
  - { id: 6, base: 0x20, end: 0x60 }
assets:
  gAnim: { type: "SF64:ANIM", offset: 0x0 }
  gModel: { type: "BK64:MODEL", offset: 0x100 }
"#,
    )
    .unwrap();
    let mut driver = Driver::from_config(&config, sources(model_rom()), Dispatcher::with_builtin())
        .unwrap()
        .with_forms([ExportForm::Binary]);

    let mut sink = MemorySink::new();
    let report = driver.run(&mut sink).unwrap();

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.seeded, 2);
    assert_eq!(report.discovered, 3);
    assert_eq!(report.parsed, 5);

    for (symbol, kind) in [
        ("gAnim", ResourceType::Animation),
        ("gModel", ResourceType::BkModel),
        ("gModel_TLUT_0", ResourceType::Texture),
        ("gModel_TEX_0", ResourceType::Texture),
        ("gModel_VTX", ResourceType::Vertex),
    ] {
        let bytes = sink.artifact(ExportForm::Binary, symbol).unwrap();
        assert_eq!(ResourceHeader::parse(bytes).unwrap().kind, kind, "{symbol}");
    }
}
