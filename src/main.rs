//! n64rip CLI - Command-line tool for N64 ROM asset extraction.
//!
//! This is the main entry point for the n64rip command-line application.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use n64rip::assets::{import, parse_u32};
use n64rip::prelude::*;

/// n64rip - N64 ROM asset extraction tool
#[derive(Parser)]
#[command(name = "n64rip")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the assets listed in a configuration file
    Extract {
        /// YAML run configuration
        #[arg(short, long)]
        config: PathBuf,

        /// ROM image (.z64, .v64 or .n64)
        #[arg(short, long, env = "N64RIP_ROM")]
        rom: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Output forms to write (default: all)
        #[arg(short, long, value_delimiter = ',')]
        form: Vec<ExportForm>,

        /// Write the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// Render exports on all cores after parsing
        #[arg(long)]
        parallel: bool,
    },

    /// Rebuild a binary resource from a modding document
    Import {
        /// Asset kind, e.g. VTX or BK64:ANIM
        #[arg(short, long)]
        kind: AssetKind,

        /// Modding document
        #[arg(short, long)]
        input: PathBuf,

        /// Output binary resource
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Hex dump ROM bytes at a (possibly segmented) address
    Inspect {
        /// ROM image
        #[arg(short, long, env = "N64RIP_ROM")]
        rom: PathBuf,

        /// Address, decimal or 0x-prefixed hex
        #[arg(long, value_parser = parse_address)]
        offset: u32,

        /// Number of bytes
        #[arg(short, long, default_value_t = 0x40)]
        length: u32,

        /// Configuration whose segments resolve the address
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Extract {
            config,
            rom,
            output,
            form,
            report,
            parallel,
        } => {
            cmd_extract(&config, &rom, &output, &form, report.as_deref(), parallel)?;
        }
        Commands::Import { kind, input, output } => {
            cmd_import(kind, &input, &output)?;
        }
        Commands::Inspect {
            rom,
            offset,
            length,
            config,
        } => {
            cmd_inspect(&rom, offset, length, config.as_deref())?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn parse_address(text: &str) -> std::result::Result<u32, String> {
    parse_u32(text).ok_or_else(|| format!("invalid address `{text}`"))
}

fn cmd_extract(
    config_path: &Path,
    rom: &Path,
    output: &Path,
    forms: &[ExportForm],
    report_path: Option<&Path>,
    parallel: bool,
) -> Result<()> {
    println!("Loading configuration: {}", config_path.display());
    let config = ExtractionConfig::from_path(config_path).context("Failed to load configuration")?;

    let mut sources = SourceSet::new();
    sources.add_file(rom).context("Failed to open ROM")?;

    let mut driver = Driver::from_config(&config, sources, Dispatcher::with_builtin())
        .context("Failed to set up extraction run")?;
    if !forms.is_empty() {
        driver = driver.with_forms(forms.iter().copied());
    }

    fs::create_dir_all(output)?;
    let mut sink = DirectorySink::new(output);

    let start = Instant::now();
    let report = if parallel {
        driver.run_parallel(&mut sink)?
    } else {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                .progress_chars("#>-"),
        );
        let report = driver.run_with_progress(&mut sink, |done, pending| {
            pb.set_length((done + pending) as u64);
            pb.set_position(done as u64);
        })?;
        pb.finish_with_message("Done");
        report
    };

    println!(
        "Extracted {} assets ({} discovered) in {:?}",
        report.parsed,
        report.discovered,
        start.elapsed()
    );
    if !report.failures.is_empty() {
        println!("Failed: {} assets", report.failures.len());
        for failure in &report.failures {
            println!("  {} ({} at {:#x}): {}", failure.symbol, failure.kind, failure.offset, failure.error);
        }
    }
    for gap in &report.layout_gaps {
        println!(
            "Layout gap in {}: {} at {:#x}, expected {:#x}",
            gap.table, gap.symbol, gap.actual, gap.expected
        );
    }

    if let Some(path) = report_path {
        let file = File::create(path).context("Failed to create report file")?;
        serde_json::to_writer_pretty(BufWriter::new(file), &report).context("Failed to write report")?;
    }

    Ok(())
}

fn cmd_import(kind: AssetKind, input: &Path, output: &Path) -> Result<()> {
    println!("Importing: {} -> {}", input.display(), output.display());

    let document = fs::read(input).context("Failed to read modding document")?;
    let mut out = Vec::new();
    let symbol = import(&Dispatcher::with_builtin(), kind, &document, &mut out)
        .with_context(|| format!("Failed to import {kind} document"))?;
    fs::write(output, out).context("Failed to write output file")?;

    println!("Imported {symbol}");

    Ok(())
}

fn cmd_inspect(rom: &Path, offset: u32, length: u32, config_path: Option<&Path>) -> Result<()> {
    let mut sources = SourceSet::new();
    sources.add_file(rom).context("Failed to open ROM")?;

    let mut ctx = RunContext::new(sources);
    if let Some(path) = config_path {
        let config = ExtractionConfig::from_path(path).context("Failed to load configuration")?;
        for segment in &config.segments {
            ctx.declare_segment(segment.id, SourceId(segment.source), segment.base, segment.end);
        }
    }

    let resolved = ctx.resolve(offset).context("Failed to resolve address")?;
    let bytes = ctx
        .read(offset, length, "none")
        .context("Failed to read ROM bytes")?;

    println!("{offset:#010x} -> source {} offset {:#x}", resolved.source.0, resolved.offset);
    for (i, line) in bytes.chunks(16).enumerate() {
        let hex: Vec<String> = line.iter().map(|b| format!("{b:02X}")).collect();
        println!("{:08X}  {}", resolved.offset as usize + i * 16, hex.join(" "));
    }

    Ok(())
}

/// Writes shared header/code streams and one file per binary or modding artifact.
struct DirectorySink {
    root: PathBuf,
    header: Option<BufWriter<File>>,
    code: Option<BufWriter<File>>,
}

impl DirectorySink {
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            header: None,
            code: None,
        }
    }

    fn shared(&mut self, form: ExportForm) -> std::io::Result<&mut BufWriter<File>> {
        let (slot, name) = match form {
            ExportForm::Header => (&mut self.header, "assets.h"),
            _ => (&mut self.code, "assets.c"),
        };
        if slot.is_none() {
            *slot = Some(BufWriter::new(File::create(self.root.join(name))?));
        }
        slot.as_mut()
            .ok_or_else(|| std::io::Error::other("stream not open"))
    }

    fn artifact_path(&self, form: ExportForm, symbol: &str) -> PathBuf {
        match form {
            ExportForm::Modding => self.root.join("modding").join(format!("{symbol}.yaml")),
            _ => self.root.join("bin").join(format!("{symbol}.bin")),
        }
    }
}

impl OutputSink for DirectorySink {
    fn write(&mut self, form: ExportForm, descriptor: &AssetDescriptor, bytes: &[u8]) -> n64rip::assets::Result<()> {
        let result = if form.is_shared_stream() {
            self.shared(form).and_then(|stream| stream.write_all(bytes))
        } else {
            let path = self.artifact_path(form, &descriptor.symbol);
            path.parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|()| fs::write(&path, bytes))
        };
        result.map_err(n64rip::assets::Error::Sink)
    }

    fn finish(&mut self) -> n64rip::assets::Result<()> {
        for stream in [&mut self.header, &mut self.code].into_iter().flatten() {
            stream.flush().map_err(n64rip::assets::Error::Sink)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_sink_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path());
        let desc = AssetDescriptor::new(AssetKind::Blob, 0, "gBlob");

        sink.write(ExportForm::Header, &desc, b"extern u8 gBlob[];\n").unwrap();
        sink.write(ExportForm::Header, &desc, b"extern u8 gOther[];\n").unwrap();
        sink.write(ExportForm::Binary, &desc, &[1, 2, 3]).unwrap();
        sink.finish().unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("assets.h")).unwrap(),
            "extern u8 gBlob[];\nextern u8 gOther[];\n"
        );
        assert_eq!(fs::read(dir.path().join("bin/gBlob.bin")).unwrap(), vec![1, 2, 3]);
        assert!(!dir.path().join("assets.c").exists());
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x06000010"), Ok(0x0600_0010));
        assert_eq!(parse_address("16"), Ok(16));
        assert!(parse_address("zz").is_err());
    }
}
