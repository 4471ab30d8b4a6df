//! n64rip - N64 ROM asset extraction library.
//!
//! This crate provides a unified interface to the n64rip crates.
//!
//! # Crates
//!
//! - [`n64rip_common`] - Binary reading and writing, packed bitfields, resource envelopes
//! - [`n64rip_rom`] - ROM images, segment resolution, decompression cache
//! - [`n64rip_assets`] - Work queue, search tables, factories, exporters and the run driver
//!
//! # Example
//!
//! ```no_run
//! use n64rip::prelude::*;
//!
//! let config = ExtractionConfig::from_path("assets.yaml")?;
//! let mut sources = SourceSet::new();
//! sources.add_file("baserom.z64")?;
//!
//! let mut driver = Driver::from_config(&config, sources, Dispatcher::with_builtin())?;
//! let mut sink = MemorySink::new();
//! let report = driver.run(&mut sink)?;
//! println!("Parsed {} assets", report.parsed);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use n64rip_assets as assets;
pub use n64rip_common as common;
pub use n64rip_rom as rom;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use n64rip_assets::{
        AssetDescriptor, AssetKind, Dispatcher, Driver, ExportForm, ExtractionConfig, MemorySink,
        OutputSink, RunContext, RunReport,
    };
    pub use n64rip_common::{BinaryReader, BinaryWriter, ResourceHeader, ResourceType};
    pub use n64rip_rom::{SegmentTable, SourceId, SourceSet};
}

// Re-export commonly used types at the crate root
pub use n64rip_assets::{Driver, ExtractionConfig};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
