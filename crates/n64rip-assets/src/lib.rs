//! Asset extraction for n64rip.
//!
//! This crate drives an extraction run over one or more ROM images:
//!
//! - [`WorkQueue`] - Deduplicated FIFO of [`AssetDescriptor`]s, fed by the
//!   configuration and by parsers that discover child assets
//! - [`SearchTable`] - Address ranges whose assets are emitted as one C array
//! - [`Dispatcher`] - One [`Factory`] per kind and one [`Exporter`] per
//!   `(kind, form)` pair
//! - [`Driver`] - Parses every queued asset and writes header, code,
//!   binary and modding output through an [`OutputSink`]
//!
//! Built-in formats live in [`formats`].
//!
//! # Example
//!
//! ```
//! use n64rip_assets::{Dispatcher, Driver, ExportForm, ExtractionConfig, MemorySink};
//! use n64rip_rom::SourceSet;
//!
//! let config = ExtractionConfig::from_yaml_str(
//!     "assets:\n  gBlob: { type: BLOB, offset: 0x4, size: 4 }\n",
//! )?;
//! let mut sources = SourceSet::new();
//! sources.add_bytes("rom", (0..16u8).collect());
//!
//! let mut driver = Driver::from_config(&config, sources, Dispatcher::with_builtin())?;
//! let mut sink = MemorySink::new();
//! let report = driver.run(&mut sink)?;
//!
//! assert_eq!(report.parsed, 1);
//! assert!(sink.text(ExportForm::Code).contains("u8 gBlob[]"));
//! # Ok::<(), n64rip_assets::Error>(())
//! ```

mod asset;
mod attributes;
mod config;
mod context;
mod descriptor;
mod dispatch;
mod driver;
mod error;
pub mod formats;
mod kind;
pub mod modding;
#[cfg(feature = "parallel")]
mod parallel;
mod queue;
pub mod search_table;

pub use asset::ParsedAsset;
pub use attributes::{parse_u32, Attributes};
pub use config::{AssetEntry, ExtractionConfig, SegmentConfig};
pub use context::{Options, RunContext, UnsupportedPolicy};
pub use descriptor::AssetDescriptor;
pub use dispatch::{Dispatcher, ExportResult, Exporter, Factory};
pub use driver::{
    import, AssetFailure, Driver, LayoutGap, MemorySink, OutputSink, RunReport, SkippedExport,
};
pub use error::{Error, Result};
pub use kind::{AssetKind, ExportForm};
pub use queue::WorkQueue;
pub use search_table::{ArrayState, MergeMode, Placement, SearchTable, SearchTableEntry};
