//! YAML run configuration.
//!
//! ```yaml
//! options: { gbi_floats: false, debug: false, on_unsupported: skip }
//! segments:
//!   - { id: 6, base: 0x1000, end: 0x2000 }
//! tables:
//!   - { name: gVtxTable, kind: VTX, start: 0x0, end: 0x20 }
//! assets:
//!   my_vertices: { type: VTX, offset: 0x0, count: 3 }
//! ```
//!
//! Asset entries keep document order; their keys are the default symbols.

use std::path::Path;

use n64rip_rom::SourceId;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::{Attributes, AssetKind, Error, Options, Result, SearchTableEntry};

/// A segment declared up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentConfig {
    pub id: u8,
    #[serde(default)]
    pub source: u32,
    pub base: u32,
    pub end: u32,
}

/// One configured asset before its offset is resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetEntry {
    pub kind: AssetKind,
    pub source: SourceId,
    /// Logical offset as written; may be segmented.
    pub offset: u32,
    pub symbol: String,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionConfig {
    pub options: Options,
    pub segments: Vec<SegmentConfig>,
    pub tables: Vec<SearchTableEntry>,
    pub assets: Mapping,
}

impl ExtractionConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml_str(&text)
    }

    /// Asset entries in document order.
    pub fn entries(&self) -> Result<Vec<AssetEntry>> {
        self.assets
            .iter()
            .map(|(key, value)| {
                let name = key
                    .as_str()
                    .ok_or_else(|| Error::Config(format!("asset key {key:?} is not a string")))?;
                entry(name, value)
            })
            .collect()
    }
}

fn entry(name: &str, value: &Value) -> Result<AssetEntry> {
    let Value::Mapping(mapping) = value else {
        return Err(Error::Config(format!("asset `{name}` must be a mapping")));
    };
    let attributes = Attributes::from(mapping.clone());
    let kind: AssetKind = attributes
        .get_str("type")?
        .ok_or_else(|| Error::Config(format!("asset `{name}` has no type")))?
        .parse()?;
    let offset = attributes.require_u32("offset")?;
    let source = SourceId(attributes.get_u32("source")?.unwrap_or(0));
    let symbol = attributes.get_str("symbol")?.unwrap_or(name).to_string();
    Ok(AssetEntry {
        kind,
        source,
        offset,
        symbol,
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MergeMode, UnsupportedPolicy};

    const CONFIG: &str = r#"
options:
  debug: true
  on_unsupported: abort
segments:
  - { id: 6, base: 0x1000, end: 0x2000 }
tables:
  - { name: gVtxTable, kind: VTX, start: 0x0, end: 0x20, mode: reference }
assets:
  zeta_vtx: { type: VTX, offset: 0x0, count: 3 }
  alpha_anim: { type: "SF64:ANIM", offset: 0x06000010, symbol: gAnim, requires_segments: [6] }
"#;

    #[test]
    fn test_parse_config() {
        let config = ExtractionConfig::from_yaml_str(CONFIG).unwrap();
        assert!(config.options.debug);
        assert!(!config.options.gbi_floats);
        assert_eq!(config.options.on_unsupported, UnsupportedPolicy::Abort);
        assert_eq!(
            config.segments,
            vec![SegmentConfig {
                id: 6,
                source: 0,
                base: 0x1000,
                end: 0x2000
            }]
        );
        assert_eq!(config.tables[0].kind, Some(AssetKind::Vertex));
        assert_eq!(config.tables[0].mode, MergeMode::Reference);
    }

    #[test]
    fn test_entries_keep_document_order() {
        let config = ExtractionConfig::from_yaml_str(CONFIG).unwrap();
        let entries = config.entries().unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].symbol, "zeta_vtx");
        assert_eq!(entries[0].kind, AssetKind::Vertex);
        assert_eq!(entries[1].symbol, "gAnim");
        assert_eq!(entries[1].offset, 0x0600_0010);
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(&path, CONFIG).unwrap();
        assert_eq!(
            ExtractionConfig::from_path(&path).unwrap(),
            ExtractionConfig::from_yaml_str(CONFIG).unwrap()
        );
        assert!(matches!(
            ExtractionConfig::from_path(dir.path().join("missing.yaml")),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_entry_errors() {
        let config = ExtractionConfig::from_yaml_str("assets:\n  a: { offset: 0 }\n").unwrap();
        assert!(matches!(config.entries(), Err(Error::Config(_))));

        let config = ExtractionConfig::from_yaml_str("assets:\n  a: { type: GFX, offset: 0 }\n").unwrap();
        assert!(matches!(config.entries(), Err(Error::UnknownKind(_))));

        assert!(matches!(
            ExtractionConfig::from_yaml_str("bogus: 1\n"),
            Err(Error::Config(_))
        ));
    }
}
