//! Asset kinds and export forms.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// The kind of an asset, as named by the `type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetKind {
    #[serde(rename = "VTX")]
    Vertex,
    #[serde(rename = "SF64:ANIM")]
    Sf64Animation,
    #[serde(rename = "BK64:ANIM")]
    Bk64Animation,
    #[serde(rename = "BK64:DEMO_INPUT")]
    Bk64DemoInput,
    #[serde(rename = "BK64:MODEL")]
    Bk64Model,
    #[serde(rename = "TEXTURE")]
    Texture,
    #[serde(rename = "BLOB")]
    Blob,
}

impl AssetKind {
    pub const ALL: [AssetKind; 7] = [
        Self::Vertex,
        Self::Sf64Animation,
        Self::Bk64Animation,
        Self::Bk64DemoInput,
        Self::Bk64Model,
        Self::Texture,
        Self::Blob,
    ];

    /// The type name used in configuration files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vertex => "VTX",
            Self::Sf64Animation => "SF64:ANIM",
            Self::Bk64Animation => "BK64:ANIM",
            Self::Bk64DemoInput => "BK64:DEMO_INPUT",
            Self::Bk64Model => "BK64:MODEL",
            Self::Texture => "TEXTURE",
            Self::Blob => "BLOB",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownKind(s.to_string()))
    }
}

/// The output form an exporter produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportForm {
    /// C declarations (`.h`).
    Header,
    /// C definitions (`.c`).
    Code,
    /// Versioned binary resource.
    Binary,
    /// Editable YAML document.
    Modding,
}

impl ExportForm {
    pub const ALL: [ExportForm; 4] = [Self::Header, Self::Code, Self::Binary, Self::Modding];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Code => "code",
            Self::Binary => "binary",
            Self::Modding => "modding",
        }
    }

    /// Header and Code output is one text stream shared by all assets.
    pub const fn is_shared_stream(self) -> bool {
        matches!(self, Self::Header | Self::Code)
    }
}

impl fmt::Display for ExportForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportForm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|form| form.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Config(format!("unknown export form: {s}")))
    }
}
