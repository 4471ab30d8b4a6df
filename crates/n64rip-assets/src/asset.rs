//! Parsed asset representation.

use crate::formats::{
    Blob, Bk64Animation, DemoInput, ModelSummary, Sf64Animation, Texture, VertexList,
};
use crate::{AssetKind, Error};

/// A decoded asset, one variant per kind.
///
/// Exporters receive it by reference and never mutate it.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedAsset {
    Vertex(VertexList),
    Sf64Animation(Sf64Animation),
    Bk64Animation(Bk64Animation),
    Bk64DemoInput(DemoInput),
    Bk64Model(ModelSummary),
    Texture(Texture),
    Blob(Blob),
}

impl ParsedAsset {
    pub fn kind(&self) -> AssetKind {
        match self {
            Self::Vertex(_) => AssetKind::Vertex,
            Self::Sf64Animation(_) => AssetKind::Sf64Animation,
            Self::Bk64Animation(_) => AssetKind::Bk64Animation,
            Self::Bk64DemoInput(_) => AssetKind::Bk64DemoInput,
            Self::Bk64Model(_) => AssetKind::Bk64Model,
            Self::Texture(_) => AssetKind::Texture,
            Self::Blob(_) => AssetKind::Blob,
        }
    }

    /// C type used when the asset is declared in generated source.
    pub fn c_type(&self) -> &'static str {
        match self {
            Self::Vertex(_) => "Vtx",
            Self::Sf64Animation(_) => "Animation",
            Self::Bk64Animation(_) => "AnimationFile",
            Self::Bk64DemoInput(_) => "DemoFileHeader",
            Self::Bk64Model(_) => "BKModel",
            Self::Texture(texture) => texture.ctype.as_str(),
            Self::Blob(_) => "u8",
        }
    }

    /// Whether the asset is declared as an array (`sym[]`) rather than a single value.
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Vertex(_) | Self::Texture(_) | Self::Blob(_))
    }

    /// Expression for a pointer to this asset in a reference table.
    pub fn pointer_to(&self, symbol: &str) -> String {
        match self {
            Self::Bk64Animation(_) => format!("&{symbol}_File"),
            _ if self.is_array() => symbol.to_string(),
            _ => format!("&{symbol}"),
        }
    }

    /// Error for an exporter handed an asset of the wrong kind.
    pub fn mismatch(&self, expected: AssetKind) -> Error {
        Error::AssetMismatch {
            expected,
            actual: self.kind(),
        }
    }
}
