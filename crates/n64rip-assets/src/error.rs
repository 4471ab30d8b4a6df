//! Error types for asset extraction.

use thiserror::Error;

use crate::{AssetKind, ExportForm};

/// Errors that can occur while parsing or exporting assets.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Codec error, including out-of-bounds reads.
    #[error("{0}")]
    Common(#[from] n64rip_common::Error),

    /// ROM access error: unmapped segments, unknown sources, decode failures.
    #[error("{0}")]
    Rom(#[from] n64rip_rom::Error),

    /// Kind-specific structural violation.
    #[error("{kind} parse error: {reason}")]
    Parse { kind: AssetKind, reason: String },

    /// No exporter registered for this kind and form.
    #[error("no {form} exporter registered for {kind}")]
    UnsupportedExport { kind: AssetKind, form: ExportForm },

    /// No factory registered for this kind.
    #[error("no factory registered for {0}")]
    UnsupportedKind(AssetKind),

    /// Unrecognized asset type name.
    #[error("unknown asset type: {0}")]
    UnknownKind(String),

    /// Modding document could not be read back.
    #[error("malformed modding document: {0}")]
    MalformedModdingDocument(String),

    /// Exporter received a parsed asset of another kind.
    #[error("expected a {expected} asset, got {actual}")]
    AssetMismatch { expected: AssetKind, actual: AssetKind },

    /// Required descriptor attribute is absent.
    #[error("missing attribute `{0}`")]
    MissingAttribute(String),

    /// Descriptor attribute has the wrong type or range.
    #[error("invalid attribute `{key}`: {reason}")]
    InvalidAttribute { key: String, reason: String },

    /// Search table entry is inconsistent.
    #[error("invalid search table `{name}`: {reason}")]
    InvalidSearchTable { name: String, reason: String },

    /// Run configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// An output sink could not be opened or written.
    #[error("output sink error: {0}")]
    Sink(std::io::Error),
}

impl Error {
    /// Whether this error aborts the whole run rather than one asset.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, Error::Sink(_) | Error::Io(_))
    }

    pub(crate) fn parse(kind: AssetKind, reason: impl Into<String>) -> Self {
        Error::Parse {
            kind,
            reason: reason.into(),
        }
    }
}

impl From<n64rip_rom::DecodeError> for Error {
    fn from(err: n64rip_rom::DecodeError) -> Self {
        Error::Rom(err.into())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type for asset operations.
pub type Result<T> = std::result::Result<T, Error>;
