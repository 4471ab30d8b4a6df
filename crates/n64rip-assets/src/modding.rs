//! Modding documents.
//!
//! A modding document is a YAML mapping with a single root key, the
//! asset's symbol, whose value holds the asset's fields. Each kind picks
//! its own field names; they must survive a write/read round trip.

use std::io::Write;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::{Error, Result};

/// Write `value` under the root key `symbol`.
pub fn write_document<T: Serialize>(sink: &mut dyn Write, symbol: &str, value: &T) -> Result<()> {
    let body = serde_yaml::to_value(value).map_err(|e| Error::MalformedModdingDocument(e.to_string()))?;
    let mut root = Mapping::new();
    root.insert(Value::String(symbol.to_string()), body);
    let text = serde_yaml::to_string(&root).map_err(|e| Error::MalformedModdingDocument(e.to_string()))?;
    sink.write_all(text.as_bytes())?;
    Ok(())
}

/// Read a document back, returning its root symbol and body.
pub fn read_document<T: DeserializeOwned>(document: &[u8]) -> Result<(String, T)> {
    let root: Mapping = serde_yaml::from_slice(document).map_err(malformed)?;
    let mut entries = root.into_iter();
    let (symbol, body) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        (None, _) => return Err(Error::MalformedModdingDocument("document is empty".into())),
        (Some(_), Some(_)) => {
            return Err(Error::MalformedModdingDocument(
                "document must have exactly one root key".into(),
            ))
        }
    };
    let symbol = match symbol {
        Value::String(symbol) => symbol,
        other => {
            return Err(Error::MalformedModdingDocument(format!(
                "root key must be a symbol name, found {other:?}"
            )))
        }
    };
    let body = serde_yaml::from_value(body).map_err(malformed)?;
    Ok((symbol, body))
}

fn malformed(err: serde_yaml::Error) -> Error {
    Error::MalformedModdingDocument(err.to_string())
}
