//! Descriptor attributes.
//!
//! Attributes are the ordered key/value parameters attached to an asset
//! entry. The pipeline itself reads only a handful of keys (`offset`,
//! `symbol`, `count`, `compression`, `requires_segments`); everything
//! else belongs to the factory of the asset's kind.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::{Error, Result};

/// Ordered string-keyed attribute mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(Mapping);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(Value::String(key.to_string()), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over string-keyed entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().filter_map(|(k, v)| k.as_str().map(|k| (k, v)))
    }

    /// Read an unsigned integer. Accepts YAML integers and `0x`-prefixed strings.
    pub fn get_u32(&self, key: &str) -> Result<Option<u32>> {
        self.get(key).map(|value| value_to_u32(key, value)).transpose()
    }

    pub fn require_u32(&self, key: &str) -> Result<u32> {
        self.get_u32(key)?
            .ok_or_else(|| Error::MissingAttribute(key.to_string()))
    }

    pub fn get_str(&self, key: &str) -> Result<Option<&str>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(invalid(key, "expected a string")),
        }
    }

    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.get_str(key)?
            .ok_or_else(|| Error::MissingAttribute(key.to_string()))
    }

    /// Read a list of unsigned integers; a scalar is treated as a one-element list.
    pub fn get_u32_list(&self, key: &str) -> Result<Vec<u32>> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Sequence(items)) => items.iter().map(|v| value_to_u32(key, v)).collect(),
            Some(value) => Ok(vec![value_to_u32(key, value)?]),
        }
    }
}

impl From<Mapping> for Attributes {
    fn from(mapping: Mapping) -> Self {
        Self(mapping)
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> Error {
    Error::InvalidAttribute {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn value_to_u32(key: &str, value: &Value) -> Result<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| invalid(key, format!("{n} is not a 32-bit unsigned integer"))),
        Value::String(s) => parse_u32(s).ok_or_else(|| invalid(key, format!("cannot parse `{s}` as an integer"))),
        _ => Err(invalid(key, "expected an integer")),
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal number.
pub fn parse_u32(text: &str) -> Option<u32> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16).ok(),
        None => text.replace('_', "").parse().ok(),
    }
}
