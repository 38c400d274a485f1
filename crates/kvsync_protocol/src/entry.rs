//! Key/value entries and the two datasets a sync compares.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::BTreeMap;

/// Desired state: path to raw (not yet encoded) value.
///
/// Ordered by path so every run traverses paths in the same order.
pub type LocalDataset = BTreeMap<String, String>;

/// Store state under a base path: path to base64-encoded value.
///
/// A base path with no keys (HTTP 404) is represented by an empty map.
pub type LiveDataset = BTreeMap<String, String>;

/// A single key/value pair destined for the store.
///
/// `value` is base64 text on the wire side and raw text on the local side;
/// entries inside an `Operation` always carry the encoded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    path: String,
    value: String,
}

impl Entry {
    /// Creates a new entry.
    pub fn new(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Creates an entry with no value (used for deletes).
    pub fn path_only(path: impl Into<String>) -> Self {
        Self::new(path, String::new())
    }

    /// Returns the slash-delimited key.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the value.
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Base64-encodes a raw value using the standard alphabet with padding.
pub fn encode_value(raw: &str) -> String {
    STANDARD.encode(raw.as_bytes())
}

/// Decodes a base64 value back into text.
///
/// Returns `None` if the input is not valid base64. Invalid UTF-8 is
/// replaced lossily since the result is only used for display.
pub fn decode_value(encoded: &str) -> Option<String> {
    STANDARD
        .decode(encoded.as_bytes())
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}
