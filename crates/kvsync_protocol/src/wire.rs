//! Consul KV wire records.

use crate::operation::Operation;
use serde::{Deserialize, Serialize};

/// One record of a recursive `GET /v1/kv/<prefix>?recurse=true` response.
///
/// `Value` is already base64-encoded by the store and is `null` for
/// folder placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KvPair {
    /// Lock index.
    #[serde(default)]
    pub lock_index: u64,
    /// Full key.
    pub key: String,
    /// Opaque flags.
    #[serde(default)]
    pub flags: u64,
    /// Base64 value.
    #[serde(default)]
    pub value: Option<String>,
    /// Index at creation.
    #[serde(default)]
    pub create_index: u64,
    /// Index of the last modification.
    #[serde(default)]
    pub modify_index: u64,
}

impl KvPair {
    /// Creates a record with the given key and encoded value.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            lock_index: 0,
            key: key.into(),
            flags: 0,
            value: Some(value.into()),
            create_index: 0,
            modify_index: 0,
        }
    }
}

/// One element of a `PUT /v1/txn` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnOp {
    /// The KV operation.
    #[serde(rename = "KV")]
    pub kv: TxnKv,
}

/// A KV transaction operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TxnKv {
    /// `set` or `delete`.
    pub verb: String,
    /// Target key.
    pub key: String,
    /// Base64 value; omitted for deletes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl From<&Operation> for TxnOp {
    fn from(op: &Operation) -> Self {
        Self {
            kv: TxnKv {
                verb: op.verb().to_string(),
                key: op.path().to_string(),
                value: op.value().map(str::to_string),
            },
        }
    }
}
