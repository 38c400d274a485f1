//! Error types for protocol encoding.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding or parsing protocol values.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A transaction record could not be serialized.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// A delete policy string was not recognised.
    #[error("invalid delete policy '{0}', expected one of: true, false, skip")]
    InvalidDeletePolicy(String),
}
