//! Error types for the hook server.

use kvsync_engine::SyncError;
use std::net::SocketAddr;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that stop the hook server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The runtime could not be built.
    #[error("cannot start server runtime: {0}")]
    Runtime(std::io::Error),

    /// The accept loop failed.
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

impl From<ServerError> for SyncError {
    fn from(err: ServerError) -> Self {
        SyncError::HttpServerFailure(err.to_string())
    }
}
