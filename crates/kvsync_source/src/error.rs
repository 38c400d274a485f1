//! Error types for the local dataset provider.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors that can occur while producing the local dataset.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The walk root does not exist or is not a directory.
    #[error("source directory not found: {0}")]
    RootNotFound(PathBuf),

    /// A file or directory could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed.
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// A JSON or YAML file could not be parsed.
    #[error("error parsing {format} file: {path} with message: {message}")]
    InvalidDocument {
        /// `JSON` or `YAML`.
        format: &'static str,
        /// Offending path.
        path: String,
        /// Parser message.
        message: String,
    },

    /// The configuration repository could not be cloned, opened or updated.
    #[error("REPO: {0}")]
    Repository(String),

    /// The secrets file was found neither as given nor under the repo root.
    #[error("the provided secrets file ({0}) cannot be found")]
    SecretsNotFound(String),

    /// The secrets file is not a flat JSON object of strings.
    #[error("could not parse secrets file ({path}): {message}")]
    InvalidSecrets {
        /// Path as given.
        path: String,
        /// Parser message.
        message: String,
    },
}

impl From<git2::Error> for SourceError {
    fn from(err: git2::Error) -> Self {
        SourceError::Repository(err.message().to_string())
    }
}

impl SourceError {
    /// Returns true if the error stems from bad configuration rather than
    /// from the contents of the tree.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SourceError::SecretsNotFound(_) | SourceError::InvalidSecrets { .. }
        )
    }
}
