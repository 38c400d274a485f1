//! Error types for the sync engine.

use kvsync_protocol::ProtocolError;
use kvsync_source::SourceError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that abort a sync run.
///
/// Every variant is fatal to the run that raised it. Callers map
/// [`SyncError::kind`] to a process exit code or an HTTP status.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Invalid or incomplete configuration.
    #[error("bad configuration: {0}")]
    BadConfig(String),

    /// The store could not be reached, or answered a read with an error.
    #[error("consul connection failed: {0}")]
    ConnectionFailure(String),

    /// The store rejected a transaction. The message is the response body.
    #[error("transaction rejected with status {status}: {body}")]
    TransactionFailure {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// The response body could not be read.
    #[error("failed to read response: {0}")]
    ReadFailure(String),

    /// A transaction could not be serialized.
    #[error("failed to encode transaction: {0}")]
    EncodeFailure(String),

    /// The response body was not the expected JSON.
    #[error("failed to decode response: {0}")]
    DecodeFailure(String),

    /// Secrets substitution failed for a value.
    #[error("template error at {path}: {message}")]
    TemplateFailure {
        /// Path of the offending entry.
        path: String,
        /// Description of the problem.
        message: String,
    },

    /// Deletes were computed while the delete policy forbids them.
    #[error("{} delete(s) not allowed by delete policy", paths.len())]
    DeleteNotAllowed {
        /// Paths that would have been deleted.
        paths: Vec<String>,
    },

    /// The configuration repository could not be cloned, opened or updated.
    #[error("repository failure: {0}")]
    CloneFailure(String),

    /// The hook listener could not be started.
    #[error("http server failure: {0}")]
    HttpServerFailure(String),

    /// The local dataset could not be produced.
    #[error("local dataset failure: {0}")]
    SourceFailure(String),

    /// Shutdown is in progress; no new write section may begin.
    #[error("interrupted")]
    Interrupted,
}

/// Classification of a [`SyncError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`SyncError::DeleteNotAllowed`].
    DeleteNotAllowed,
    /// See [`SyncError::BadConfig`].
    BadConfig,
    /// See [`SyncError::ConnectionFailure`].
    ConnectionFailure,
    /// See [`SyncError::TransactionFailure`].
    TransactionFailure,
    /// See [`SyncError::ReadFailure`].
    ReadFailure,
    /// See [`SyncError::EncodeFailure`].
    EncodeFailure,
    /// See [`SyncError::DecodeFailure`].
    DecodeFailure,
    /// See [`SyncError::TemplateFailure`].
    TemplateFailure,
    /// See [`SyncError::CloneFailure`].
    CloneFailure,
    /// See [`SyncError::HttpServerFailure`].
    HttpServerFailure,
    /// See [`SyncError::SourceFailure`].
    SourceFailure,
    /// See [`SyncError::Interrupted`].
    Interrupted,
}

impl ErrorKind {
    /// Process exit status for this kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::Interrupted => 0,
            ErrorKind::DeleteNotAllowed => 10,
            ErrorKind::BadConfig => 20,
            ErrorKind::ConnectionFailure => 30,
            ErrorKind::TransactionFailure => 31,
            ErrorKind::ReadFailure => 40,
            ErrorKind::EncodeFailure => 50,
            ErrorKind::DecodeFailure => 51,
            ErrorKind::CloneFailure => 60,
            ErrorKind::TemplateFailure => 70,
            ErrorKind::HttpServerFailure => 80,
            ErrorKind::SourceFailure => 100,
        }
    }
}

impl SyncError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::BadConfig(_) => ErrorKind::BadConfig,
            SyncError::ConnectionFailure(_) => ErrorKind::ConnectionFailure,
            SyncError::TransactionFailure { .. } => ErrorKind::TransactionFailure,
            SyncError::ReadFailure(_) => ErrorKind::ReadFailure,
            SyncError::EncodeFailure(_) => ErrorKind::EncodeFailure,
            SyncError::DecodeFailure(_) => ErrorKind::DecodeFailure,
            SyncError::TemplateFailure { .. } => ErrorKind::TemplateFailure,
            SyncError::DeleteNotAllowed { .. } => ErrorKind::DeleteNotAllowed,
            SyncError::CloneFailure(_) => ErrorKind::CloneFailure,
            SyncError::HttpServerFailure(_) => ErrorKind::HttpServerFailure,
            SyncError::SourceFailure(_) => ErrorKind::SourceFailure,
            SyncError::Interrupted => ErrorKind::Interrupted,
        }
    }

    /// Shorthand for `self.kind().exit_code()`.
    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }

    /// Paths blocked by the delete policy, if this is a delete abort.
    pub fn blocked_paths(&self) -> Option<&[String]> {
        match self {
            SyncError::DeleteNotAllowed { paths } => Some(paths),
            _ => None,
        }
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Encode(e) => SyncError::EncodeFailure(e.to_string()),
            ProtocolError::InvalidDeletePolicy(_) => SyncError::BadConfig(err.to_string()),
        }
    }
}

impl From<SourceError> for SyncError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::InvalidDocument { .. } => SyncError::DecodeFailure(err.to_string()),
            SourceError::Repository(_) => SyncError::CloneFailure(err.to_string()),
            _ if err.is_config_error() => SyncError::BadConfig(err.to_string()),
            _ => SyncError::SourceFailure(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_stable() {
        assert_eq!(SyncError::BadConfig("x".into()).exit_code(), 20);
        assert_eq!(SyncError::ConnectionFailure("x".into()).exit_code(), 30);
        assert_eq!(
            SyncError::TransactionFailure {
                status: 409,
                body: "conflict".into()
            }
            .exit_code(),
            31
        );
        assert_eq!(SyncError::DecodeFailure("x".into()).exit_code(), 51);
        assert_eq!(
            SyncError::DeleteNotAllowed { paths: vec![] }.exit_code(),
            10
        );
        assert_eq!(SyncError::HttpServerFailure("x".into()).exit_code(), 80);
        assert_eq!(SyncError::SourceFailure("x".into()).exit_code(), 100);
        assert_eq!(SyncError::Interrupted.exit_code(), 0);
    }

    #[test]
    fn blocked_paths_only_for_delete_abort() {
        let err = SyncError::DeleteNotAllowed {
            paths: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.blocked_paths(), Some(&["a".to_string(), "b".to_string()][..]));
        assert_eq!(err.to_string(), "2 delete(s) not allowed by delete policy");
        assert!(SyncError::Interrupted.blocked_paths().is_none());
    }

    #[test]
    fn source_errors_are_classified() {
        let err: SyncError = SourceError::SecretsNotFound("s.json".into()).into();
        assert_eq!(err.kind(), ErrorKind::BadConfig);

        let err: SyncError = SourceError::RootNotFound("/nope".into()).into();
        assert_eq!(err.kind(), ErrorKind::SourceFailure);

        let err: SyncError = SourceError::InvalidDocument {
            format: "JSON",
            path: "svc/app".into(),
            message: "expected value".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
        assert_eq!(err.exit_code(), 51);

        let err: SyncError = SourceError::Repository("remote url mismatch".into()).into();
        assert_eq!(err.kind(), ErrorKind::CloneFailure);
        assert_eq!(err.exit_code(), 60);
    }

    #[test]
    fn transaction_failure_keeps_body() {
        let err = SyncError::TransactionFailure {
            status: 413,
            body: "Request body too large".into(),
        };
        assert!(err.to_string().contains("Request body too large"));
    }
}
