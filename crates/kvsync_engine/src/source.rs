//! Local dataset providers.

use crate::error::SyncResult;
use kvsync_protocol::LocalDataset;
use kvsync_source::DirectorySource;
use std::sync::Arc;

/// Produces the desired state for a run.
///
/// Called once per run, so every run sees the current state of the source.
pub trait LocalSource: Send + Sync {
    /// Returns the path to raw value mapping.
    fn produce(&self) -> SyncResult<LocalDataset>;
}

impl LocalSource for DirectorySource {
    fn produce(&self) -> SyncResult<LocalDataset> {
        Ok(self.load()?)
    }
}

/// A fixed dataset.
impl LocalSource for LocalDataset {
    fn produce(&self) -> SyncResult<LocalDataset> {
        Ok(self.clone())
    }
}

impl<L: LocalSource + ?Sized> LocalSource for Arc<L> {
    fn produce(&self) -> SyncResult<LocalDataset> {
        (**self).produce()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use kvsync_source::{RepoConfig, SourceConfig};

    #[test]
    fn directory_errors_become_source_failures() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = DirectorySource::new(
            SourceConfig::new(dir.path()).with_repo_base_path("missing"),
        );
        assert!(matches!(source.produce(), Err(SyncError::SourceFailure(_))));
    }

    #[test]
    fn directory_source_produces_keys() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("motd.txt"), "hi").unwrap();
        let source = DirectorySource::new(SourceConfig::new(dir.path()).with_kv_base_path("web"));

        let data = source.produce().unwrap();
        assert_eq!(data.get("web/motd").map(String::as_str), Some("hi"));
    }

    #[test]
    fn unparseable_documents_are_decode_failures() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("app.json"), "{\"db\": ").unwrap();
        let source = DirectorySource::new(SourceConfig::new(dir.path()));

        let err = source.produce().unwrap_err();
        assert!(matches!(err, SyncError::DecodeFailure(_)));
        assert_eq!(err.exit_code(), 51);
    }

    #[test]
    fn repository_errors_are_clone_failures() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("motd.txt"), "hi").unwrap();
        let missing = dir.path().join("no-such-repo.git");
        let source = DirectorySource::new(
            SourceConfig::new(dir.path())
                .with_repository(RepoConfig::new(missing.to_string_lossy().to_string())),
        );

        let err = source.produce().unwrap_err();
        assert!(matches!(err, SyncError::CloneFailure(_)));
        assert_eq!(err.exit_code(), 60);
    }
}
