//! Directory-backed local dataset.

use crate::config::SourceConfig;
use crate::error::{SourceError, SourceResult};
use crate::expand::{flatten_json, flatten_yaml, parse_json, parse_yaml};
use crate::repo::Checkout;
use kvsync_protocol::LocalDataset;
use std::path::Path;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

/// Reads a checked-out configuration tree into a [`LocalDataset`].
///
/// Files are visited in file-name order. Each accepted file contributes
/// either one key (its content) or, when expansion is enabled for its
/// format, one key per document leaf. A later file that derives the same
/// key overwrites an earlier one.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    config: SourceConfig,
}

impl DirectorySource {
    /// Creates a new directory source.
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Walks the tree and builds the dataset.
    ///
    /// With a configured repository the checkout is brought up to date
    /// first, so every call sees the tip of the tracked branch.
    pub fn load(&self) -> SourceResult<LocalDataset> {
        match &self.config.repository {
            Some(repo) => Checkout::new(repo.clone(), &self.config.repo_root).update()?,
            None => debug!(
                root = %self.config.repo_root.display(),
                "skipping git update, using local path"
            ),
        }

        let root = self.config.walk_root();
        if !root.is_dir() {
            return Err(SourceError::RootNotFound(root));
        }

        info!(root = %root.display(), "reading local dataset");
        let mut data = LocalDataset::new();

        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_git_dir(entry));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or_default();
            if !self.config.accepts_extension(extension) {
                continue;
            }

            let content = std::fs::read_to_string(path).map_err(|e| SourceError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
            let key = self.relative_key(&root, path);
            debug!(file = %path.display(), key = %key, "parsing file");
            self.parse_file(&key, extension, content, &mut data)?;
        }

        info!(entries = data.len(), "local dataset ready");
        Ok(data)
    }

    fn parse_file(
        &self,
        key: &str,
        extension: &str,
        content: String,
        data: &mut LocalDataset,
    ) -> SourceResult<()> {
        match extension {
            "json" if self.config.expand_json => {
                for (leaf, value) in flatten_json(key, &content)? {
                    data.insert(self.kv_path(&leaf), value);
                }
                return Ok(());
            }
            "json" => {
                parse_json(key, &content)?;
            }
            "yaml" | "yml" if self.config.expand_yaml => {
                for (leaf, value) in flatten_yaml(key, &content)? {
                    data.insert(self.kv_path(&leaf), value);
                }
                return Ok(());
            }
            "yaml" | "yml" => {
                parse_yaml(key, &content)?;
            }
            _ => {}
        }

        data.insert(self.kv_path(key), content);
        Ok(())
    }

    /// Path relative to the walk root, `/`-separated, extension stripped
    /// unless configured otherwise.
    fn relative_key(&self, root: &Path, path: &Path) -> String {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let relative = if self.config.keep_extension {
            relative.to_path_buf()
        } else {
            relative.with_extension("")
        };

        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Joins the KV base path in front of a key.
    fn kv_path(&self, key: &str) -> String {
        let base = self.config.kv_base_path.trim_matches('/');
        if base.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", base, key)
        }
    }
}

fn is_git_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name() == ".git"
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "svc/a.txt", "x");
        write(dir.path(), "svc/b.txt", "");
        write(dir.path(), "svc/app.json", r#"{"db": {"host": "h"}, "port": 80}"#);
        write(dir.path(), "svc/notes.md", "ignored");
        write(dir.path(), "svc/cfg.yaml", "level: debug\n");
        write(dir.path(), ".git/config.txt", "not config");
        dir
    }

    #[test]
    fn plain_files_become_keys() {
        let dir = tree();
        let source = DirectorySource::new(SourceConfig::new(dir.path()));
        let data = source.load().unwrap();

        assert_eq!(data["svc/a"], "x");
        assert_eq!(data["svc/b"], "");
        assert_eq!(data["svc/app"], r#"{"db": {"host": "h"}, "port": 80}"#);
        assert!(!data.contains_key("svc/notes"));
        assert!(!data.contains_key("svc/cfg"));
        assert!(!data.keys().any(|k| k.starts_with(".git")));
    }

    #[test]
    fn expansion_and_prefix() {
        let dir = tree();
        let config = SourceConfig::new(dir.path())
            .with_extensions(["json", "yaml"])
            .with_expand_json(true)
            .with_expand_yaml(true)
            .with_kv_base_path("/team/");
        let data = DirectorySource::new(config).load().unwrap();

        assert_eq!(data["team/svc/app/db/host"], "h");
        assert_eq!(data["team/svc/app/port"], "80");
        assert_eq!(data["team/svc/cfg/level"], "debug");
        assert!(!data.contains_key("team/svc/app"));
        assert!(!data.contains_key("team/svc/a"));
    }

    #[test]
    fn keep_extension_and_base_path() {
        let dir = tree();
        let config = SourceConfig::new(dir.path())
            .with_repo_base_path("/svc")
            .with_keep_extension(true);
        let data = DirectorySource::new(config).load().unwrap();

        assert_eq!(data["a.txt"], "x");
        assert!(data.contains_key("app.json"));
    }

    #[test]
    fn invalid_json_is_rejected_even_without_expansion() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "broken.json", "{ nope");
        let err = DirectorySource::new(SourceConfig::new(dir.path()))
            .load()
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidDocument { .. }));
    }

    #[test]
    fn missing_root() {
        let dir = TempDir::new().unwrap();
        let config = SourceConfig::new(dir.path()).with_repo_base_path("does/not/exist");
        let err = DirectorySource::new(config).load().unwrap_err();
        assert!(matches!(err, SourceError::RootNotFound(_)));
    }
}
