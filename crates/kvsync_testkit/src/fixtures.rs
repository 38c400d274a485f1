//! Configuration tree fixtures.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary configuration tree, removed on drop.
pub struct ConfigTree {
    dir: TempDir,
}

impl ConfigTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    /// Writes a file at `relative`, creating parent directories.
    pub fn file(self, relative: &str, content: &str) -> Self {
        self.write(relative, content);
        self
    }

    /// Writes or overwrites a file in place.
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(path, content).expect("write fixture file");
    }

    /// Removes a file.
    pub fn remove(&self, relative: &str) {
        std::fs::remove_file(self.dir.path().join(relative)).expect("remove fixture file");
    }

    /// Root of the tree.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Root of the tree as an owned path.
    pub fn path_buf(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::new()
    }
}
