//! Secrets map loading.

use crate::error::{SourceError, SourceResult};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Placeholder name to secret value.
pub type SecretsMap = HashMap<String, String>;

/// Loads a flat JSON object of strings used for value templating.
///
/// If `file` does not exist as given, it is looked up relative to
/// `repo_root` before giving up.
pub fn load_secrets(file: &str, repo_root: &Path) -> SourceResult<SecretsMap> {
    let given = Path::new(file);
    let path = if given.exists() {
        given.to_path_buf()
    } else {
        let fallback = repo_root.join(file.trim_start_matches('/'));
        if !fallback.exists() {
            return Err(SourceError::SecretsNotFound(file.to_string()));
        }
        fallback
    };

    debug!(path = %path.display(), "loading secrets file");
    let content = std::fs::read_to_string(&path).map_err(|e| SourceError::Io {
        path: path.clone(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| SourceError::InvalidSecrets {
        path: file.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loads_from_given_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("secrets.json");
        std::fs::write(&file, r#"{"db_password": "hunter2"}"#).unwrap();

        let secrets = load_secrets(file.to_str().unwrap(), Path::new("/nonexistent")).unwrap();
        assert_eq!(secrets["db_password"], "hunter2");
    }

    #[test]
    fn falls_back_to_repo_root() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("ops")).unwrap();
        std::fs::write(dir.path().join("ops/keys.json"), r#"{"token": "abc"}"#).unwrap();

        let secrets = load_secrets("ops/keys.json", dir.path()).unwrap();
        assert_eq!(secrets["token"], "abc");
    }

    #[test]
    fn missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_secrets("nope.json", dir.path()).unwrap_err();
        assert!(matches!(err, SourceError::SecretsNotFound(_)));
        assert!(err.is_config_error());
    }

    #[test]
    fn nested_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("s.json"), r#"{"a": {"b": "c"}}"#).unwrap();

        let err = load_secrets("s.json", dir.path()).unwrap_err();
        assert!(matches!(err, SourceError::InvalidSecrets { .. }));
    }
}
