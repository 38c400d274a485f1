//! Configuration for the local dataset provider.

use std::path::PathBuf;

/// Configuration for reading a configuration tree.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Root of the checked-out repository.
    pub repo_root: PathBuf,
    /// Directory inside the repository to start walking from.
    pub repo_base_path: String,
    /// KV prefix joined in front of every derived key.
    pub kv_base_path: String,
    /// File extensions (without leading dot) considered as input.
    pub extensions: Vec<String>,
    /// Keep the file extension in the derived key.
    pub keep_extension: bool,
    /// Expand `.json` documents into one key per leaf.
    pub expand_json: bool,
    /// Expand `.yaml`/`.yml` documents into one key per leaf.
    pub expand_yaml: bool,
    /// Remote repository kept checked out at `repo_root`. `None` reads the
    /// directory as it is.
    pub repository: Option<RepoConfig>,
}

impl SourceConfig {
    /// Creates a configuration with the default extension list
    /// (`json`, `txt`, `ini`).
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            repo_base_path: "/".to_string(),
            kv_base_path: String::new(),
            extensions: vec!["json".into(), "txt".into(), "ini".into()],
            keep_extension: false,
            expand_json: false,
            expand_yaml: false,
            repository: None,
        }
    }

    /// Sets the directory to walk, relative to the repository root.
    pub fn with_repo_base_path(mut self, path: impl Into<String>) -> Self {
        self.repo_base_path = path.into();
        self
    }

    /// Sets the KV prefix.
    pub fn with_kv_base_path(mut self, path: impl Into<String>) -> Self {
        self.kv_base_path = path.into();
        self
    }

    /// Sets the accepted extensions. Leading dots and whitespace are ignored.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }

    /// Keeps file extensions in derived keys.
    pub fn with_keep_extension(mut self, keep: bool) -> Self {
        self.keep_extension = keep;
        self
    }

    /// Enables JSON expansion.
    pub fn with_expand_json(mut self, expand: bool) -> Self {
        self.expand_json = expand;
        self
    }

    /// Enables YAML expansion.
    pub fn with_expand_yaml(mut self, expand: bool) -> Self {
        self.expand_yaml = expand;
        self
    }

    /// Clones or updates `repository` into the repo root before each read.
    pub fn with_repository(mut self, repository: RepoConfig) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Returns the directory the walk starts from.
    pub fn walk_root(&self) -> PathBuf {
        let relative = self.repo_base_path.trim_start_matches('/');
        if relative.is_empty() {
            self.repo_root.clone()
        } else {
            self.repo_root.join(relative)
        }
    }

    /// Returns true if a file extension (without dot) is accepted.
    pub fn accepts_extension(&self, extension: &str) -> bool {
        self.extensions.iter().any(|ext| ext == extension)
    }
}

/// Remote git repository holding the configuration tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoConfig {
    /// Clone URL. Also matched against the remotes of an existing checkout.
    pub url: String,
    /// Branch checked out after every update.
    pub branch: String,
    /// Remote fetched from.
    pub remote_name: String,
    /// SSH user for key authentication.
    pub ssh_user: String,
    /// SSH private key. Without it no credentials are offered.
    pub ssh_key: Option<PathBuf>,
}

impl RepoConfig {
    /// Creates a configuration tracking `master` of `origin`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            branch: "master".to_string(),
            remote_name: "origin".to_string(),
            ssh_user: "git".to_string(),
            ssh_key: None,
        }
    }

    /// Sets the branch.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Sets the remote name.
    pub fn with_remote_name(mut self, remote_name: impl Into<String>) -> Self {
        self.remote_name = remote_name.into();
        self
    }

    /// Authenticates with an SSH key.
    pub fn with_ssh_key(mut self, user: impl Into<String>, key: impl Into<PathBuf>) -> Self {
        self.ssh_user = user.into();
        self.ssh_key = Some(key.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SourceConfig::new("/tmp/repo");
        assert_eq!(config.walk_root(), PathBuf::from("/tmp/repo"));
        assert!(config.accepts_extension("json"));
        assert!(config.accepts_extension("ini"));
        assert!(!config.accepts_extension("yaml"));
        assert!(!config.keep_extension);
        assert!(config.repository.is_none());
    }

    #[test]
    fn repository_defaults() {
        let repo = RepoConfig::new("git@example.com:ops/config.git");
        assert_eq!(repo.branch, "master");
        assert_eq!(repo.remote_name, "origin");
        assert!(repo.ssh_key.is_none());

        let repo = repo
            .with_branch("prod")
            .with_remote_name("upstream")
            .with_ssh_key("deploy", "/keys/id_ed25519");
        assert_eq!(repo.branch, "prod");
        assert_eq!(repo.ssh_user, "deploy");
        assert_eq!(repo.ssh_key, Some(PathBuf::from("/keys/id_ed25519")));
    }

    #[test]
    fn builder_normalises_extensions() {
        let config = SourceConfig::new("/tmp/repo")
            .with_extensions([".yaml", " txt", "", "."])
            .with_repo_base_path("/config/prod")
            .with_kv_base_path("apps");

        assert_eq!(config.extensions, vec!["yaml".to_string(), "txt".to_string()]);
        assert_eq!(config.walk_root(), PathBuf::from("/tmp/repo/config/prod"));
        assert_eq!(config.kv_base_path, "apps");
    }
}
