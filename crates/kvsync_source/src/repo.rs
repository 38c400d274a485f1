//! Git checkout of the configuration repository.

use crate::config::RepoConfig;
use crate::error::{SourceError, SourceResult};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{Cred, FetchOptions, RemoteCallbacks, Repository};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Keeps a local checkout of a [`RepoConfig`] up to date.
///
/// Each [`update`](Checkout::update) clones the repository into the root,
/// or opens it when the root already holds a checkout, then fetches the
/// configured remote and force-checks-out `<remote>/<branch>`. Local edits
/// in the checkout are discarded.
#[derive(Debug, Clone)]
pub struct Checkout {
    repo: RepoConfig,
    root: PathBuf,
}

impl Checkout {
    /// Creates a checkout of `repo` at `root`.
    pub fn new(repo: RepoConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            repo,
            root: root.into(),
        }
    }

    /// Returns the checkout directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Clones or opens, fetches, then checks out the branch.
    pub fn update(&self) -> SourceResult<()> {
        info!(url = %self.repo.url, root = %self.root.display(), "updating repository");
        let repository = self.clone_or_open()?;

        if !self.remote_matches(&repository)? {
            return Err(SourceError::Repository(format!(
                "remote url is not equal to provided: {}",
                self.repo.url
            )));
        }

        self.fetch(&repository);
        self.checkout(&repository)
    }

    fn clone_or_open(&self) -> SourceResult<Repository> {
        match RepoBuilder::new()
            .fetch_options(self.fetch_options())
            .clone(&self.repo.url, &self.root)
        {
            Ok(repository) => {
                debug!("repository cloned");
                Ok(repository)
            }
            Err(e) => {
                debug!("failed clone ({}), trying to open directory", e.message());
                let repository = Repository::open(&self.root).map_err(|_| {
                    SourceError::Repository(
                        "failed clone and directory is not a git repo, try cleaning dir".into(),
                    )
                })?;
                debug!("git directory opened");
                Ok(repository)
            }
        }
    }

    fn remote_matches(&self, repository: &Repository) -> SourceResult<bool> {
        let names = repository.remotes()?;
        for name in names.iter().flatten() {
            let remote = repository.find_remote(name)?;
            if remote.url() == Some(self.repo.url.as_str()) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // A failed fetch leaves the last fetched state checked out.
    fn fetch(&self, repository: &Repository) {
        let refspec = format!(
            "+refs/heads/{branch}:refs/remotes/{remote}/{branch}",
            branch = self.repo.branch,
            remote = self.repo.remote_name
        );
        let result = repository
            .find_remote(&self.repo.remote_name)
            .and_then(|mut remote| {
                remote.fetch(&[refspec.as_str()], Some(&mut self.fetch_options()), None)
            });
        match result {
            Ok(()) => debug!(remote = %self.repo.remote_name, "fetch complete"),
            Err(e) => warn!(remote = %self.repo.remote_name, "fetch failed: {}", e.message()),
        }
    }

    fn checkout(&self, repository: &Repository) -> SourceResult<()> {
        let reference = format!("refs/remotes/{}/{}", self.repo.remote_name, self.repo.branch);
        debug!(reference = %reference, "checking out");
        let commit = repository.find_reference(&reference)?.peel_to_commit()?;

        repository.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))?;
        repository.set_head_detached(commit.id())?;
        info!(commit = %commit.id(), branch = %self.repo.branch, "checked out");
        Ok(())
    }

    fn fetch_options(&self) -> FetchOptions<'_> {
        let mut callbacks = RemoteCallbacks::new();
        if let Some(key) = &self.repo.ssh_key {
            let user = self.repo.ssh_user.as_str();
            callbacks.credentials(move |_url, username, _allowed| {
                Cred::ssh_key(username.unwrap_or(user), None, key, None)
            });
        }
        let mut options = FetchOptions::new();
        options.remote_callbacks(callbacks);
        options
    }
}
