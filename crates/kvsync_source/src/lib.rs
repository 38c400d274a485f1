//! # kvsync Source
//!
//! Produces the local dataset (path to raw value) from a checked-out
//! configuration tree.
//!
//! This crate provides:
//! - Recursive directory traversal with an extension allow-list
//! - Key derivation (walk-root relative path, optional extension, base path prefix)
//! - JSON and YAML validation, and optional expansion of documents into nested paths
//! - Loading of the secrets map used for value templating
//! - Optional git checkout of the tree, cloned once and updated before every read

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod directory;
mod error;
mod expand;
mod repo;
mod secrets;

pub use config::{RepoConfig, SourceConfig};
pub use directory::DirectorySource;
pub use error::{SourceError, SourceResult};
pub use expand::{flatten_json, flatten_yaml};
pub use repo::Checkout;
pub use secrets::{load_secrets, SecretsMap};
