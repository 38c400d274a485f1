//! # kvsync Engine
//!
//! Converges a Consul KV prefix onto a desired-state dataset.
//!
//! This crate provides:
//! - Live-state fetch through the `KvStore` trait (`ConsulClient`, `MemoryStore`)
//! - The diff that classifies inserts, updates and deletes
//! - Secrets templating of local values
//! - Size/count-bounded transactional apply
//! - Dry, once and poll runs
//! - The busy signal and the signal watcher used for clean shutdown
//!
//! ## Run
//!
//! Every run follows the same sequence:
//! 1. Produce the local dataset
//! 2. Fetch the live dataset under the base path (404 means empty)
//! 3. Diff, honouring the delete policy
//! 4. Dry run: report and stop. Otherwise apply the batches in order
//!
//! ## Key Invariants
//!
//! - A delete-policy abort happens before any write
//! - The busy signal is held from the first transaction to the last
//! - Nothing is retried and nothing is rolled back; the first error ends the run
//! - Unchanged values produce no operation, so a second run is empty

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod busy;
mod config;
mod diff;
mod engine;
mod error;
mod http;
mod report;
mod shutdown;
mod source;
mod template;
mod transport;

pub use busy::{BusyGuard, BusySignal};
pub use config::{PollConfig, SyncConfig, SyncMode, TlsConfig};
pub use diff::diff;
pub use engine::{RunSummary, SyncEngine, SyncStats};
pub use error::{ErrorKind, SyncError, SyncResult};
pub use http::{ConsulClient, KvStore, TOKEN_HEADER};
pub use report::{Reporter, SilentReporter, TableReporter};
pub use shutdown::{shutdown_signal, spawn_signal_watcher, spawn_watcher};
pub use source::LocalSource;
pub use template::{render, TemplateError};
pub use transport::MemoryStore;
