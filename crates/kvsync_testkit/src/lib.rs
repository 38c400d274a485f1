//! # kvsync Testkit
//!
//! Test utilities for kvsync.
//!
//! This crate provides:
//! - `FakeConsul`, an in-process HTTP fake of the KV read and transaction
//!   endpoints with request recording, latency and failure injection
//! - `ConfigTree`, a temporary configuration tree
//! - Property-based generators for paths and datasets
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kvsync_testkit::prelude::*;
//!
//! #[test]
//! fn first_import() {
//!     let consul = FakeConsul::start();
//!     let tree = ConfigTree::new().file("svc/a.txt", "x");
//!     // ... run the engine against consul.url() and tree.path()
//!     assert_eq!(consul.get("svc/a").as_deref(), Some("x"));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod consul;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::consul::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use consul::*;
pub use fixtures::*;
pub use generators::*;
