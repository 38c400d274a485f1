//! # kvsync Hook Server
//!
//! Runs the sync engine on demand over HTTP.
//!
//! ## Endpoint
//!
//! - `GET /v1/run`: one full apply. `200 Done` on success, `503` otherwise
//!   with the exit code in `X-Gonsul-Error`. A delete-policy abort also lists
//!   the blocked paths in `X-Gonsul-Delete-Paths`.
//! - Any other method or path: `404 - page not found`.
//!
//! Runs never overlap. Requests that arrive while a run is in progress wait
//! for it and then perform their own fetch, diff and apply.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{DELETE_PATHS_HEADER, ERROR_HEADER, NOT_FOUND_BODY, RUN_PATH};
pub use server::HookServer;
