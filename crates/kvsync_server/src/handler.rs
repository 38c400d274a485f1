//! Request handler for the run endpoint.

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use kvsync_engine::{KvStore, LocalSource, RunSummary, SyncEngine, SyncError, SyncResult};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Path of the run endpoint.
pub const RUN_PATH: &str = "/v1/run";

/// Response header carrying the exit code of a failed run.
pub const ERROR_HEADER: &str = "X-Gonsul-Error";

/// Response header listing the paths blocked by the delete policy.
pub const DELETE_PATHS_HEADER: &str = "X-Gonsul-Delete-Paths";

/// Body of every 404 response.
pub const NOT_FOUND_BODY: &str = "404 - page not found";

/// State shared by all requests.
pub(crate) struct HandlerContext<S: KvStore, L: LocalSource> {
    engine: Arc<SyncEngine<S, L>>,
    // Held for the whole of a run.
    run_lock: Mutex<()>,
}

impl<S: KvStore, L: LocalSource> HandlerContext<S, L> {
    pub fn new(engine: Arc<SyncEngine<S, L>>) -> Self {
        Self {
            engine,
            run_lock: Mutex::new(()),
        }
    }

    /// Runs one apply. Blocks while another run holds the lock.
    pub fn run_serialized(&self) -> SyncResult<RunSummary> {
        let _serial = self.run_lock.lock();
        let result = self.engine.apply();
        let stats = self.engine.stats();
        debug!(
            runs_completed = stats.runs_completed,
            runs_failed = stats.runs_failed,
            batches_committed = stats.batches_committed,
            "hook run finished"
        );
        result
    }
}

/// Handles `/v1/run` for every method.
pub(crate) async fn run<S, L>(
    State(context): State<Arc<HandlerContext<S, L>>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    method: Method,
) -> Response
where
    S: KvStore + 'static,
    L: LocalSource + 'static,
{
    info!("HTTP Incoming connection from: {}", remote);
    if method != Method::GET {
        return not_found().await.into_response();
    }

    // The engine talks to Consul with blocking I/O.
    let result = tokio::task::spawn_blocking(move || context.run_serialized())
        .await
        .unwrap_or_else(|e| Err(SyncError::HttpServerFailure(e.to_string())));
    run_response(result)
}

/// Fallback for unknown paths.
pub(crate) async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, NOT_FOUND_BODY)
}

/// Converts the outcome of a run into the HTTP response.
pub(crate) fn run_response(result: SyncResult<RunSummary>) -> Response {
    match result {
        Ok(summary) => {
            info!(
                inserts = summary.inserts,
                updates = summary.updates,
                deletes = summary.deletes,
                "hook run finished"
            );
            (StatusCode::OK, "Done").into_response()
        }
        Err(err) => {
            error!("hook run failed: {}", err);
            let code = err.exit_code();
            let mut headers = HeaderMap::new();
            headers.insert(ERROR_HEADER, HeaderValue::from(code));
            if let Some(paths) = err.blocked_paths() {
                match HeaderValue::from_str(&paths.join(",")) {
                    Ok(value) => {
                        headers.insert(DELETE_PATHS_HEADER, value);
                    }
                    Err(e) => error!("blocked paths do not fit in a header: {}", e),
                }
            }
            (
                StatusCode::SERVICE_UNAVAILABLE,
                headers,
                format!("Error: {}\n", code),
            )
                .into_response()
        }
    }
}
