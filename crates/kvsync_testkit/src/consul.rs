//! In-process fake of the Consul KV and transaction endpoints.
//!
//! The server runs on its own thread and runtime, so blocking HTTP clients
//! can talk to it from plain `#[test]` functions.

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use kvsync_protocol::{decode_value, encode_value, KvPair, TxnOp, MAX_TXN_OPERATIONS};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Largest transaction body accepted, as in Consul.
pub const FAKE_MAX_TXN_BODY: usize = 512 * 1024;

/// One request seen by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: Method,
    /// Request path.
    pub path: String,
    /// Raw query string.
    pub query: Option<String>,
    /// Value of `X-Consul-Token`.
    pub token: Option<String>,
    /// Body size in bytes.
    pub body_bytes: usize,
    /// Number of transaction operations (zero for reads).
    pub operations: usize,
}

impl RecordedRequest {
    /// Returns true for a transaction write.
    pub fn is_txn(&self) -> bool {
        self.method == Method::PUT && self.path == "/v1/txn"
    }
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    from: usize,
    status: StatusCode,
    body: String,
}

#[derive(Debug, Default)]
struct FakeState {
    data: Mutex<BTreeMap<String, String>>,
    requests: Mutex<Vec<RecordedRequest>>,
    token: Mutex<Option<String>>,
    txn_latency: Mutex<Duration>,
    txn_failure: Mutex<Option<InjectedFailure>>,
    read_failure: Mutex<Option<StatusCode>>,
    read_body: Mutex<Option<String>>,
    txn_seen: AtomicUsize,
    txn_in_flight: AtomicUsize,
}

/// A running fake Consul server. Stopped on drop.
pub struct FakeConsul {
    addr: SocketAddr,
    state: Arc<FakeState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl FakeConsul {
    /// Starts a server on `127.0.0.1` with an ephemeral port.
    pub fn start() -> Self {
        let state = Arc::new(FakeState::default());
        let app = router(Arc::clone(&state));

        let (addr_tx, addr_rx) = std::sync::mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        std::thread::Builder::new()
            .name("fake-consul".into())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(2)
                    .enable_all()
                    .build()
                    .expect("fake consul runtime");
                runtime.block_on(async move {
                    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                        .await
                        .expect("bind fake consul");
                    addr_tx
                        .send(listener.local_addr().expect("local addr"))
                        .expect("report address");
                    axum::serve(listener, app)
                        .with_graceful_shutdown(async {
                            let _ = shutdown_rx.await;
                        })
                        .await
                        .expect("fake consul server");
                });
            })
            .expect("spawn fake consul thread");

        let addr = addr_rx.recv().expect("fake consul address");
        Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    /// Socket address the server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL, e.g. `http://127.0.0.1:41234`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stores a raw value, base64-encoding it as Consul does.
    pub fn seed(&self, key: &str, raw: &str) {
        self.state
            .data
            .lock()
            .insert(key.to_string(), encode_value(raw));
    }

    /// Stores many raw values.
    pub fn seed_all<'a>(&self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) {
        for (key, raw) in pairs {
            self.seed(key, raw);
        }
    }

    /// Returns the decoded value of a key.
    pub fn get(&self, key: &str) -> Option<String> {
        self.state.data.lock().get(key).and_then(|v| decode_value(v))
    }

    /// Returns all keys with their decoded values.
    pub fn decoded(&self) -> BTreeMap<String, String> {
        self.state
            .data
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), decode_value(v).unwrap_or_default()))
            .collect()
    }

    /// Returns every request seen so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    /// Returns the transaction writes seen so far.
    pub fn txn_requests(&self) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|r| r.is_txn()).collect()
    }

    /// Returns the KV reads seen so far.
    pub fn read_requests(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == Method::GET)
            .collect()
    }

    /// Rejects requests that do not carry this ACL token.
    pub fn require_token(&self, token: &str) {
        *self.state.token.lock() = Some(token.to_string());
    }

    /// Delays every transaction by `latency` before it is applied.
    pub fn set_txn_latency(&self, latency: Duration) {
        *self.state.txn_latency.lock() = latency;
    }

    /// Fails the `n`-th transaction (zero-based) and every later one.
    pub fn fail_transactions_from(&self, n: usize, status: u16, body: &str) {
        *self.state.txn_failure.lock() = Some(InjectedFailure {
            from: n,
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: body.to_string(),
        });
    }

    /// Answers every KV read with `status`.
    pub fn fail_reads(&self, status: u16) {
        *self.state.read_failure.lock() =
            Some(StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
    }

    /// Answers every KV read with 200 and this body.
    pub fn serve_read_body(&self, body: &str) {
        *self.state.read_body.lock() = Some(body.to_string());
    }

    /// Removes every injected fault and latency.
    pub fn clear_faults(&self) {
        *self.state.txn_latency.lock() = Duration::ZERO;
        *self.state.txn_failure.lock() = None;
        *self.state.read_failure.lock() = None;
        *self.state.read_body.lock() = None;
    }

    /// Number of transactions currently being processed.
    pub fn txn_in_flight(&self) -> usize {
        self.state.txn_in_flight.load(Ordering::SeqCst)
    }

    /// Blocks until a transaction is in flight or `timeout` elapses.
    pub fn wait_for_txn_in_flight(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while std::time::Instant::now() < deadline {
            if self.txn_in_flight() > 0 {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }
}

impl Drop for FakeConsul {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn router(state: Arc<FakeState>) -> Router {
    Router::new()
        .route("/v1/kv/", get(kv_root))
        .route("/v1/kv/*key", get(kv_key))
        .route("/v1/txn", put(txn))
        .with_state(state)
}

fn token_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Consul-Token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn authorized(state: &FakeState, token: &Option<String>) -> bool {
    match &*state.token.lock() {
        Some(required) => token.as_deref() == Some(required.as_str()),
        None => true,
    }
}

async fn kv_root(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    read(&state, String::new(), headers, query)
}

async fn kv_key(
    State(state): State<Arc<FakeState>>,
    Path(key): Path<String>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    read(&state, key, headers, query)
}

fn read(state: &FakeState, key: String, headers: HeaderMap, query: Option<String>) -> Response {
    let token = token_of(&headers);
    state.requests.lock().push(RecordedRequest {
        method: Method::GET,
        path: format!("/v1/kv/{}", key),
        query: query.clone(),
        token: token.clone(),
        body_bytes: 0,
        operations: 0,
    });

    if !authorized(state, &token) {
        return (StatusCode::FORBIDDEN, "Permission denied").into_response();
    }
    if let Some(status) = *state.read_failure.lock() {
        return (status, "injected read failure").into_response();
    }
    if let Some(body) = state.read_body.lock().clone() {
        return (StatusCode::OK, body).into_response();
    }

    let recurse = query
        .as_deref()
        .is_some_and(|q| q.split('&').any(|p| p == "recurse" || p.starts_with("recurse=")));

    let pairs: Vec<KvPair> = state
        .data
        .lock()
        .iter()
        .filter(|(k, _)| {
            if recurse {
                k.starts_with(&key)
            } else {
                **k == key
            }
        })
        .map(|(k, v)| KvPair::new(k.clone(), v.clone()))
        .collect();

    if pairs.is_empty() {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(pairs).into_response()
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn txn(State(state): State<Arc<FakeState>>, headers: HeaderMap, body: Bytes) -> Response {
    let token = token_of(&headers);
    let parsed: Result<Vec<TxnOp>, _> = serde_json::from_slice(&body);
    state.requests.lock().push(RecordedRequest {
        method: Method::PUT,
        path: "/v1/txn".into(),
        query: None,
        token: token.clone(),
        body_bytes: body.len(),
        operations: parsed.as_ref().map(Vec::len).unwrap_or(0),
    });

    if !authorized(&state, &token) {
        return (StatusCode::FORBIDDEN, "Permission denied").into_response();
    }

    let _in_flight = InFlight::enter(&state.txn_in_flight);
    let index = state.txn_seen.fetch_add(1, Ordering::SeqCst);

    let latency = *state.txn_latency.lock();
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }

    let failure = state.txn_failure.lock().clone();
    if let Some(failure) = failure.filter(|f| index >= f.from) {
        return (failure.status, failure.body).into_response();
    }

    if body.len() > FAKE_MAX_TXN_BODY {
        return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
    }
    let ops = match parsed {
        Ok(ops) => ops,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, format!("Failed to parse body: {}", e))
                .into_response()
        }
    };
    if ops.len() > MAX_TXN_OPERATIONS {
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            format!(
                "Transaction contains too many operations ({} > {})",
                ops.len(),
                MAX_TXN_OPERATIONS
            ),
        )
            .into_response();
    }
    if let Some(op) = ops
        .iter()
        .find(|op| !matches!(op.kv.verb.as_str(), "set" | "delete"))
    {
        return (
            StatusCode::BAD_REQUEST,
            format!("Unknown KV verb \"{}\"", op.kv.verb),
        )
            .into_response();
    }

    let mut data = state.data.lock();
    for op in &ops {
        if op.kv.verb == "delete" {
            data.remove(&op.kv.key);
        } else {
            data.insert(op.kv.key.clone(), op.kv.value.clone().unwrap_or_default());
        }
    }
    drop(data);

    Json(serde_json::json!({ "Results": [], "Errors": null })).into_response()
}
