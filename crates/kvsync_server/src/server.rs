//! The hook server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{self, HandlerContext, RUN_PATH};
use axum::routing::any;
use axum::Router;
use kvsync_engine::{KvStore, LocalSource, SyncEngine};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Serves the run endpoint for one engine.
///
/// # Example
///
/// ```no_run
/// use kvsync_engine::{MemoryStore, SyncConfig, SyncEngine};
/// use kvsync_protocol::LocalDataset;
/// use kvsync_server::{HookServer, ServerConfig};
/// use std::sync::Arc;
///
/// let engine = SyncEngine::new(SyncConfig::new(""), MemoryStore::new(), LocalDataset::new());
/// let server = HookServer::new(Arc::new(engine), ServerConfig::default());
/// server.run().unwrap();
/// ```
pub struct HookServer<S: KvStore, L: LocalSource> {
    config: ServerConfig,
    context: Arc<HandlerContext<S, L>>,
}

impl<S, L> HookServer<S, L>
where
    S: KvStore + 'static,
    L: LocalSource + 'static,
{
    /// Creates a server for the given engine.
    pub fn new(engine: Arc<SyncEngine<S, L>>, config: ServerConfig) -> Self {
        Self {
            config,
            context: Arc::new(HandlerContext::new(engine)),
        }
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Builds the router.
    pub fn router(&self) -> Router {
        Router::new()
            .route(RUN_PATH, any(handler::run::<S, L>))
            .fallback(handler::not_found)
            .with_state(Arc::clone(&self.context))
    }

    /// Binds the configured address and serves until the process exits.
    ///
    /// Builds its own runtime, so it must not be called from async code.
    pub fn run(&self) -> ServerResult<()> {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        if let Some(threads) = self.config.worker_threads {
            builder.worker_threads(threads);
        }
        let runtime = builder.enable_all().build().map_err(ServerError::Runtime)?;

        runtime.block_on(async {
            let listener = self.bind().await?;
            self.serve(listener).await
        })
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> ServerResult<TcpListener> {
        let addr = self.config.bind_addr;
        TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Serves on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> ServerResult<()> {
        self.serve_with_shutdown(listener, std::future::pending())
            .await
    }

    /// Serves until `signal` completes. Requests in progress are finished.
    pub async fn serve_with_shutdown<F>(&self, listener: TcpListener, signal: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            info!("hook listening on http://{}{}", addr, RUN_PATH);
        }
        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(ServerError::Serve)
    }
}
