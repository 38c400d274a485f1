//! Server configuration.

use std::net::SocketAddr;

/// Configuration for the hook server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Worker threads of the server runtime. `None` uses one per core.
    pub worker_threads: Option<usize>,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            worker_threads: None,
        }
    }

    /// Sets the number of runtime worker threads.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads.max(1));
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([0, 0, 0, 0], 8000)))
    }
}
