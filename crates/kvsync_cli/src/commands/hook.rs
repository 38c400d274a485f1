//! HOOK strategy.

use crate::settings::Engine;
use kvsync_engine::SyncResult;
use kvsync_server::{HookServer, ServerConfig, RUN_PATH};
use std::sync::Arc;
use tracing::info;

/// Serves the run endpoint until the process is stopped.
pub fn run(engine: Engine, config: ServerConfig) -> SyncResult<()> {
    info!("Listening on http://{}{}", config.bind_addr, RUN_PATH);
    HookServer::new(Arc::new(engine), config).run()?;
    Ok(())
}
