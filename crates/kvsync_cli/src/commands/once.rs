//! ONCE strategy.

use crate::settings::Engine;
use kvsync_engine::SyncResult;

/// Applies once.
pub fn run(engine: &Engine) -> SyncResult<()> {
    engine.apply().map(|_| ())
}
