//! DRYRUN strategy.

use crate::settings::Engine;
use kvsync_engine::SyncResult;
use tracing::info;

/// Reports what a run would do without writing.
pub fn run(engine: &Engine) -> SyncResult<()> {
    let summary = engine.dry_run()?;
    info!(
        "Dry run: {} Inserts, {} Updates {} Deletes in {} transaction(s)",
        summary.inserts, summary.updates, summary.deletes, summary.batches
    );
    Ok(())
}
