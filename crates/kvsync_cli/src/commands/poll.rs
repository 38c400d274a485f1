//! POLL strategy.

use crate::settings::Engine;
use kvsync_engine::{SyncResult, SyncStats};
use tracing::info;

/// Applies on a timer until an error or the iteration bound.
pub fn run(engine: &Engine) -> SyncResult<()> {
    let poll = engine.config().poll;
    info!(
        "POLL: every {}s{}",
        poll.interval.as_secs(),
        poll.max_iterations
            .map(|max| format!(", {} iteration(s)", max))
            .unwrap_or_default()
    );
    let iterations = engine.poll()?;
    info!("{}", finish_line(iterations, &engine.stats()));
    Ok(())
}

fn finish_line(iterations: u64, stats: &SyncStats) -> String {
    format!(
        "POLL: finished after {} iteration(s), {} run(s) completed, {} batch(es) and {} operation(s) committed",
        iterations, stats.runs_completed, stats.batches_committed, stats.operations_applied
    )
}
