//! The sync engine: fetch, diff, and batched apply.

use crate::busy::BusySignal;
use crate::config::SyncConfig;
use crate::diff::diff;
use crate::error::{SyncError, SyncResult};
use crate::http::KvStore;
use crate::report::{Reporter, SilentReporter};
use crate::source::LocalSource;
use kvsync_protocol::{plan_batches, DeletePolicy, Operation, OperationSet, OperationType};
use kvsync_source::SecretsMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Outcome of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Inserts planned (dry run) or committed.
    pub inserts: usize,
    /// Updates planned or committed.
    pub updates: usize,
    /// Deletes planned or committed.
    pub deletes: usize,
    /// Number of transactions planned or committed.
    pub batches: usize,
    /// False for a dry run.
    pub committed: bool,
    /// Wall time of the run.
    pub duration: Duration,
}

impl RunSummary {
    /// Total operations.
    pub fn total(&self) -> usize {
        self.inserts + self.updates + self.deletes
    }

    /// Returns true if the store was already in sync.
    pub fn is_noop(&self) -> bool {
        self.total() == 0
    }
}

/// Counters across the runs of one engine.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Runs that finished without error, dry runs included.
    pub runs_completed: u64,
    /// Runs that ended with an error.
    pub runs_failed: u64,
    /// Transactions committed.
    pub batches_committed: u64,
    /// Operations committed.
    pub operations_applied: u64,
    /// End of the last run.
    pub last_run: Option<Instant>,
    /// Error of the last failed run, cleared by a successful one.
    pub last_error: Option<String>,
}

/// Converges a KV prefix onto a local dataset.
///
/// Each run reads the local dataset and the live prefix from scratch; no
/// state carries over between runs apart from [`SyncStats`].
pub struct SyncEngine<S: KvStore, L: LocalSource> {
    config: SyncConfig,
    store: S,
    source: L,
    secrets: Option<SecretsMap>,
    reporter: Box<dyn Reporter>,
    busy: Arc<BusySignal>,
    stats: RwLock<SyncStats>,
}

impl<S: KvStore, L: LocalSource> SyncEngine<S, L> {
    /// Creates a new engine with a silent reporter and its own busy signal.
    pub fn new(config: SyncConfig, store: S, source: L) -> Self {
        Self {
            config,
            store,
            source,
            secrets: None,
            reporter: Box::new(SilentReporter),
            busy: Arc::new(BusySignal::new()),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Renders local values against `secrets` before diffing.
    pub fn with_secrets(mut self, secrets: SecretsMap) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Sets the reporter.
    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// Shares a busy signal, typically with the shutdown watcher.
    pub fn with_busy_signal(mut self, busy: Arc<BusySignal>) -> Self {
        self.busy = busy;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the busy signal raised around the apply loop.
    pub fn busy_signal(&self) -> &Arc<BusySignal> {
        &self.busy
    }

    /// Returns the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Reads both datasets and computes the operations. Never writes.
    pub fn plan(&self) -> SyncResult<OperationSet> {
        debug!("reading local dataset");
        let local = self.source.produce()?;
        debug!(entries = local.len(), "local dataset read");

        let live = self.store.fetch(&self.config.base_path)?;
        debug!(entries = live.len(), "live dataset read");

        diff(
            &live,
            &local,
            self.config.delete_policy,
            self.secrets.as_ref(),
        )
    }

    /// Computes and reports the batches a real run would send.
    pub fn dry_run(&self) -> SyncResult<RunSummary> {
        let start = Instant::now();
        let result = self.plan().and_then(|ops| {
            if ops.is_empty() {
                info!("No operations to process, all synced");
                return Ok(RunSummary::default());
            }

            let batches = plan_batches(&ops, self.config.batch_limits)?;
            for (i, batch) in batches.iter().enumerate() {
                self.reporter.batch(i + 1, batch, false);
            }

            Ok(RunSummary {
                inserts: ops.inserts(),
                updates: ops.updates(),
                deletes: ops.deletes(),
                batches: batches.len(),
                committed: false,
                duration: Duration::ZERO,
            })
        });
        self.finish(result, start)
    }

    /// Computes the operations and applies them.
    pub fn apply(&self) -> SyncResult<RunSummary> {
        let start = Instant::now();
        let result = self.plan().and_then(|ops| self.commit_operations(&ops));
        self.finish(result, start)
    }

    /// Applies an already computed operation set.
    ///
    /// With [`DeletePolicy::Deny`] any delete aborts before the first write.
    /// Otherwise the busy signal is raised for the whole batch loop. A
    /// failing transaction ends the run; earlier transactions stay applied.
    pub fn apply_operations(&self, ops: &OperationSet) -> SyncResult<RunSummary> {
        let start = Instant::now();
        let result = self.commit_operations(ops);
        self.finish(result, start)
    }

    fn commit_operations(&self, ops: &OperationSet) -> SyncResult<RunSummary> {
        if self.config.delete_policy == DeletePolicy::Deny && ops.has_deletes() {
            error!("stopping: there are deletes and deletes are not allowed");
            error!("the following paths would be deleted");
            let deletes: Vec<Operation> = ops.of_type(OperationType::Delete).cloned().collect();
            for op in &deletes {
                error!(path = %op.path(), "blocked delete");
            }
            self.reporter.blocked_deletes(&deletes);
            return Err(SyncError::DeleteNotAllowed {
                paths: ops.delete_paths(),
            });
        }

        if ops.is_empty() {
            info!("No operations to process, all synced");
            return Ok(RunSummary {
                committed: true,
                ..RunSummary::default()
            });
        }

        let batches = plan_batches(ops, self.config.batch_limits)?;
        let mut summary = RunSummary {
            committed: true,
            ..RunSummary::default()
        };

        {
            let _busy = self.busy.enter()?;
            for (i, batch) in batches.iter().enumerate() {
                self.store.commit(batch)?;

                for op in batch.operations() {
                    info!("Operation: {} Path: {}", op.verb(), op.path());
                }
                self.reporter.batch(i + 1, batch, true);

                summary.inserts += batch.count(OperationType::Insert);
                summary.updates += batch.count(OperationType::Update);
                summary.deletes += batch.count(OperationType::Delete);
                summary.batches += 1;

                let mut stats = self.stats.write();
                stats.batches_committed += 1;
                stats.operations_applied += batch.len() as u64;
            }
        }

        info!(
            "Finished: {} Inserts, {} Updates {} Deletes",
            summary.inserts, summary.updates, summary.deletes
        );
        Ok(summary)
    }

    /// Applies repeatedly, pausing `config.poll.interval` between runs.
    ///
    /// The first failing run ends the loop. Returns the number of
    /// iterations once a configured bound is reached.
    pub fn poll(&self) -> SyncResult<u64> {
        let poll = self.config.poll;
        let mut iteration = 0u64;
        loop {
            if self.busy.is_closed() {
                return Err(SyncError::Interrupted);
            }

            iteration += 1;
            debug!("POLL: performing iteration {}", iteration);
            self.apply()?;

            if poll.is_exhausted(iteration) {
                return Ok(iteration);
            }
            std::thread::sleep(poll.interval);
        }
    }

    fn finish(&self, result: SyncResult<RunSummary>, start: Instant) -> SyncResult<RunSummary> {
        let mut stats = self.stats.write();
        stats.last_run = Some(Instant::now());
        match result {
            Ok(mut summary) => {
                summary.duration = start.elapsed();
                stats.runs_completed += 1;
                stats.last_error = None;
                Ok(summary)
            }
            Err(e) => {
                stats.runs_failed += 1;
                stats.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}
