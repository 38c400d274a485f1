//! In-memory KV store.

use crate::error::{SyncError, SyncResult};
use crate::http::KvStore;
use kvsync_protocol::{Batch, LiveDataset, Operation, OperationType};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// A [`KvStore`] backed by a map, recording every committed batch.
///
/// Useful for exercising the engine without a network. Commits can be made
/// to fail from a given transaction onward.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<BTreeMap<String, String>>,
    commits: Mutex<Vec<Vec<Operation>>>,
    fetches: Mutex<usize>,
    fail_from_commit: Mutex<Option<usize>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given encoded values.
    pub fn with_data(data: LiveDataset) -> Self {
        let store = Self::new();
        *store.data.lock() = data;
        store
    }

    /// Returns a copy of the stored data.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.data.lock().clone()
    }

    /// Returns the operations of every successful commit, in order.
    pub fn commits(&self) -> Vec<Vec<Operation>> {
        self.commits.lock().clone()
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> usize {
        self.commits.lock().len()
    }

    /// Number of fetches served.
    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock()
    }

    /// Makes the `n`-th commit (zero-based) and every later one fail.
    pub fn fail_from_commit(&self, n: usize) {
        *self.fail_from_commit.lock() = Some(n);
    }
}

impl KvStore for MemoryStore {
    fn fetch(&self, base_path: &str) -> SyncResult<LiveDataset> {
        *self.fetches.lock() += 1;
        let prefix = base_path.trim_start_matches('/');
        Ok(self
            .data
            .lock()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn commit(&self, batch: &Batch) -> SyncResult<()> {
        let mut commits = self.commits.lock();
        if let Some(n) = *self.fail_from_commit.lock() {
            if commits.len() >= n {
                return Err(SyncError::TransactionFailure {
                    status: 500,
                    body: "injected failure".into(),
                });
            }
        }

        let mut data = self.data.lock();
        for op in batch.operations() {
            match op.op_type() {
                OperationType::Delete => {
                    data.remove(op.path());
                }
                OperationType::Insert | OperationType::Update => {
                    data.insert(
                        op.path().to_string(),
                        op.value().unwrap_or_default().to_string(),
                    );
                }
            }
        }
        commits.push(batch.operations().to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvsync_protocol::{plan_batches, BatchLimits, OperationSet};

    #[test]
    fn fetch_filters_by_prefix() {
        let store = MemoryStore::with_data(
            [("apps/a", "eA=="), ("other/b", "eQ==")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        let live = store.fetch("/apps").unwrap();
        assert_eq!(live.len(), 1);
        assert!(live.contains_key("apps/a"));
        assert_eq!(store.fetch_count(), 1);
    }

    #[test]
    fn commit_applies_and_records() {
        let store = MemoryStore::new();
        let ops: OperationSet = vec![Operation::insert("a", "eA=="), Operation::delete("b")]
            .into_iter()
            .collect();
        let batches = plan_batches(&ops, BatchLimits::default()).unwrap();
        store.commit(&batches[0]).unwrap();

        assert_eq!(store.snapshot().get("a").map(String::as_str), Some("eA=="));
        assert_eq!(store.commit_count(), 1);
        assert_eq!(store.commits()[0].len(), 2);
    }

    #[test]
    fn injected_failure() {
        let store = MemoryStore::new();
        store.fail_from_commit(0);
        let ops: OperationSet = std::iter::once(Operation::insert("a", "eA==")).collect();
        let batches = plan_batches(&ops, BatchLimits::default()).unwrap();

        let err = store.commit(&batches[0]).unwrap_err();
        assert!(matches!(err, SyncError::TransactionFailure { status: 500, .. }));
        assert!(store.snapshot().is_empty());
    }
}
