//! Classified changes produced by a diff.

use crate::entry::Entry;

/// Type of change to apply to a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    /// Path exists locally but not in the store.
    Insert,
    /// Path exists on both sides with different values.
    Update,
    /// Path exists in the store but not locally.
    Delete,
}

impl OperationType {
    /// Returns the display name used in reports.
    pub fn name(&self) -> &'static str {
        match self {
            OperationType::Insert => "INSERT",
            OperationType::Update => "UPDATE",
            OperationType::Delete => "DELETE",
        }
    }

    /// Returns the Consul transaction verb.
    pub fn verb(&self) -> &'static str {
        match self {
            OperationType::Insert | OperationType::Update => "set",
            OperationType::Delete => "delete",
        }
    }
}

/// A single classified change.
///
/// For inserts and updates the entry value is base64-encoded; deletes
/// carry an empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    op_type: OperationType,
    entry: Entry,
}

impl Operation {
    /// Creates an insert.
    pub fn insert(path: impl Into<String>, encoded_value: impl Into<String>) -> Self {
        Self {
            op_type: OperationType::Insert,
            entry: Entry::new(path, encoded_value),
        }
    }

    /// Creates an update.
    pub fn update(path: impl Into<String>, encoded_value: impl Into<String>) -> Self {
        Self {
            op_type: OperationType::Update,
            entry: Entry::new(path, encoded_value),
        }
    }

    /// Creates a delete.
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            op_type: OperationType::Delete,
            entry: Entry::path_only(path),
        }
    }

    /// Returns the operation type.
    pub fn op_type(&self) -> OperationType {
        self.op_type
    }

    /// Returns the Consul verb.
    pub fn verb(&self) -> &'static str {
        self.op_type.verb()
    }

    /// Returns the target path.
    pub fn path(&self) -> &str {
        self.entry.path()
    }

    /// Returns the encoded value, or `None` for deletes.
    pub fn value(&self) -> Option<&str> {
        match self.op_type {
            OperationType::Delete => None,
            _ => Some(self.entry.value()),
        }
    }

    /// Returns true if this is a delete.
    pub fn is_delete(&self) -> bool {
        self.op_type == OperationType::Delete
    }
}

/// The ordered operations of one run with precomputed counts.
///
/// Built once through [`OperationSetBuilder`] and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationSet {
    inserts: usize,
    updates: usize,
    deletes: usize,
    operations: Vec<Operation>,
}

impl OperationSet {
    /// Starts building a new set.
    pub fn builder() -> OperationSetBuilder {
        OperationSetBuilder::default()
    }

    /// Returns true if any delete was computed.
    pub fn has_deletes(&self) -> bool {
        self.deletes > 0
    }

    /// Returns true if there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Total number of operations.
    pub fn total(&self) -> usize {
        self.operations.len()
    }

    /// Number of inserts.
    pub fn inserts(&self) -> usize {
        self.inserts
    }

    /// Number of updates.
    pub fn updates(&self) -> usize {
        self.updates
    }

    /// Number of deletes.
    pub fn deletes(&self) -> usize {
        self.deletes
    }

    /// Returns the operations in traversal order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Iterates over operations of one type.
    pub fn of_type(&self, op_type: OperationType) -> impl Iterator<Item = &Operation> {
        self.operations
            .iter()
            .filter(move |op| op.op_type() == op_type)
    }

    /// Returns the paths that would be deleted.
    pub fn delete_paths(&self) -> Vec<String> {
        self.of_type(OperationType::Delete)
            .map(|op| op.path().to_string())
            .collect()
    }
}

/// Accumulates operations and their counts.
#[derive(Debug, Default)]
pub struct OperationSetBuilder {
    set: OperationSet,
}

impl OperationSetBuilder {
    /// Adds an operation, updating the matching counter.
    pub fn push(&mut self, operation: Operation) -> &mut Self {
        match operation.op_type() {
            OperationType::Insert => self.set.inserts += 1,
            OperationType::Update => self.set.updates += 1,
            OperationType::Delete => self.set.deletes += 1,
        }
        self.set.operations.push(operation);
        self
    }

    /// Finishes the set.
    pub fn build(self) -> OperationSet {
        self.set
    }
}

impl FromIterator<Operation> for OperationSet {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        let mut builder = OperationSet::builder();
        for op in iter {
            builder.push(op);
        }
        builder.build()
    }
}
