//! Size- and count-bounded transaction batches.
//!
//! Consul rejects a transaction with more than 64 operations or a body
//! above 512 KiB. Batches are filled greedily in operation order: before an
//! operation is added, the size of the batch *including* that operation is
//! computed; if it would exceed the payload limit, or the batch is already
//! at the operation limit, the batch is closed and a new one started.

use crate::error::ProtocolResult;
use crate::operation::{Operation, OperationSet, OperationType};
use crate::wire::TxnOp;

/// Maximum operations Consul accepts in one transaction.
pub const MAX_TXN_OPERATIONS: usize = 64;

/// Maximum serialized transaction body, kept under Consul's 512 KiB ceiling.
pub const MAX_TXN_PAYLOAD_BYTES: usize = 500_000;

/// Bounds applied while planning batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    /// Maximum operations per batch.
    pub max_operations: usize,
    /// Maximum serialized JSON bytes per batch.
    pub max_payload_bytes: usize,
}

impl BatchLimits {
    /// Creates custom limits. An operation limit of zero is treated as one.
    pub fn new(max_operations: usize, max_payload_bytes: usize) -> Self {
        Self {
            max_operations: max_operations.max(1),
            max_payload_bytes,
        }
    }
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self::new(MAX_TXN_OPERATIONS, MAX_TXN_PAYLOAD_BYTES)
    }
}

/// An ordered group of operations sent as one transaction.
///
/// Each operation is serialized once when it is added; the request body is
/// those records joined into a JSON array, so `payload_size` is exact.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    operations: Vec<Operation>,
    records: Vec<Vec<u8>>,
    payload_size: usize,
}

impl Batch {
    fn size_with(&self, record_len: usize) -> usize {
        if self.records.is_empty() {
            // "[" record "]"
            record_len + 2
        } else {
            // existing body plus "," and the record
            self.payload_size + record_len + 1
        }
    }

    fn push(&mut self, operation: Operation, record: Vec<u8>) {
        self.payload_size = self.size_with(record.len());
        self.operations.push(operation);
        self.records.push(record);
    }

    /// Returns the operations of this batch.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if the batch holds no operation.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Exact size of [`Batch::payload`] in bytes.
    pub fn payload_size(&self) -> usize {
        if self.records.is_empty() {
            2
        } else {
            self.payload_size
        }
    }

    /// Counts operations of one type.
    pub fn count(&self, op_type: OperationType) -> usize {
        self.operations
            .iter()
            .filter(|op| op.op_type() == op_type)
            .count()
    }

    /// Builds the JSON array body for `PUT /v1/txn`.
    pub fn payload(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(self.payload_size());
        body.push(b'[');
        for (i, record) in self.records.iter().enumerate() {
            if i > 0 {
                body.push(b',');
            }
            body.extend_from_slice(record);
        }
        body.push(b']');
        body
    }
}

/// Partitions an operation set into transaction batches.
///
/// Operation order is preserved across and within batches. An operation
/// whose record alone exceeds the payload limit is placed in a batch of its
/// own and left for the store to reject.
pub fn plan_batches(ops: &OperationSet, limits: BatchLimits) -> ProtocolResult<Vec<Batch>> {
    let mut batches = Vec::new();
    let mut current = Batch::default();

    for op in ops.operations() {
        let record = serde_json::to_vec(&TxnOp::from(op))?;

        let over_size = current.size_with(record.len()) > limits.max_payload_bytes;
        let at_count = current.len() >= limits.max_operations;
        if !current.is_empty() && (over_size || at_count) {
            batches.push(std::mem::take(&mut current));
        }

        current.push(op.clone(), record);
    }

    if !current.is_empty() {
        batches.push(current);
    }

    Ok(batches)
}
