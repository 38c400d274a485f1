//! # kvsync Protocol
//!
//! Data types shared by every kvsync crate.
//!
//! This crate provides:
//! - `Entry`, `LocalDataset` and `LiveDataset` for the two sides of a sync
//! - `Operation` and `OperationSet` for the classified changes of one run
//! - `DeletePolicy` for the stance toward live-only paths
//! - Consul wire records (`KvPair`, `TxnOp`)
//! - `Batch` and `plan_batches` for size/count-bounded transactions
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod entry;
mod error;
mod operation;
mod policy;
mod wire;

pub use batch::{plan_batches, Batch, BatchLimits, MAX_TXN_OPERATIONS, MAX_TXN_PAYLOAD_BYTES};
pub use entry::{decode_value, encode_value, Entry, LiveDataset, LocalDataset};
pub use error::{ProtocolError, ProtocolResult};
pub use operation::{Operation, OperationSet, OperationSetBuilder, OperationType};
pub use policy::DeletePolicy;
pub use wire::{KvPair, TxnKv, TxnOp};
