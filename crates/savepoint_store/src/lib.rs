//! # Savepoint Store
//!
//! Transactional store abstraction for the savepoint runner.
//!
//! This crate provides the lowest layer: a [`TransactionalStore`] trait with
//! begin/commit/abort and nested savepoints, the [`Transaction`] and
//! [`Savepoint`] state machines every store shares, and an
//! [`InMemoryStore`] implementation.
//!
//! ## Design Principles
//!
//! - Transactions are explicit values threaded through every call
//! - Writes are buffered per transaction and applied atomically on commit
//! - A savepoint is a mark into the transaction's write log
//! - Terminal transactions and savepoints reject further use
//!
//! ## Example
//!
//! ```rust
//! use savepoint_store::{fields, FieldValue, InMemoryStore, TransactionalStore};
//!
//! let store = InMemoryStore::new();
//! let mut txn = store.begin().unwrap();
//! store.insert(&mut txn, "Student", fields([("name", FieldValue::from("Zhang San"))])).unwrap();
//!
//! let sp = store.savepoint(&mut txn).unwrap();
//! store.insert(&mut txn, "Info", fields([("age", FieldValue::Int(19))])).unwrap();
//! store.rollback_to(&mut txn, sp).unwrap();
//!
//! store.commit(&mut txn).unwrap();
//! assert_eq!(store.count("Student"), 1);
//! assert_eq!(store.count("Info"), 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod record;
mod schema;
mod store;
mod transaction;
mod types;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use record::{fields, FieldValue, Fields, Record, RecordId};
pub use schema::{EntitySchema, FieldKind, FieldSpec};
pub use store::TransactionalStore;
pub use transaction::{
    PendingWrite, Savepoint, SavepointState, Transaction, TransactionLease, TransactionState,
};
pub use types::{SavepointId, SequenceNumber, TransactionId};
