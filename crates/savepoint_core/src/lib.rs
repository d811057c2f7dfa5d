//! # Savepoint Core
//!
//! Savepoint-scoped transaction runner.
//!
//! This crate provides:
//! - [`TransactionRunner`], the transaction boundary: begin, run a body,
//!   commit on success, abort on error
//! - [`TxHandle`], the explicit transaction handle lent to the body
//! - Savepoint guards ([`TxHandle::with_savepoint`]) that roll back a failed
//!   block without aborting the transaction
//! - [`OperationSequence`], an ordered list of [`WriteOperation`]s that
//!   stops at the first failure
//! - Lifecycle [`TransactionSignals`] and [`RunnerStats`]
//!
//! ## Example
//!
//! ```rust
//! use savepoint_core::{parse_int_field, CreateRecord, FnOperation, OperationSequence, TransactionRunner};
//! use savepoint_store::{fields, FieldValue, InMemoryStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let runner = TransactionRunner::new(store.clone());
//!
//! let details = OperationSequence::new()
//!     .then(CreateRecord::new("Info", fields([("age", FieldValue::Int(19))])))
//!     .then(FnOperation::new("convert age", |tx| {
//!         let age = parse_int_field("convert age", "age", "abc")?;
//!         tx.insert("Info", fields([("age", FieldValue::Int(age))]))
//!     }))
//!     .then(CreateRecord::new("Address", fields([("home", FieldValue::from("Beijing"))])));
//!
//! runner
//!     .run_in_transaction(|tx| {
//!         tx.insert("Student", fields([("name", FieldValue::from("Zhang San"))]))?;
//!         let outcome = tx.with_savepoint(|tx| details.run(tx))?;
//!         assert!(outcome.is_rolled_back());
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! assert_eq!(store.count("Student"), 1);
//! assert_eq!(store.count("Info"), 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod guard;
mod handle;
mod operation;
mod runner;
mod sequencer;
mod signals;
mod stats;

pub use config::{GuardPolicy, RunnerConfig};
pub use error::{RunnerError, RunnerResult};
pub use guard::GuardOutcome;
pub use handle::TxHandle;
pub use operation::{
    parse_int_field, CreateRecord, DeleteRecord, FnOperation, UpdateRecord, WriteOperation,
};
pub use runner::TransactionRunner;
pub use sequencer::OperationSequence;
pub use signals::{TransactionEvent, TransactionSignals};
pub use stats::{RunnerStats, StatsSnapshot};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
