//! Operation sequencer.

use crate::error::RunnerResult;
use crate::handle::TxHandle;
use crate::operation::WriteOperation;
use savepoint_store::Record;
use std::fmt;
use tracing::debug;

/// An ordered list of write operations.
///
/// Running a sequence applies each operation in order and stops at the first
/// failure. The error carries the failing operation's label and its step
/// index. Wrap the run in
/// [`TxHandle::with_savepoint`](crate::TxHandle::with_savepoint) to contain
/// the failure.
///
/// # Example
///
/// ```rust
/// use savepoint_core::{CreateRecord, OperationSequence, TransactionRunner};
/// use savepoint_store::{fields, FieldValue, InMemoryStore};
/// use std::sync::Arc;
///
/// let store = Arc::new(InMemoryStore::new());
/// let runner = TransactionRunner::new(store.clone());
///
/// let sequence = OperationSequence::new()
///     .then(CreateRecord::new("Info", fields([("age", FieldValue::Int(19))])))
///     .then(CreateRecord::new("Address", fields([("home", FieldValue::from("Beijing"))])));
///
/// let records = runner.run_sequence(&sequence).unwrap();
/// assert_eq!(records.len(), 2);
/// ```
#[derive(Default)]
pub struct OperationSequence {
    operations: Vec<Box<dyn WriteOperation>>,
}

impl OperationSequence {
    /// Creates an empty sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an operation.
    pub fn push<O>(&mut self, operation: O) -> &mut Self
    where
        O: WriteOperation + 'static,
    {
        self.operations.push(Box::new(operation));
        self
    }

    /// Appends an operation, returning the sequence.
    #[must_use]
    pub fn then<O>(mut self, operation: O) -> Self
    where
        O: WriteOperation + 'static,
    {
        self.push(operation);
        self
    }

    /// Returns the number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if the sequence has no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns the operation labels in order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.operations.iter().map(|op| op.label()).collect()
    }

    /// Applies every operation in order, returning the produced records.
    ///
    /// # Errors
    ///
    /// Returns the first failure, tagged with the failing step. Operations
    /// after it are not attempted; writes of earlier operations stay in the
    /// transaction.
    pub fn run(&self, tx: &mut TxHandle<'_>) -> RunnerResult<Vec<Record>> {
        let mut records = Vec::with_capacity(self.operations.len());
        for (step, operation) in self.operations.iter().enumerate() {
            match tx.apply(operation.as_ref()) {
                Ok(record) => records.push(record),
                Err(err) => {
                    debug!(txid = %tx.id(), step, error = %err, "sequence stopped");
                    return Err(err.at_step(step));
                }
            }
        }
        Ok(records)
    }
}

impl fmt::Debug for OperationSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.labels()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunnerError;
    use crate::operation::{CreateRecord, FnOperation, UpdateRecord};
    use crate::runner::TransactionRunner;
    use savepoint_store::{fields, FieldValue, Fields, InMemoryStore, RecordId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn create(entity_type: &str) -> CreateRecord {
        CreateRecord::new(entity_type, fields([("n", FieldValue::Int(1))]))
    }

    #[test]
    fn runs_in_order() {
        let store = Arc::new(InMemoryStore::new());
        let runner = TransactionRunner::new(store.clone());
        let sequence = OperationSequence::new().then(create("A")).then(create("B"));

        let records = runner.run_sequence(&sequence).unwrap();
        assert_eq!(records[0].entity_type, "A");
        assert_eq!(records[1].entity_type, "B");
        assert_eq!(sequence.labels(), vec!["create A", "create B"]);
    }

    #[test]
    fn stops_at_first_failure() {
        let store = Arc::new(InMemoryStore::new());
        let runner = TransactionRunner::new(store.clone());
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);

        let mut sequence = OperationSequence::new();
        sequence
            .push(create("A"))
            .push(UpdateRecord::new("A", RecordId::new(), fields([("n", FieldValue::Int(2))])))
            .push(FnOperation::new("count", move |tx: &mut TxHandle<'_>| {
                counter.fetch_add(1, Ordering::SeqCst);
                tx.insert("C", Fields::new())
            }));

        let err = runner.run_sequence(&sequence).unwrap_err();
        assert!(matches!(err, RunnerError::Operation { step: Some(1), .. }));
        assert!(err.operation().unwrap().starts_with("update A"));
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
        // unguarded failure aborts the whole transaction
        assert_eq!(store.total_count(), 0);
    }

    #[test]
    fn empty_sequence_is_ok() {
        let runner = TransactionRunner::new(Arc::new(InMemoryStore::new()));
        let sequence = OperationSequence::new();
        assert!(sequence.is_empty());
        assert!(runner.run_sequence(&sequence).unwrap().is_empty());
    }

    #[test]
    fn debug_lists_labels() {
        let sequence = OperationSequence::new().then(create("A"));
        assert_eq!(format!("{sequence:?}"), "[\"create A\"]");
    }
}
