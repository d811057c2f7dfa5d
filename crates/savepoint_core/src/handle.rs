//! Transaction handle passed to transaction bodies.

use crate::config::RunnerConfig;
use crate::error::{RunnerError, RunnerResult};
use crate::operation::WriteOperation;
use crate::signals::{TransactionEvent, TransactionSignals};
use crate::stats::RunnerStats;
use savepoint_store::{
    Fields, Record, RecordId, Savepoint, SequenceNumber, Transaction, TransactionId,
    TransactionState, TransactionalStore,
};
use tracing::{debug, warn};

/// A live transaction together with the store it runs against.
///
/// Handles are created by
/// [`TransactionRunner::run_in_transaction`](crate::TransactionRunner::run_in_transaction)
/// and lent to the transaction body. Every write goes through the handle, so
/// the transaction is always explicit. The boundary owns commit and abort; a
/// handle dropped while still active (for example during a panic) aborts.
pub struct TxHandle<'r> {
    store: &'r dyn TransactionalStore,
    txn: Transaction,
    config: &'r RunnerConfig,
    signals: &'r TransactionSignals,
    stats: &'r RunnerStats,
}

impl<'r> TxHandle<'r> {
    pub(crate) fn new(
        store: &'r dyn TransactionalStore,
        txn: Transaction,
        config: &'r RunnerConfig,
        signals: &'r TransactionSignals,
        stats: &'r RunnerStats,
    ) -> Self {
        Self {
            store,
            txn,
            config,
            signals,
            stats,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.txn.id()
    }

    /// Returns the transaction state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.txn.state()
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.txn.is_active()
    }

    /// Returns the underlying transaction.
    #[must_use]
    pub fn transaction(&self) -> &Transaction {
        &self.txn
    }

    /// Returns the store the transaction runs against.
    #[must_use]
    pub fn store(&self) -> &'r dyn TransactionalStore {
        self.store
    }

    /// Returns the runner configuration.
    #[must_use]
    pub fn config(&self) -> &'r RunnerConfig {
        self.config
    }

    /// Returns the number of nested active savepoints.
    #[must_use]
    pub fn savepoint_depth(&self) -> usize {
        self.txn.savepoint_depth()
    }

    /// Returns the number of writes pending in the transaction.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.txn.write_count()
    }

    // ========== Writes ==========

    /// Inserts a record.
    pub fn insert(&mut self, entity_type: &str, fields: Fields) -> RunnerResult<Record> {
        let result = self.store.insert(&mut self.txn, entity_type, fields);
        self.finish_write(result, || format!("insert {entity_type}"))
    }

    /// Merges fields into an existing record.
    pub fn update(
        &mut self,
        entity_type: &str,
        id: RecordId,
        fields: Fields,
    ) -> RunnerResult<Record> {
        let result = self.store.update(&mut self.txn, entity_type, id, fields);
        self.finish_write(result, || format!("update {entity_type} {id}"))
    }

    /// Deletes a record and returns its last visible version.
    pub fn delete(&mut self, entity_type: &str, id: RecordId) -> RunnerResult<Record> {
        let result = self.store.delete(&mut self.txn, entity_type, id);
        self.finish_write(result, || format!("delete {entity_type} {id}"))
    }

    /// Reads a record as seen by this transaction.
    pub fn get(&self, entity_type: &str, id: RecordId) -> RunnerResult<Option<Record>> {
        self.store
            .get(&self.txn, entity_type, id)
            .map_err(|e| RunnerError::from_store(format!("get {entity_type} {id}"), e))
    }

    /// Validates and applies a write operation.
    ///
    /// Errors are attributed to the operation's label.
    pub fn apply(&mut self, operation: &dyn WriteOperation) -> RunnerResult<Record> {
        let label = operation.label();
        let result = operation
            .validate()
            .and_then(|()| operation.apply(self))
            .map_err(|e| e.for_operation(label.as_str()));

        if self.config.trace_operations {
            match &result {
                Ok(record) => debug!(txid = %self.id(), operation = %label, id = %record.id, "operation applied"),
                Err(err) => debug!(txid = %self.id(), operation = %label, error = %err, "operation failed"),
            }
        }
        result
    }

    fn finish_write(
        &self,
        result: savepoint_store::StoreResult<Record>,
        label: impl FnOnce() -> String,
    ) -> RunnerResult<Record> {
        self.stats.record_write(result.is_ok());
        result.map_err(|e| RunnerError::from_store(label(), e))
    }

    // ========== Savepoints ==========

    /// Creates a savepoint.
    ///
    /// Fails with `InvalidState` if the configured depth limit is reached.
    pub fn savepoint(&mut self) -> RunnerResult<Savepoint> {
        let max = self.config.max_savepoint_depth;
        if max > 0 && self.txn.savepoint_depth() >= max {
            return Err(RunnerError::invalid_state(format!(
                "savepoint depth limit of {max} reached in {}",
                self.id()
            )));
        }

        let savepoint = self
            .store
            .savepoint(&mut self.txn)
            .map_err(|e| RunnerError::from_store("savepoint", e))?;
        self.stats.record_savepoint();
        self.signals.send(&TransactionEvent::SavepointCreated {
            txid: self.id(),
            savepoint: savepoint.id(),
            depth: savepoint.depth(),
        });
        Ok(savepoint)
    }

    /// Releases a savepoint, keeping its writes.
    pub fn release(&mut self, savepoint: Savepoint) -> RunnerResult<()> {
        self.store
            .release(&mut self.txn, savepoint)
            .map_err(|e| RunnerError::from_store("release savepoint", e))?;
        self.stats.record_release();
        self.signals.send(&TransactionEvent::SavepointReleased {
            txid: self.id(),
            savepoint: savepoint.id(),
        });
        Ok(())
    }

    /// Rolls back to a savepoint and returns the number of discarded writes.
    ///
    /// Rolling back to an already released or rolled back savepoint is an
    /// `InvalidState` error.
    pub fn rollback_to(&mut self, savepoint: Savepoint) -> RunnerResult<usize> {
        self.rollback_with_cause(savepoint, None)
    }

    pub(crate) fn rollback_with_cause(
        &mut self,
        savepoint: Savepoint,
        cause: Option<&RunnerError>,
    ) -> RunnerResult<usize> {
        let discarded = self
            .store
            .rollback_to(&mut self.txn, savepoint)
            .map_err(|e| RunnerError::from_store("rollback to savepoint", e))?;
        self.stats.record_rollback();
        self.signals.send(&TransactionEvent::SavepointRolledBack {
            txid: self.id(),
            savepoint: savepoint.id(),
            discarded,
            error: cause.map(ToString::to_string),
        });
        Ok(discarded)
    }

    pub(crate) fn record_swallowed(&self) {
        self.stats.record_swallowed();
    }

    // ========== Boundary ==========

    pub(crate) fn commit(&mut self) -> RunnerResult<SequenceNumber> {
        let sequence = self
            .store
            .commit(&mut self.txn)
            .map_err(|e| RunnerError::from_store("commit", e))?;
        self.stats.record_commit();
        self.signals.send(&TransactionEvent::Committed {
            txid: self.id(),
            sequence,
        });
        Ok(sequence)
    }

    pub(crate) fn abort(&mut self, reason: Option<String>) -> RunnerResult<()> {
        self.store
            .abort(&mut self.txn)
            .map_err(|e| RunnerError::from_store("abort", e))?;
        self.stats.record_abort();
        self.signals.send(&TransactionEvent::Aborted {
            txid: self.id(),
            reason,
        });
        Ok(())
    }
}

impl Drop for TxHandle<'_> {
    fn drop(&mut self) {
        if self.txn.is_active() {
            warn!(txid = %self.id(), "transaction handle dropped while active, aborting");
            if let Err(err) = self.abort(Some("handle dropped while active".to_string())) {
                warn!(txid = %self.id(), error = %err, "abort on drop failed");
            }
        }
    }
}

impl std::fmt::Debug for TxHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxHandle")
            .field("txn", &self.txn)
            .finish_non_exhaustive()
    }
}
