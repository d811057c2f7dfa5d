//! Transaction boundary.

use crate::config::RunnerConfig;
use crate::error::{RunnerError, RunnerResult};
use crate::handle::TxHandle;
use crate::sequencer::OperationSequence;
use crate::signals::{TransactionEvent, TransactionSignals};
use crate::stats::RunnerStats;
use savepoint_store::{Record, TransactionalStore};
use std::sync::Arc;
use tracing::warn;

/// Runs units of work inside atomic transactions.
///
/// The runner owns nothing but configuration and observers; every
/// [`run_in_transaction`](Self::run_in_transaction) call begins its own
/// transaction, so one runner can be shared by many threads.
///
/// # Example
///
/// ```rust
/// use savepoint_core::TransactionRunner;
/// use savepoint_store::{fields, FieldValue, InMemoryStore};
/// use std::sync::Arc;
///
/// let store = Arc::new(InMemoryStore::new());
/// let runner = TransactionRunner::new(store.clone());
///
/// let student = runner
///     .run_in_transaction(|tx| tx.insert("Student", fields([("name", FieldValue::from("Zhang San"))])))
///     .unwrap();
/// assert_eq!(store.count("Student"), 1);
/// # let _ = student;
/// ```
pub struct TransactionRunner {
    /// Store every transaction runs against.
    store: Arc<dyn TransactionalStore>,
    /// Configuration.
    config: RunnerConfig,
    /// Lifecycle receivers.
    signals: TransactionSignals,
    /// Counters.
    stats: RunnerStats,
}

impl TransactionRunner {
    /// Creates a runner with the default configuration.
    pub fn new(store: Arc<dyn TransactionalStore>) -> Self {
        Self::with_config(store, RunnerConfig::default())
    }

    /// Creates a runner with a custom configuration.
    pub fn with_config(store: Arc<dyn TransactionalStore>, config: RunnerConfig) -> Self {
        Self {
            store,
            config,
            signals: TransactionSignals::new(),
            stats: RunnerStats::new(),
        }
    }

    /// Returns the store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TransactionalStore> {
        &self.store
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Returns the signal registry.
    #[must_use]
    pub fn signals(&self) -> &TransactionSignals {
        &self.signals
    }

    /// Returns the counters.
    #[must_use]
    pub fn stats(&self) -> &RunnerStats {
        &self.stats
    }

    /// Executes `body` within a transaction.
    ///
    /// If `body` returns `Ok`, the transaction is committed and the value
    /// returned. If it returns `Err`, the transaction is aborted and none of
    /// its writes become visible. If the commit itself fails the transaction
    /// is aborted and the commit error returned.
    pub fn run_in_transaction<T, F>(&self, body: F) -> RunnerResult<T>
    where
        F: FnOnce(&mut TxHandle<'_>) -> RunnerResult<T>,
    {
        let txn = self
            .store
            .begin()
            .map_err(|e| RunnerError::from_store("begin", e))?;
        self.stats.record_begin();

        let mut tx = TxHandle::new(
            self.store.as_ref(),
            txn,
            &self.config,
            &self.signals,
            &self.stats,
        );
        self.signals
            .send(&TransactionEvent::Begun { txid: tx.id() });

        let error = match body(&mut tx) {
            Ok(value) => match tx.commit() {
                Ok(_) => return Ok(value),
                Err(err) => err,
            },
            Err(err) => err,
        };

        // Try to abort, but don't mask the original error
        if tx.is_active() {
            if let Err(abort_err) = tx.abort(Some(error.to_string())) {
                warn!(txid = %tx.id(), error = %abort_err, "abort failed");
            }
        }
        Err(error)
    }

    /// Runs a whole sequence as one transaction.
    pub fn run_sequence(&self, sequence: &OperationSequence) -> RunnerResult<Vec<Record>> {
        self.run_in_transaction(|tx| sequence.run(tx))
    }
}

impl std::fmt::Debug for TransactionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionRunner")
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}
