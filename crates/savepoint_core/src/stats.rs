//! Runner statistics.
//!
//! # Usage
//!
//! ```rust
//! use savepoint_core::TransactionRunner;
//! use savepoint_store::InMemoryStore;
//! use std::sync::Arc;
//!
//! let runner = TransactionRunner::new(Arc::new(InMemoryStore::new()));
//! runner.run_in_transaction(|_tx| Ok(())).unwrap();
//!
//! let stats = runner.stats().snapshot();
//! assert_eq!(stats.transactions_committed, 1);
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a runner.
///
/// All counters are atomic and can be read while transactions are running.
#[derive(Debug, Default)]
pub struct RunnerStats {
    // Transaction counters
    transactions_started: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_aborted: AtomicU64,

    // Savepoint counters
    savepoints_created: AtomicU64,
    savepoints_released: AtomicU64,
    savepoints_rolled_back: AtomicU64,

    // Write counters
    writes_applied: AtomicU64,
    writes_failed: AtomicU64,

    /// Failures swallowed by savepoint guards.
    errors_swallowed: AtomicU64,
}

impl RunnerStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_begin(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abort(&self) {
        self.transactions_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_savepoint(&self) {
        self.savepoints_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_release(&self) {
        self.savepoints_released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.savepoints_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self, ok: bool) {
        if ok {
            self.writes_applied.fetch_add(1, Ordering::Relaxed);
        } else {
            self.writes_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_swallowed(&self) {
        self.errors_swallowed.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            transactions_started: self.transactions_started.load(Ordering::Relaxed),
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_aborted: self.transactions_aborted.load(Ordering::Relaxed),
            savepoints_created: self.savepoints_created.load(Ordering::Relaxed),
            savepoints_released: self.savepoints_released.load(Ordering::Relaxed),
            savepoints_rolled_back: self.savepoints_rolled_back.load(Ordering::Relaxed),
            writes_applied: self.writes_applied.load(Ordering::Relaxed),
            writes_failed: self.writes_failed.load(Ordering::Relaxed),
            errors_swallowed: self.errors_swallowed.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.transactions_started,
            &self.transactions_committed,
            &self.transactions_aborted,
            &self.savepoints_created,
            &self.savepoints_released,
            &self.savepoints_rolled_back,
            &self.writes_applied,
            &self.writes_failed,
            &self.errors_swallowed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time copy of [`RunnerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    /// Transactions begun.
    pub transactions_started: u64,
    /// Transactions committed.
    pub transactions_committed: u64,
    /// Transactions aborted.
    pub transactions_aborted: u64,
    /// Savepoints created.
    pub savepoints_created: u64,
    /// Savepoints released.
    pub savepoints_released: u64,
    /// Rollbacks to a savepoint.
    pub savepoints_rolled_back: u64,
    /// Writes accepted by the store.
    pub writes_applied: u64,
    /// Writes rejected by the store.
    pub writes_failed: u64,
    /// Failures swallowed by savepoint guards.
    pub errors_swallowed: u64,
}

impl StatsSnapshot {
    /// Returns transactions that have neither committed nor aborted.
    #[must_use]
    pub fn transactions_open(&self) -> u64 {
        self.transactions_started
            .saturating_sub(self.transactions_committed + self.transactions_aborted)
    }
}
