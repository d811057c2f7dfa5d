//! Savepoint guard.
//!
//! A guarded block runs behind a savepoint. If it fails, only its own writes
//! are rolled back; what the transaction did before the savepoint stays.
//!
//! ```rust
//! use savepoint_core::{RunnerError, TransactionRunner};
//! use savepoint_store::{fields, FieldValue, InMemoryStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let runner = TransactionRunner::new(store.clone());
//!
//! runner
//!     .run_in_transaction(|tx| {
//!         tx.insert("Student", fields([("name", FieldValue::from("Zhang San"))]))?;
//!         let outcome = tx.with_savepoint(|tx| {
//!             tx.insert("Info", fields([("age", FieldValue::Int(19))]))?;
//!             Err::<(), _>(RunnerError::validation("parse age", "invalid literal"))
//!         })?;
//!         assert!(outcome.is_rolled_back());
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! assert_eq!(store.count("Student"), 1);
//! assert_eq!(store.count("Info"), 0);
//! ```

use crate::config::GuardPolicy;
use crate::error::{RunnerError, RunnerResult};
use crate::handle::TxHandle;
use tracing::{debug, warn};

/// Result of a guarded block that did not propagate an error.
#[derive(Debug)]
#[must_use]
pub enum GuardOutcome<T> {
    /// The block succeeded and its savepoint was released.
    Completed(T),
    /// The block failed; its writes were rolled back and the error swallowed.
    RolledBack {
        /// The swallowed error.
        error: RunnerError,
        /// Number of writes discarded by the rollback.
        discarded: usize,
    },
}

impl<T> GuardOutcome<T> {
    /// Returns true if the block completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Returns true if the block was rolled back.
    #[must_use]
    pub fn is_rolled_back(&self) -> bool {
        matches!(self, Self::RolledBack { .. })
    }

    /// Returns the swallowed error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&RunnerError> {
        match self {
            Self::Completed(_) => None,
            Self::RolledBack { error, .. } => Some(error),
        }
    }

    /// Returns the block's value, discarding a swallowed error.
    pub fn value(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::RolledBack { .. } => None,
        }
    }

    /// Re-raises a swallowed error.
    ///
    /// The rollback already happened; this only decides whether the failure
    /// should now reach the transaction boundary.
    pub fn into_result(self) -> RunnerResult<T> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::RolledBack { error, .. } => Err(error),
        }
    }
}

impl<'r> TxHandle<'r> {
    /// Runs `body` behind a savepoint using the runner's guard policy.
    ///
    /// See [`with_savepoint_policy`](Self::with_savepoint_policy).
    pub fn with_savepoint<T, F>(&mut self, body: F) -> RunnerResult<GuardOutcome<T>>
    where
        F: FnOnce(&mut Self) -> RunnerResult<T>,
    {
        let policy = self.config().guard_policy;
        self.with_savepoint_policy(policy, body)
    }

    /// Runs `body` behind a savepoint.
    ///
    /// - On success the savepoint is released and the writes stay in the
    ///   transaction.
    /// - On a recoverable failure (`Validation`, `Operation`) the transaction
    ///   is rolled back to the savepoint. With [`GuardPolicy::Swallow`] the
    ///   error is returned inside [`GuardOutcome::RolledBack`] and the
    ///   transaction stays active; with [`GuardPolicy::Propagate`] it is
    ///   returned as `Err`.
    /// - Fatal failures (`StoreUnavailable`, `InvalidState`) are always
    ///   returned as `Err`, after a best-effort rollback.
    pub fn with_savepoint_policy<T, F>(
        &mut self,
        policy: GuardPolicy,
        body: F,
    ) -> RunnerResult<GuardOutcome<T>>
    where
        F: FnOnce(&mut Self) -> RunnerResult<T>,
    {
        let savepoint = self.savepoint()?;

        let error = match body(self) {
            Ok(value) => {
                self.release(savepoint)?;
                return Ok(GuardOutcome::Completed(value));
            }
            Err(error) => error,
        };

        if error.is_fatal() {
            if let Err(rollback_err) = self.rollback_with_cause(savepoint, Some(&error)) {
                debug!(txid = %self.id(), savepoint = %savepoint.id(), error = %rollback_err, "rollback after fatal error failed");
            }
            return Err(error);
        }

        let discarded = self.rollback_with_cause(savepoint, Some(&error))?;
        match policy {
            GuardPolicy::Swallow => {
                warn!(
                    txid = %self.id(),
                    savepoint = %savepoint.id(),
                    discarded,
                    error = %error,
                    "guarded block failed, rolled back to savepoint"
                );
                self.record_swallowed();
                Ok(GuardOutcome::RolledBack { error, discarded })
            }
            GuardPolicy::Propagate => Err(error),
        }
    }
}
