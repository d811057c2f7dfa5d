//! Error types for store operations.

use crate::record::RecordId;
use crate::transaction::{SavepointState, TransactionState};
use crate::types::{SavepointId, TransactionId};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The store cannot be reached.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Description of the outage.
        reason: String,
    },

    /// The transaction has already been committed or aborted.
    #[error("transaction {txid} is not active (state: {state:?})")]
    TransactionNotActive {
        /// The transaction that was used.
        txid: TransactionId,
        /// Its terminal state.
        state: TransactionState,
    },

    /// The transaction was not started by this store.
    #[error("unknown transaction {txid}")]
    UnknownTransaction {
        /// The offending transaction.
        txid: TransactionId,
    },

    /// The savepoint has already been released or rolled back.
    #[error("savepoint {savepoint} is not active (state: {state:?})")]
    SavepointNotActive {
        /// The savepoint that was used.
        savepoint: SavepointId,
        /// Its terminal state.
        state: SavepointState,
    },

    /// The savepoint does not exist in the transaction.
    #[error("unknown savepoint {savepoint} in {txid}")]
    UnknownSavepoint {
        /// The savepoint that was used.
        savepoint: SavepointId,
        /// The transaction it was used against.
        txid: TransactionId,
    },

    /// The savepoint belongs to another transaction.
    #[error("savepoint {savepoint} of {owner} does not belong to {txid}")]
    ForeignSavepoint {
        /// The savepoint that was used.
        savepoint: SavepointId,
        /// The transaction that created it.
        owner: TransactionId,
        /// The transaction it was used against.
        txid: TransactionId,
    },

    /// No record with the given id exists.
    #[error("{entity_type} record {id} not found")]
    RecordNotFound {
        /// Entity type searched.
        entity_type: String,
        /// The missing record id.
        id: RecordId,
    },

    /// A write violated the entity schema.
    #[error("constraint violation on {entity_type}.{field}: {message}")]
    ConstraintViolation {
        /// Entity type written.
        entity_type: String,
        /// Offending field.
        field: String,
        /// What was wrong with it.
        message: String,
    },
}

impl StoreError {
    /// Creates an unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Creates a record not found error.
    pub fn record_not_found(entity_type: impl Into<String>, id: RecordId) -> Self {
        Self::RecordNotFound {
            entity_type: entity_type.into(),
            id,
        }
    }

    /// Creates a constraint violation error.
    pub fn constraint_violation(
        entity_type: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ConstraintViolation {
            entity_type: entity_type.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns true if the error comes from infrastructure rather than data.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Returns true if the error is a misuse of a terminal or foreign handle.
    #[must_use]
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            Self::TransactionNotActive { .. }
                | Self::UnknownTransaction { .. }
                | Self::SavepointNotActive { .. }
                | Self::UnknownSavepoint { .. }
                | Self::ForeignSavepoint { .. }
        )
    }
}
