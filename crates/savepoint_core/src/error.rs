//! Error types for the transaction runner.

use savepoint_store::StoreError;
use thiserror::Error;

/// Result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors surfaced by the transaction runner.
///
/// `Validation` and `Operation` are recoverable: a savepoint guard may roll
/// back and continue. `StoreUnavailable` and `InvalidState` are fatal and
/// always reach the transaction boundary.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Bad input to an operation. Never retried.
    #[error("validation failed for {operation}: {message}")]
    Validation {
        /// Label of the failing operation.
        operation: String,
        /// Position of the operation in its sequence, if run by one.
        step: Option<usize>,
        /// What was wrong with the input.
        message: String,
    },

    /// The store rejected a write.
    #[error("operation {operation} failed: {source}")]
    Operation {
        /// Label of the failing operation.
        operation: String,
        /// Position of the operation in its sequence, if run by one.
        step: Option<usize>,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },

    /// The store could not be reached.
    #[error(transparent)]
    StoreUnavailable(StoreError),

    /// A transaction or savepoint was used in a state that forbids it.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the misuse.
        message: String,
        /// Store error that reported it, if any.
        #[source]
        source: Option<StoreError>,
    },
}

impl RunnerError {
    /// Classifies a store error raised while running `operation`.
    pub fn from_store(operation: impl Into<String>, err: StoreError) -> Self {
        if err.is_unavailable() {
            Self::StoreUnavailable(err)
        } else if err.is_state_error() {
            Self::InvalidState {
                message: err.to_string(),
                source: Some(err),
            }
        } else {
            Self::Operation {
                operation: operation.into(),
                step: None,
                source: err,
            }
        }
    }

    /// Creates a validation error.
    pub fn validation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            operation: operation.into(),
            step: None,
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true if a savepoint guard may roll back and continue.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Operation { .. })
    }

    /// Returns true if the error must abort the whole transaction.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns the label of the failing operation, if known.
    #[must_use]
    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::Validation { operation, .. } | Self::Operation { operation, .. } => {
                Some(operation.as_str())
            }
            _ => None,
        }
    }

    /// Returns the sequence step of the failing operation, if known.
    #[must_use]
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::Validation { step, .. } | Self::Operation { step, .. } => *step,
            _ => None,
        }
    }

    /// Attributes the error to an operation label.
    #[must_use]
    pub fn for_operation(mut self, label: impl Into<String>) -> Self {
        if let Self::Validation { operation, .. } | Self::Operation { operation, .. } = &mut self {
            *operation = label.into();
        }
        self
    }

    /// Records the sequence step, keeping the innermost one if already set.
    #[must_use]
    pub fn at_step(mut self, index: usize) -> Self {
        if let Self::Validation { step, .. } | Self::Operation { step, .. } = &mut self {
            step.get_or_insert(index);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use savepoint_store::{RecordId, SavepointId, SavepointState};

    #[test]
    fn classifies_store_errors() {
        let unavailable = RunnerError::from_store("insert X", StoreError::unavailable("down"));
        assert!(matches!(unavailable, RunnerError::StoreUnavailable(_)));
        assert!(unavailable.is_fatal());

        let state = RunnerError::from_store(
            "rollback",
            StoreError::SavepointNotActive {
                savepoint: SavepointId::new(1),
                state: SavepointState::Released,
            },
        );
        assert!(matches!(state, RunnerError::InvalidState { source: Some(_), .. }));

        let rejected =
            RunnerError::from_store("update X", StoreError::record_not_found("X", RecordId::new()));
        assert!(rejected.is_recoverable());
        assert_eq!(rejected.operation(), Some("update X"));
    }

    #[test]
    fn relabels_and_keeps_first_step() {
        let err = RunnerError::validation("insert Info", "bad")
            .for_operation("create Info")
            .at_step(2)
            .at_step(5);
        assert_eq!(err.operation(), Some("create Info"));
        assert_eq!(err.step(), Some(2));
    }

    #[test]
    fn fatal_errors_have_no_operation() {
        let err = RunnerError::invalid_state("depth").for_operation("x").at_step(1);
        assert_eq!(err.operation(), None);
        assert_eq!(err.step(), None);
        assert_eq!(err.to_string(), "invalid state: depth");
    }

    #[test]
    fn unavailable_is_transparent() {
        let err = RunnerError::from_store("begin", StoreError::unavailable("network down"));
        assert_eq!(err.to_string(), "store unavailable: network down");
    }
}
