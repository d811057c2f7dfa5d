//! Runner configuration.

/// What a savepoint guard does with a recoverable failure after rolling back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardPolicy {
    /// Report the failure in the guard outcome and keep the transaction going.
    #[default]
    Swallow,
    /// Return the failure so it reaches the transaction boundary.
    Propagate,
}

/// Configuration for a [`TransactionRunner`](crate::TransactionRunner).
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Policy used by `TxHandle::with_savepoint`.
    pub guard_policy: GuardPolicy,

    /// Maximum number of nested active savepoints (0 = unbounded).
    pub max_savepoint_depth: usize,

    /// Whether to emit a debug event for every applied operation.
    pub trace_operations: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            guard_policy: GuardPolicy::Swallow,
            max_savepoint_depth: 32,
            trace_operations: false,
        }
    }
}

impl RunnerConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default guard policy.
    #[must_use]
    pub const fn guard_policy(mut self, policy: GuardPolicy) -> Self {
        self.guard_policy = policy;
        self
    }

    /// Sets the maximum savepoint nesting depth.
    #[must_use]
    pub const fn max_savepoint_depth(mut self, depth: usize) -> Self {
        self.max_savepoint_depth = depth;
        self
    }

    /// Sets whether every applied operation is logged.
    #[must_use]
    pub const fn trace_operations(mut self, value: bool) -> Self {
        self.trace_operations = value;
        self
    }
}
