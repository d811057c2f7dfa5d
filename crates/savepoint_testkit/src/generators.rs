//! Property-based test generators using proptest.
//!
//! Provides strategies for generating field values, writes and guarded
//! transaction plans.

use proptest::prelude::*;
use savepoint_core::{CreateRecord, FnOperation, OperationSequence, RunnerError};
use savepoint_store::{FieldValue, Fields};

/// Strategy for generating entity type names.
pub fn entity_type_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{2,9}").expect("Invalid regex")
}

/// Strategy for generating field names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z_]{0,11}").expect("Invalid regex")
}

/// Strategy for generating field values.
///
/// Floats are finite so records compare equal to themselves.
pub fn field_value_strategy() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        Just(FieldValue::Null),
        any::<bool>().prop_map(FieldValue::Bool),
        any::<i64>().prop_map(FieldValue::Int),
        (-1.0e9f64..1.0e9).prop_map(FieldValue::Float),
        prop::string::string_regex("[a-zA-Z0-9 ]{0,24}")
            .expect("Invalid regex")
            .prop_map(FieldValue::Text),
    ]
}

/// Strategy for generating a field map.
pub fn fields_strategy() -> impl Strategy<Value = Fields> {
    prop::collection::btree_map(field_name_strategy(), field_value_strategy(), 0..5)
}

/// A write planned by a property test.
#[derive(Debug, Clone)]
pub enum PlannedWrite {
    /// Insert a record.
    Insert {
        /// Entity type.
        entity_type: String,
        /// Record fields.
        fields: Fields,
    },
    /// An operation that always fails validation.
    Fail {
        /// Operation label.
        label: String,
    },
}

impl PlannedWrite {
    /// Returns true for [`PlannedWrite::Fail`].
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Fail { .. })
    }

    /// Appends the matching operation to a sequence.
    pub fn push_onto(&self, sequence: &mut OperationSequence) {
        match self {
            Self::Insert {
                entity_type,
                fields,
            } => {
                sequence.push(CreateRecord::new(entity_type.clone(), fields.clone()));
            }
            Self::Fail { label } => {
                let message = format!("{label} failed");
                sequence.push(FnOperation::new(label.clone(), move |_tx| {
                    Err(RunnerError::validation("injected", message.clone()))
                }));
            }
        }
    }
}

/// Builds a sequence from planned writes.
pub fn sequence_of(writes: &[PlannedWrite]) -> OperationSequence {
    let mut sequence = OperationSequence::new();
    for write in writes {
        write.push_onto(&mut sequence);
    }
    sequence
}

/// Strategy for generating successful inserts.
pub fn insert_strategy() -> impl Strategy<Value = PlannedWrite> {
    (entity_type_strategy(), fields_strategy()).prop_map(|(entity_type, fields)| {
        PlannedWrite::Insert {
            entity_type,
            fields,
        }
    })
}

/// Strategy for generating a batch of successful inserts.
pub fn inserts_strategy(max: usize) -> impl Strategy<Value = Vec<PlannedWrite>> {
    prop::collection::vec(insert_strategy(), 0..=max)
}

/// A transaction plan: writes before a guarded block, the guarded block and
/// writes after it.
#[derive(Debug, Clone)]
pub struct GuardedPlan {
    /// Writes before the savepoint.
    pub before: Vec<PlannedWrite>,
    /// Writes inside the guarded block.
    pub guarded: Vec<PlannedWrite>,
    /// Writes after the guarded block.
    pub after: Vec<PlannedWrite>,
}

impl GuardedPlan {
    /// Returns true if the guarded block contains a failure.
    pub fn guard_fails(&self) -> bool {
        self.guarded.iter().any(PlannedWrite::is_failure)
    }

    /// Returns true if a failure sits outside the guarded block.
    pub fn unguarded_fails(&self) -> bool {
        self.before
            .iter()
            .chain(&self.after)
            .any(PlannedWrite::is_failure)
    }
}

/// Strategy for a plan whose only possible failure is inside the guard.
pub fn guarded_plan_strategy() -> impl Strategy<Value = GuardedPlan> {
    (
        inserts_strategy(4),
        inserts_strategy(4),
        prop::option::of(0usize..5),
        inserts_strategy(4),
    )
        .prop_map(|(before, mut guarded, fail_at, after)| {
            if let Some(at) = fail_at {
                let at = at.min(guarded.len());
                guarded.insert(
                    at,
                    PlannedWrite::Fail {
                        label: "guarded fault".to_string(),
                    },
                );
            }
            GuardedPlan {
                before,
                guarded,
                after,
            }
        })
}

/// Strategy for a plan with a failure outside the guard.
pub fn unguarded_failure_plan_strategy() -> impl Strategy<Value = GuardedPlan> {
    (guarded_plan_strategy(), any::<bool>(), any::<prop::sample::Index>()).prop_map(
        |(mut plan, in_after, index)| {
            let target = if in_after {
                &mut plan.after
            } else {
                &mut plan.before
            };
            let at = index.index(target.len() + 1);
            target.insert(
                at,
                PlannedWrite::Fail {
                    label: "unguarded fault".to_string(),
                },
            );
            plan
        },
    )
}
