//! Cross-crate integration test helpers.
//!
//! Provides a harness that runs guarded transaction plans and checks the
//! store's committed state against a model of what should have committed.

use crate::fixtures::TestRunner;
use crate::generators::{sequence_of, GuardedPlan};
use savepoint_core::{GuardOutcome, GuardPolicy, RunnerConfig, RunnerResult};
use savepoint_store::{Fields, Record, RecordId, TransactionalStore};
use std::collections::{BTreeMap, BTreeSet};

/// How a plan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Committed with the guarded block's writes.
    Committed,
    /// Committed without the guarded block's writes.
    CommittedWithoutGuard {
        /// Writes discarded by the rollback.
        discarded: usize,
    },
    /// The transaction aborted.
    Aborted,
}

/// A test harness for integration testing.
pub struct IntegrationHarness {
    /// The runner and store under test.
    pub fixture: TestRunner,
    /// Committed records the model expects, keyed by type and id.
    expected: BTreeMap<(String, RecordId), Fields>,
}

impl IntegrationHarness {
    /// Creates a harness with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    /// Creates a harness with a custom configuration.
    pub fn with_config(config: RunnerConfig) -> Self {
        Self {
            fixture: TestRunner::with_config(config),
            expected: BTreeMap::new(),
        }
    }

    /// Runs a plan as one transaction, guarding its middle part with
    /// `policy`, and updates the model with whatever committed.
    pub fn run_plan(&mut self, plan: &GuardedPlan, policy: GuardPolicy) -> PlanOutcome {
        let before = sequence_of(&plan.before);
        let guarded = sequence_of(&plan.guarded);
        let after = sequence_of(&plan.after);

        let result: RunnerResult<(Vec<Record>, GuardOutcome<Vec<Record>>)> =
            self.fixture.run_in_transaction(|tx| {
                let mut written = before.run(tx)?;
                let outcome = tx.with_savepoint_policy(policy, |tx| guarded.run(tx))?;
                written.extend(after.run(tx)?);
                Ok((written, outcome))
            });

        match result {
            Ok((written, GuardOutcome::Completed(inside))) => {
                self.track(written);
                self.track(inside);
                PlanOutcome::Committed
            }
            Ok((written, GuardOutcome::RolledBack { discarded, .. })) => {
                self.track(written);
                PlanOutcome::CommittedWithoutGuard { discarded }
            }
            Err(_) => PlanOutcome::Aborted,
        }
    }

    fn track(&mut self, records: Vec<Record>) {
        for record in records {
            self.expected
                .insert((record.entity_type, record.id), record.fields);
        }
    }

    /// Verifies the store's committed records equal the model exactly.
    pub fn verify_all(&self) {
        let store = &self.fixture.store;
        let types: BTreeSet<String> = store
            .entity_types()
            .into_iter()
            .chain(self.expected.keys().map(|(t, _)| t.clone()))
            .collect();

        let mut actual = BTreeMap::new();
        for entity_type in types {
            for record in store
                .list_committed(&entity_type)
                .expect("Failed to list records")
            {
                actual.insert((record.entity_type, record.id), record.fields);
            }
        }

        assert_eq!(actual, self.expected, "Committed state diverged from model");
    }

    /// Returns the count of tracked records.
    pub fn tracked_count(&self) -> usize {
        self.expected.len()
    }
}

impl Default for IntegrationHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::PlannedWrite;
    use savepoint_store::{fields, FieldValue};

    fn insert(name: &str) -> PlannedWrite {
        PlannedWrite::Insert {
            entity_type: "Item".to_string(),
            fields: fields([("name", FieldValue::from(name))]),
        }
    }

    fn fail() -> PlannedWrite {
        PlannedWrite::Fail {
            label: "fault".to_string(),
        }
    }

    #[test]
    fn harness_tracks_guarded_rollback() {
        let mut harness = IntegrationHarness::new();
        let plan = GuardedPlan {
            before: vec![insert("a")],
            guarded: vec![insert("b"), fail()],
            after: vec![insert("c")],
        };

        let outcome = harness.run_plan(&plan, GuardPolicy::Swallow);
        assert_eq!(outcome, PlanOutcome::CommittedWithoutGuard { discarded: 1 });
        assert_eq!(harness.tracked_count(), 2);
        harness.verify_all();
    }

    #[test]
    fn harness_tracks_abort() {
        let mut harness = IntegrationHarness::new();
        let plan = GuardedPlan {
            before: vec![insert("a")],
            guarded: vec![fail()],
            after: vec![],
        };

        assert_eq!(harness.run_plan(&plan, GuardPolicy::Propagate), PlanOutcome::Aborted);
        assert_eq!(harness.tracked_count(), 0);
        harness.verify_all();
    }
}
