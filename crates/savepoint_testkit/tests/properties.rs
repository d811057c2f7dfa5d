//! Property tests for guarded transaction plans.

use proptest::prelude::*;
use savepoint_core::GuardPolicy;
use savepoint_testkit::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn guarded_failure_keeps_writes_outside_the_guard(plan in guarded_plan_strategy()) {
        let mut harness = IntegrationHarness::new();
        let outcome = harness.run_plan(&plan, GuardPolicy::Swallow);

        if plan.guard_fails() {
            prop_assert!(
                matches!(outcome, PlanOutcome::CommittedWithoutGuard { .. }),
                "unexpected outcome {:?}",
                outcome
            );
            prop_assert_eq!(harness.tracked_count(), plan.before.len() + plan.after.len());
        } else {
            prop_assert_eq!(outcome, PlanOutcome::Committed);
            prop_assert_eq!(
                harness.tracked_count(),
                plan.before.len() + plan.guarded.len() + plan.after.len()
            );
        }
        harness.verify_all();
    }

    #[test]
    fn rollback_discards_exactly_the_writes_before_the_fault(plan in guarded_plan_strategy()) {
        let mut harness = IntegrationHarness::new();
        let outcome = harness.run_plan(&plan, GuardPolicy::Swallow);

        if let PlanOutcome::CommittedWithoutGuard { discarded } = outcome {
            let before_fault = plan
                .guarded
                .iter()
                .take_while(|w| !w.is_failure())
                .count();
            prop_assert_eq!(discarded, before_fault);
        }
    }

    #[test]
    fn unguarded_failure_leaves_nothing(plan in unguarded_failure_plan_strategy()) {
        let mut harness = IntegrationHarness::new();
        let outcome = harness.run_plan(&plan, GuardPolicy::Swallow);

        prop_assert_eq!(outcome, PlanOutcome::Aborted);
        prop_assert_eq!(harness.tracked_count(), 0);
        prop_assert_eq!(harness.fixture.store.total_count(), 0);
        prop_assert_eq!(harness.fixture.store.active_count(), 0);
    }

    #[test]
    fn propagated_guard_failure_leaves_nothing(plan in guarded_plan_strategy()) {
        prop_assume!(plan.guard_fails());
        let mut harness = IntegrationHarness::new();

        prop_assert_eq!(harness.run_plan(&plan, GuardPolicy::Propagate), PlanOutcome::Aborted);
        prop_assert_eq!(harness.fixture.store.total_count(), 0);
    }

    #[test]
    fn committed_state_tracks_a_series_of_plans(
        plans in prop::collection::vec(guarded_plan_strategy(), 1..5)
    ) {
        let mut harness = IntegrationHarness::new();
        for plan in &plans {
            let _ = harness.run_plan(plan, GuardPolicy::Swallow);
        }
        harness.verify_all();

        let stats = harness.fixture.stats().snapshot();
        prop_assert_eq!(stats.transactions_committed, plans.len() as u64);
        prop_assert_eq!(stats.transactions_open(), 0);
    }
}
