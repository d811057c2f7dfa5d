//! Reference scenarios for savepoint-scoped transactions.

use savepoint_core::{
    parse_int_field, CreateRecord, FnOperation, GuardOutcome, GuardPolicy, OperationSequence,
    RunnerConfig, RunnerError, RunnerResult,
};
use savepoint_store::{
    fields, FieldValue, InMemoryStore, RecordId, StoreError, TransactionalStore,
};
use savepoint_testkit::prelude::*;

#[test]
fn scenario_a_failure_after_released_savepoint_aborts_everything() {
    let fixture = TestRunner::items();

    let result: RunnerResult<()> = fixture.run_in_transaction(|tx| {
        tx.insert(ITEM, item("X"))?;
        let savepoint = tx.savepoint()?;
        tx.insert(ITEM, item("Y"))?;
        tx.release(savepoint)?;
        tx.insert(ITEM, broken_item("Z"))?;
        Ok(())
    });

    assert!(matches!(
        result,
        Err(RunnerError::Operation {
            source: StoreError::ConstraintViolation { .. },
            ..
        })
    ));
    assert!(fixture.committed_names(ITEM).is_empty());
    assert_eq!(fixture.store.active_count(), 0);
}

#[test]
fn scenario_b_guarded_failure_is_rolled_back_and_swallowed() {
    let fixture = TestRunner::items();

    let outcome = fixture
        .run_in_transaction(|tx| {
            tx.insert(ITEM, item("X"))?;
            tx.with_savepoint(|tx| tx.insert(ITEM, broken_item("Y")))
        })
        .unwrap();

    assert!(outcome.is_rolled_back());
    assert_eq!(fixture.committed_names(ITEM), vec!["X"]);
    let stats = fixture.stats().snapshot();
    assert_eq!(stats.transactions_committed, 1);
    assert_eq!(stats.errors_swallowed, 1);
}

#[test]
fn scenario_c_inner_rollback_keeps_outer_guard_writes() {
    let fixture = TestRunner::items();

    fixture
        .run_in_transaction(|tx| {
            tx.insert(ITEM, item("X"))?;
            let outer = tx.with_savepoint(|tx| {
                tx.insert(ITEM, item("Y"))?;
                let inner = tx.with_savepoint(|tx| {
                    tx.insert(ITEM, item("Z"))?;
                    tx.insert(ITEM, broken_item("W"))
                })?;
                assert!(matches!(inner, GuardOutcome::RolledBack { discarded: 1, .. }));
                assert_eq!(tx.savepoint_depth(), 1);
                tx.insert(ITEM, item("V"))
            })?;
            assert!(outer.is_completed());
            Ok(())
        })
        .unwrap();

    assert_eq!(fixture.committed_names(ITEM), vec!["V", "X", "Y"]);
}

#[test]
fn scenarios_are_repeatable_on_fresh_stores() {
    for _ in 0..3 {
        let fixture = TestRunner::items();
        let _ = fixture
            .run_in_transaction(|tx| {
                tx.insert(ITEM, item("X"))?;
                tx.with_savepoint(|tx| tx.insert(ITEM, broken_item("Y")))
            })
            .unwrap();
        assert_eq!(fixture.committed_names(ITEM), vec!["X"]);
    }
}

#[test]
fn student_enrollment_with_bad_age_keeps_student() {
    let fixture = TestRunner::students();
    let details = OperationSequence::new()
        .then(CreateRecord::new("Info", fields([("age", FieldValue::Int(19))])))
        .then(FnOperation::new("create Info", |tx| {
            let age = parse_int_field("create Info", "age", "abc")?;
            tx.insert("Info", fields([("age", FieldValue::Int(age))]))
        }))
        .then(CreateRecord::new(
            "Address",
            fields([("home", FieldValue::from("北京"))]),
        ));

    let outcome = fixture
        .run_in_transaction(|tx| {
            tx.insert("Student", fields([("name", FieldValue::from("Zhang San"))]))?;
            tx.with_savepoint(|tx| details.run(tx))
        })
        .unwrap();

    let error = outcome.error().unwrap();
    assert!(matches!(error, RunnerError::Validation { .. }));
    assert_eq!(error.step(), Some(1));
    assert_eq!(error.operation(), Some("create Info"));
    assert_eq!(fixture.store.count("Student"), 1);
    assert_eq!(fixture.store.count("Info"), 0);
    assert_eq!(fixture.store.count("Address"), 0);
}

#[test]
fn propagate_policy_aborts_the_transaction() {
    let fixture = TestRunner::from_store(
        InMemoryStore::new().with_schema(item_schema()),
        RunnerConfig::new().guard_policy(GuardPolicy::Propagate),
    );

    let result = fixture.run_in_transaction(|tx| {
        tx.insert(ITEM, item("X"))?;
        tx.with_savepoint(|tx| tx.insert(ITEM, broken_item("Y")))
    });

    assert!(result.is_err());
    assert_eq!(fixture.store.count(ITEM), 0);
}

#[test]
fn swallowed_error_can_still_be_raised_by_caller() {
    let fixture = TestRunner::items();

    let result = fixture.run_in_transaction(|tx| {
        tx.insert(ITEM, item("X"))?;
        tx.with_savepoint(|tx| tx.insert(ITEM, broken_item("Y")))?
            .into_result()
    });

    assert!(result.is_err());
    assert_eq!(fixture.store.count(ITEM), 0);
}

#[test]
fn store_outage_inside_guard_is_never_swallowed() {
    let fixture = TestRunner::items();

    let result = fixture.run_in_transaction(|tx| {
        tx.insert(ITEM, item("X"))?;
        let store = &fixture.store;
        tx.with_savepoint(|tx| {
            store.set_online(false);
            tx.insert(ITEM, item("Y"))
        })
    });
    fixture.store.set_online(true);

    assert!(matches!(result, Err(RunnerError::StoreUnavailable(_))));
    assert_eq!(fixture.store.count(ITEM), 0);
    assert_eq!(fixture.store.active_count(), 0);
    assert_eq!(fixture.stats().snapshot().errors_swallowed, 0);
}

#[test]
fn terminal_savepoints_reject_reuse() {
    let fixture = TestRunner::memory();

    fixture
        .run_in_transaction(|tx| {
            let released = tx.savepoint()?;
            tx.release(released)?;
            assert!(matches!(
                tx.rollback_to(released),
                Err(RunnerError::InvalidState { .. })
            ));
            assert!(matches!(
                tx.release(released),
                Err(RunnerError::InvalidState { .. })
            ));

            let rolled_back = tx.savepoint()?;
            tx.rollback_to(rolled_back)?;
            assert!(matches!(
                tx.rollback_to(rolled_back),
                Err(RunnerError::InvalidState { .. })
            ));
            Ok(())
        })
        .unwrap();
}

#[test]
fn savepoint_of_another_transaction_is_rejected() {
    let fixture = TestRunner::memory();
    let foreign = fixture
        .run_in_transaction(|tx| {
            let sp = tx.savepoint()?;
            tx.release(sp)?;
            Ok(sp)
        })
        .unwrap();

    let result = fixture.run_in_transaction(|tx| tx.rollback_to(foreign));
    assert!(matches!(result, Err(RunnerError::InvalidState { .. })));
}

#[test]
fn savepoint_from_another_store_is_rejected() {
    let store_a = TestRunner::memory();
    let store_b = TestRunner::memory();

    store_a
        .run_in_transaction(|ta| {
            let sp_a = ta.savepoint()?;
            store_b
                .run_in_transaction(|tb| {
                    assert_eq!(tb.id(), ta.id());
                    let sp_b = tb.savepoint()?;
                    assert_eq!(sp_b.id(), sp_a.id());
                    tb.insert("Row", fields([("n", FieldValue::Int(1))]))?;

                    assert!(matches!(
                        tb.rollback_to(sp_a),
                        Err(RunnerError::InvalidState { .. })
                    ));
                    assert_eq!(tb.write_count(), 1);
                    tb.release(sp_b)
                })
                .unwrap();
            ta.release(sp_a)
        })
        .unwrap();

    assert_eq!(store_b.store.count("Row"), 1);
}

#[test]
fn uncommitted_writes_are_invisible_to_other_readers() {
    let fixture = TestRunner::memory();

    let id: RecordId = fixture
        .run_in_transaction(|tx| {
            let record = tx.insert(ITEM, item("X"))?;
            assert!(tx.get(ITEM, record.id)?.is_some());
            assert!(fixture.store.get_committed(ITEM, record.id).unwrap().is_none());
            Ok(record.id)
        })
        .unwrap();

    assert!(fixture.store.get_committed(ITEM, id).unwrap().is_some());
}

#[test]
fn lifecycle_signals_follow_scenario_b() {
    let fixture = TestRunner::items();
    let events = fixture.record_events();

    let _ = fixture
        .run_in_transaction(|tx| {
            tx.insert(ITEM, item("X"))?;
            tx.with_savepoint(|tx| tx.insert(ITEM, broken_item("Y")))
        })
        .unwrap();

    assert_eq!(
        *events.lock(),
        vec![
            "begun",
            "savepoint_created",
            "savepoint_rolled_back",
            "committed"
        ]
    );
}
