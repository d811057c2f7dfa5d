//! Scenario command implementation.

use super::{format_counts, CommandError};
use savepoint_core::{GuardOutcome, RunnerError, RunnerResult, StatsSnapshot, TransactionRunner};
use savepoint_store::{
    fields, EntitySchema, FieldKind, FieldValue, InMemoryStore, TransactionalStore,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

const ITEM: &str = "Item";

/// Result of running one scenario.
#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub scenario: &'static str,
    /// What the scenario does.
    pub description: &'static str,
    /// Whether the transaction committed.
    pub committed: bool,
    /// Error returned by the transaction boundary, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Errors swallowed by savepoint guards.
    pub swallowed: Vec<String>,
    /// Committed item names, sorted.
    pub items: Vec<String>,
    /// Item names the scenario expects to be committed.
    pub expected: Vec<&'static str>,
    /// Whether `items` matches `expected`.
    pub passed: bool,
    /// Committed record counts per entity type.
    pub counts: BTreeMap<String, usize>,
    /// Runner counters.
    pub stats: StatsSnapshot,
}

/// Runs the scenario command.
pub fn run(name: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    info!(scenario = name, "running scenarios");
    let reports = match name {
        "all" => vec![run_a()?, run_b()?, run_c()?],
        _ => vec![run_named(name)?],
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        _ => {
            for report in &reports {
                print_text_output(report);
            }
        }
    }

    if reports.iter().all(|r| r.passed) {
        Ok(())
    } else {
        Err("scenario outcome did not match expectation".into())
    }
}

/// Runs a single scenario by name.
pub fn run_named(name: &str) -> Result<ScenarioReport, CommandError> {
    match name {
        "a" => run_a(),
        "b" => run_b(),
        "c" => run_c(),
        other => Err(CommandError::UnknownScenario(other.to_string())),
    }
}

/// A: a released savepoint does not survive a later failure outside it.
pub fn run_a() -> Result<ScenarioReport, CommandError> {
    let (store, runner) = fresh();
    let result = runner.run_in_transaction(|tx| {
        tx.insert(ITEM, item("X"))?;
        let savepoint = tx.savepoint()?;
        tx.insert(ITEM, item("Y"))?;
        tx.release(savepoint)?;
        tx.insert(ITEM, broken_item("Z"))?;
        Ok(Vec::new())
    });
    report(
        "a",
        "write X, guard Y (released), write Z (fails): whole transaction aborts",
        &store,
        &runner,
        result,
        Vec::new(),
    )
}

/// B: a failing guarded write is rolled back and swallowed; the rest commits.
pub fn run_b() -> Result<ScenarioReport, CommandError> {
    let (store, runner) = fresh();
    let result = runner.run_in_transaction(|tx| {
        tx.insert(ITEM, item("X"))?;
        let outcome = tx.with_savepoint(|tx| tx.insert(ITEM, broken_item("Y")))?;
        Ok(swallowed(&outcome))
    });
    report(
        "b",
        "write X, guard Y (fails): Y rolled back, transaction commits X",
        &store,
        &runner,
        result,
        vec!["X"],
    )
}

/// C: an inner rollback leaves the outer guard's earlier writes in place.
pub fn run_c() -> Result<ScenarioReport, CommandError> {
    let (store, runner) = fresh();
    let result = runner.run_in_transaction(|tx| {
        tx.insert(ITEM, item("X"))?;
        let outer = tx.with_savepoint(|tx| {
            tx.insert(ITEM, item("Y"))?;
            let inner = tx.with_savepoint(|tx| {
                tx.insert(ITEM, item("Z"))?;
                tx.insert(ITEM, broken_item("W"))
            })?;
            Ok(swallowed(&inner))
        })?;
        let mut errors = swallowed(&outer);
        if let GuardOutcome::Completed(inner) = outer {
            errors.extend(inner);
        }
        Ok(errors)
    });
    report(
        "c",
        "write X, guard { Y, guard { Z, W (fails) } }: X and Y commit",
        &store,
        &runner,
        result,
        vec!["X", "Y"],
    )
}

fn fresh() -> (Arc<InMemoryStore>, TransactionRunner) {
    let store = Arc::new(InMemoryStore::new().with_schema(
        EntitySchema::new(ITEM)
            .text("name", 16)
            .field("qty", FieldKind::Int, true),
    ));
    let runner = TransactionRunner::new(store.clone());
    (store, runner)
}

fn item(name: &str) -> savepoint_store::Fields {
    fields([("name", FieldValue::from(name))])
}

/// An item whose `qty` is not an integer; the store rejects it.
fn broken_item(name: &str) -> savepoint_store::Fields {
    fields([
        ("name", FieldValue::from(name)),
        ("qty", FieldValue::from("abc")),
    ])
}

fn swallowed<T>(outcome: &GuardOutcome<T>) -> Vec<String> {
    outcome.error().map(ToString::to_string).into_iter().collect()
}

fn report(
    scenario: &'static str,
    description: &'static str,
    store: &InMemoryStore,
    runner: &TransactionRunner,
    result: RunnerResult<Vec<String>>,
    expected: Vec<&'static str>,
) -> Result<ScenarioReport, CommandError> {
    let mut items: Vec<String> = store
        .list_committed(ITEM)?
        .into_iter()
        .filter_map(|record| record.get("name").and_then(|v| v.as_text().map(str::to_string)))
        .collect();
    items.sort();

    let (committed, error, swallowed) = match result {
        Ok(swallowed) => (true, None, swallowed),
        Err(err) => (false, Some(describe(&err)), Vec::new()),
    };

    Ok(ScenarioReport {
        scenario,
        description,
        committed,
        error,
        swallowed,
        passed: items == expected,
        items,
        expected,
        counts: super::committed_counts(store),
        stats: runner.stats().snapshot(),
    })
}

fn describe(err: &RunnerError) -> String {
    match err.step() {
        Some(step) => format!("{err} (step {step})"),
        None => err.to_string(),
    }
}

fn print_text_output(report: &ScenarioReport) {
    println!("Scenario {}", report.scenario.to_uppercase());
    println!("==========");
    println!("{}", report.description);
    println!();
    println!(
        "  Transaction: {}",
        if report.committed { "committed" } else { "aborted" }
    );
    if let Some(error) = &report.error {
        println!("  Error:       {error}");
    }
    for error in &report.swallowed {
        println!("  Swallowed:   {error}");
    }
    println!("  Items:       {:?}", report.items);
    println!("  Expected:    {:?}", report.expected);
    println!("  Counts:      {}", format_counts(&report.counts));
    println!(
        "  Savepoints:  {} created, {} released, {} rolled back",
        report.stats.savepoints_created,
        report.stats.savepoints_released,
        report.stats.savepoints_rolled_back
    );
    println!("  Result:      {}", if report.passed { "PASS" } else { "FAIL" });
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_a_aborts_everything() {
        let report = run_a().unwrap();
        assert!(!report.committed);
        assert!(report.error.is_some());
        assert!(report.items.is_empty());
        assert!(report.passed);
    }

    #[test]
    fn scenario_b_keeps_outer_write() {
        let report = run_b().unwrap();
        assert!(report.committed);
        assert_eq!(report.items, vec!["X"]);
        assert_eq!(report.swallowed.len(), 1);
        assert!(report.passed);
    }

    #[test]
    fn scenario_c_keeps_outer_guard_writes() {
        let report = run_c().unwrap();
        assert!(report.committed);
        assert_eq!(report.items, vec!["X", "Y"]);
        assert_eq!(report.stats.savepoints_rolled_back, 1);
        assert_eq!(report.stats.savepoints_released, 1);
        assert!(report.passed);
    }

    #[test]
    fn unknown_scenario_is_an_error() {
        assert!(matches!(
            run_named("z"),
            Err(CommandError::UnknownScenario(name)) if name == "z"
        ));
    }
}
