//! Enroll command implementation.

use super::{committed_counts, format_counts};
use savepoint_core::{parse_int_field, GuardOutcome, GuardPolicy, TransactionRunner};
use savepoint_store::{fields, EntitySchema, FieldKind, FieldValue, InMemoryStore, RecordId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of an enrollment.
#[derive(Debug, Serialize)]
pub struct EnrollReport {
    /// Whether the enrollment transaction committed.
    pub committed: bool,
    /// The committed student, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<RecordId>,
    /// Whether the student details were written.
    pub details_saved: bool,
    /// Writes discarded by the savepoint rollback.
    pub discarded: usize,
    /// The error, swallowed or not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Committed record counts per entity type.
    pub counts: BTreeMap<String, usize>,
}

/// Store with the Student, Info and Address schemas registered.
///
/// `Info.age` is nullable: the record is created before the raw age is
/// converted and filled in.
pub fn enrollment_store() -> InMemoryStore {
    InMemoryStore::new()
        .with_schema(EntitySchema::new("Student").text("name", 20))
        .with_schema(EntitySchema::new("Info").field("age", FieldKind::Int, true))
        .with_schema(EntitySchema::new("Address").text("home", 100))
}

/// Enrolls a student.
///
/// The student is written first. Behind a savepoint the Info record is
/// created, the raw age converted into it and the Address written; a failed
/// conversion discards the Info record and never reaches the Address.
pub fn enroll(name: &str, age: &str, home: &str, policy: GuardPolicy) -> EnrollReport {
    let store = Arc::new(enrollment_store());
    let runner = TransactionRunner::new(store.clone());

    let result = runner.run_in_transaction(|tx| {
        let student = tx.insert("Student", fields([("name", FieldValue::from(name))]))?;
        let outcome = tx.with_savepoint_policy(policy, |tx| {
            let info = tx.insert("Info", fields([("age", FieldValue::Null)]))?;
            let age = parse_int_field("convert age", "age", age)?;
            tx.update("Info", info.id, fields([("age", FieldValue::Int(age))]))?;
            tx.insert("Address", fields([("home", FieldValue::from(home))]))
        })?;
        Ok((student.id, outcome))
    });

    if let Err(err) = &result {
        debug!(error = %err, "enrollment aborted");
    }

    let counts = committed_counts(&store);
    match result {
        Ok((student_id, GuardOutcome::Completed(_))) => EnrollReport {
            committed: true,
            student_id: Some(student_id),
            details_saved: true,
            discarded: 0,
            error: None,
            counts,
        },
        Ok((student_id, GuardOutcome::RolledBack { error, discarded })) => EnrollReport {
            committed: true,
            student_id: Some(student_id),
            details_saved: false,
            discarded,
            error: Some(error.to_string()),
            counts,
        },
        Err(error) => EnrollReport {
            committed: false,
            student_id: None,
            details_saved: false,
            discarded: 0,
            error: Some(error.to_string()),
            counts,
        },
    }
}

/// Runs the enroll command.
pub fn run(
    name: &str,
    age: &str,
    home: &str,
    propagate: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let policy = if propagate {
        GuardPolicy::Propagate
    } else {
        GuardPolicy::Swallow
    };
    info!(name, ?policy, "enrolling student");
    let report = enroll(name, age, home, policy);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_output(&report);
        }
    }

    Ok(())
}

fn print_text_output(report: &EnrollReport) {
    println!("Enrollment");
    println!("==========");
    println!();
    match report.student_id {
        Some(id) => println!("  Student:  {id}"),
        None => println!("  Student:  (not enrolled)"),
    }
    println!(
        "  Details:  {}",
        if report.details_saved {
            "saved"
        } else {
            "rolled back"
        }
    );
    if report.discarded > 0 {
        println!("  Discarded writes: {}", report.discarded);
    }
    if let Some(error) = &report.error {
        println!("  Error:    {error}");
    }
    println!("  Counts:   {}", format_counts(&report.counts));
    println!();
}
