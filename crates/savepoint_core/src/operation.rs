//! Write operations.
//!
//! A [`WriteOperation`] is one unit of work that produces or mutates a
//! record. Operations are applied through a [`TxHandle`], so applying one
//! outside an active transaction fails.

use crate::error::{RunnerError, RunnerResult};
use crate::handle::TxHandle;
use savepoint_store::{Fields, Record, RecordId};
use std::fmt;

/// A unit of work against the store.
pub trait WriteOperation: Send + Sync {
    /// Human-readable identity used in errors and logs.
    fn label(&self) -> String;

    /// Checks the operation's own input before it touches the store.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error describing the bad input.
    fn validate(&self) -> RunnerResult<()> {
        Ok(())
    }

    /// Applies the operation within the handle's transaction.
    fn apply(&self, tx: &mut TxHandle<'_>) -> RunnerResult<Record>;
}

fn validate_target(label: impl FnOnce() -> String, entity_type: &str) -> RunnerResult<()> {
    if entity_type.trim().is_empty() {
        return Err(RunnerError::validation(label(), "entity type must not be empty"));
    }
    Ok(())
}

fn validate_fields(label: impl FnOnce() -> String, fields: &Fields) -> RunnerResult<()> {
    if fields.keys().any(|name| name.trim().is_empty()) {
        return Err(RunnerError::validation(label(), "field names must not be empty"));
    }
    Ok(())
}

/// Inserts a new record.
#[derive(Debug, Clone)]
pub struct CreateRecord {
    entity_type: String,
    fields: Fields,
}

impl CreateRecord {
    /// Creates the operation.
    pub fn new(entity_type: impl Into<String>, fields: Fields) -> Self {
        Self {
            entity_type: entity_type.into(),
            fields,
        }
    }
}

impl WriteOperation for CreateRecord {
    fn label(&self) -> String {
        format!("create {}", self.entity_type)
    }

    fn validate(&self) -> RunnerResult<()> {
        validate_target(|| self.label(), &self.entity_type)?;
        validate_fields(|| self.label(), &self.fields)
    }

    fn apply(&self, tx: &mut TxHandle<'_>) -> RunnerResult<Record> {
        tx.insert(&self.entity_type, self.fields.clone())
    }
}

/// Merges fields into an existing record.
#[derive(Debug, Clone)]
pub struct UpdateRecord {
    entity_type: String,
    id: RecordId,
    fields: Fields,
}

impl UpdateRecord {
    /// Creates the operation.
    pub fn new(entity_type: impl Into<String>, id: RecordId, fields: Fields) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
            fields,
        }
    }
}

impl WriteOperation for UpdateRecord {
    fn label(&self) -> String {
        format!("update {} {}", self.entity_type, self.id)
    }

    fn validate(&self) -> RunnerResult<()> {
        validate_target(|| self.label(), &self.entity_type)?;
        if self.fields.is_empty() {
            return Err(RunnerError::validation(self.label(), "nothing to update"));
        }
        validate_fields(|| self.label(), &self.fields)
    }

    fn apply(&self, tx: &mut TxHandle<'_>) -> RunnerResult<Record> {
        tx.update(&self.entity_type, self.id, self.fields.clone())
    }
}

/// Deletes a record. Produces the deleted record.
#[derive(Debug, Clone)]
pub struct DeleteRecord {
    entity_type: String,
    id: RecordId,
}

impl DeleteRecord {
    /// Creates the operation.
    pub fn new(entity_type: impl Into<String>, id: RecordId) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
        }
    }
}

impl WriteOperation for DeleteRecord {
    fn label(&self) -> String {
        format!("delete {} {}", self.entity_type, self.id)
    }

    fn validate(&self) -> RunnerResult<()> {
        validate_target(|| self.label(), &self.entity_type)
    }

    fn apply(&self, tx: &mut TxHandle<'_>) -> RunnerResult<Record> {
        tx.delete(&self.entity_type, self.id)
    }
}

/// An operation defined by a closure.
///
/// ```rust
/// use savepoint_core::{parse_int_field, FnOperation};
/// use savepoint_store::{fields, FieldValue};
///
/// let create_info = FnOperation::new("create Info", |tx| {
///     let age = parse_int_field("create Info", "age", "19")?;
///     tx.insert("Info", fields([("age", FieldValue::Int(age))]))
/// });
/// # let _ = create_info;
/// ```
pub struct FnOperation<F> {
    label: String,
    f: F,
}

impl<F> FnOperation<F>
where
    F: Fn(&mut TxHandle<'_>) -> RunnerResult<Record> + Send + Sync,
{
    /// Creates the operation.
    pub fn new(label: impl Into<String>, f: F) -> Self {
        Self {
            label: label.into(),
            f,
        }
    }
}

impl<F> WriteOperation for FnOperation<F>
where
    F: Fn(&mut TxHandle<'_>) -> RunnerResult<Record> + Send + Sync,
{
    fn label(&self) -> String {
        self.label.clone()
    }

    fn apply(&self, tx: &mut TxHandle<'_>) -> RunnerResult<Record> {
        (self.f)(tx)
    }
}

impl<F> fmt::Debug for FnOperation<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOperation")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Parses raw input for an integer field.
///
/// # Errors
///
/// Returns a `Validation` error attributed to `operation` if `raw` is not an
/// integer.
pub fn parse_int_field(operation: &str, field: &str, raw: &str) -> RunnerResult<i64> {
    raw.trim().parse().map_err(|_| {
        RunnerError::validation(
            operation,
            format!("invalid literal for integer field {field}: {raw:?}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::TransactionRunner;
    use savepoint_store::{fields, FieldValue, InMemoryStore};
    use std::sync::Arc;

    fn runner() -> (Arc<InMemoryStore>, TransactionRunner) {
        let store = Arc::new(InMemoryStore::new());
        (store.clone(), TransactionRunner::new(store))
    }

    #[test]
    fn labels_name_the_target() {
        let id = RecordId::new();
        assert_eq!(CreateRecord::new("Student", Fields::new()).label(), "create Student");
        assert_eq!(
            DeleteRecord::new("Student", id).label(),
            format!("delete Student {id}")
        );
    }

    #[test]
    fn empty_entity_type_fails_validation() {
        let err = CreateRecord::new("  ", Fields::new()).validate().unwrap_err();
        assert!(matches!(err, RunnerError::Validation { .. }));
    }

    #[test]
    fn empty_field_name_fails_validation() {
        let op = CreateRecord::new("Student", fields([("", FieldValue::Null)]));
        assert!(op.validate().is_err());
    }

    #[test]
    fn empty_update_fails_validation() {
        let op = UpdateRecord::new("Student", RecordId::new(), Fields::new());
        let err = op.validate().unwrap_err();
        assert!(err.to_string().contains("nothing to update"));
    }

    #[test]
    fn create_update_delete_roundtrip() {
        let (store, runner) = runner();
        let created = runner
            .run_in_transaction(|tx| {
                tx.apply(&CreateRecord::new(
                    "Student",
                    fields([("name", FieldValue::from("Zhang San"))]),
                ))
            })
            .unwrap();

        runner
            .run_in_transaction(|tx| {
                let updated = tx.apply(&UpdateRecord::new(
                    "Student",
                    created.id,
                    fields([("name", FieldValue::from("Li Si"))]),
                ))?;
                assert_eq!(updated.get("name"), Some(&FieldValue::from("Li Si")));
                tx.apply(&DeleteRecord::new("Student", created.id))
            })
            .unwrap();

        assert_eq!(store.count("Student"), 0);
    }

    #[test]
    fn apply_attributes_errors_to_operation() {
        let (_store, runner) = runner();
        let err = runner
            .run_in_transaction(|tx| tx.apply(&DeleteRecord::new("Student", RecordId::new())))
            .unwrap_err();
        assert!(err.operation().unwrap().starts_with("delete Student"));
        assert!(matches!(err, RunnerError::Operation { .. }));
    }

    #[test]
    fn fn_operation_runs_closure() {
        let (store, runner) = runner();
        let op = FnOperation::new("create Info", |tx: &mut TxHandle<'_>| {
            let age = parse_int_field("create Info", "age", "19")?;
            tx.insert("Info", fields([("age", FieldValue::Int(age))]))
        });
        runner.run_in_transaction(|tx| tx.apply(&op)).unwrap();
        assert_eq!(store.count("Info"), 1);
    }

    #[test]
    fn parse_int_field_rejects_garbage() {
        assert_eq!(parse_int_field("op", "age", " 19 ").unwrap(), 19);
        let err = parse_int_field("op", "age", "abc").unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation failed for op: invalid literal for integer field age: \"abc\""
        );
    }
}
