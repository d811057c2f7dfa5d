//! Test fixtures and runner helpers.
//!
//! Provides convenience functions for setting up a store and runner and the
//! schemas used by the reference scenarios.

use parking_lot::Mutex;
use savepoint_core::{RunnerConfig, TransactionEvent, TransactionRunner};
use savepoint_store::{
    fields, EntitySchema, FieldKind, FieldValue, Fields, InMemoryStore, TransactionalStore,
};
use std::sync::Arc;

/// Entity type used by the generic scenarios.
pub const ITEM: &str = "Item";

/// An in-memory store paired with a runner over it.
pub struct TestRunner {
    /// The runner.
    pub runner: TransactionRunner,
    /// The store, kept concrete for inspection.
    pub store: Arc<InMemoryStore>,
}

impl TestRunner {
    /// Creates a runner over an empty store without schemas.
    pub fn memory() -> Self {
        Self::from_store(InMemoryStore::new(), RunnerConfig::default())
    }

    /// Creates a runner with a custom configuration.
    pub fn with_config(config: RunnerConfig) -> Self {
        Self::from_store(InMemoryStore::new(), config)
    }

    /// Creates a runner over a store with the item schema registered.
    pub fn items() -> Self {
        Self::from_store(
            InMemoryStore::new().with_schema(item_schema()),
            RunnerConfig::default(),
        )
    }

    /// Creates a runner over a store with the student schemas registered.
    pub fn students() -> Self {
        let store = student_schemas()
            .into_iter()
            .fold(InMemoryStore::new(), InMemoryStore::with_schema);
        Self::from_store(store, RunnerConfig::default())
    }

    /// Creates a runner over the given store.
    pub fn from_store(store: InMemoryStore, config: RunnerConfig) -> Self {
        let store = Arc::new(store);
        Self {
            runner: TransactionRunner::with_config(store.clone(), config),
            store,
        }
    }

    /// Records every transaction event name sent by the runner.
    pub fn record_events(&self) -> Arc<Mutex<Vec<&'static str>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        self.runner
            .signals()
            .connect(move |event: &TransactionEvent| sink.lock().push(event.name()));
        events
    }

    /// Returns the sorted names of committed records of an entity type.
    pub fn committed_names(&self, entity_type: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .store
            .list_committed(entity_type)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|record| record.get("name")?.as_text().map(str::to_string))
            .collect();
        names.sort();
        names
    }
}

impl std::ops::Deref for TestRunner {
    type Target = TransactionRunner;

    fn deref(&self) -> &Self::Target {
        &self.runner
    }
}

/// Runs a test with a fresh runner over an empty store.
///
/// # Example
///
/// ```rust
/// use savepoint_testkit::{item, with_runner};
///
/// with_runner(|runner, store| {
///     runner.run_in_transaction(|tx| tx.insert("Item", item("X"))).unwrap();
///     assert_eq!(store.count("Item"), 1);
/// });
/// ```
pub fn with_runner<F, R>(f: F) -> R
where
    F: FnOnce(&TransactionRunner, &InMemoryStore) -> R,
{
    let fixture = TestRunner::memory();
    f(&fixture.runner, &fixture.store)
}

/// Schema for [`ITEM`]: a short required name and an optional integer qty.
pub fn item_schema() -> EntitySchema {
    EntitySchema::new(ITEM)
        .text("name", 16)
        .field("qty", FieldKind::Int, true)
}

/// Schemas of the student enrollment demo.
pub fn student_schemas() -> Vec<EntitySchema> {
    vec![
        EntitySchema::new("Student").text("name", 20),
        EntitySchema::new("Info").int("age"),
        EntitySchema::new("Address").text("home", 100),
    ]
}

/// Fields of a named item.
pub fn item(name: &str) -> Fields {
    fields([("name", FieldValue::from(name))])
}

/// Fields of an item the item schema rejects (`qty` is not an integer).
pub fn broken_item(name: &str) -> Fields {
    fields([
        ("name", FieldValue::from(name)),
        ("qty", FieldValue::from("abc")),
    ])
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use savepoint_store::Record;

    /// Creates a runner whose store already holds `count` committed items.
    pub fn populated(count: usize) -> (TestRunner, Vec<Record>) {
        let fixture = TestRunner::items();
        let records = fixture
            .run_in_transaction(|tx| {
                (0..count)
                    .map(|i| tx.insert(ITEM, item(&format!("item-{i}"))))
                    .collect::<Result<Vec<_>, _>>()
            })
            .expect("failed to populate store");
        (fixture, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_schema_accepts_item_and_rejects_broken_item() {
        let schema = item_schema();
        assert!(schema.validate_insert(&item("X")).is_ok());
        assert!(schema.validate_insert(&broken_item("X")).is_err());
    }

    #[test]
    fn populated_store_has_records() {
        let (fixture, records) = scenarios::populated(5);
        assert_eq!(records.len(), 5);
        assert_eq!(fixture.store.count(ITEM), 5);
        assert_eq!(fixture.committed_names(ITEM)[0], "item-0");
    }

    #[test]
    fn student_fixture_registers_schemas() {
        let fixture = TestRunner::students();
        let result = fixture.run_in_transaction(|tx| {
            tx.insert("Info", fields([("age", FieldValue::from("abc"))]))
        });
        assert!(result.is_err());
    }
}
