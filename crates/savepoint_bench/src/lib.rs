//! Benchmark utilities.

#![warn(missing_docs)]

use savepoint_core::{CreateRecord, OperationSequence, TransactionRunner};
use savepoint_store::{fields, FieldValue, Fields, InMemoryStore};
use std::sync::Arc;

/// Entity type written by the benchmarks.
pub const BENCH_TYPE: &str = "Bench";

/// Creates a runner over a fresh in-memory store.
pub fn fresh_runner() -> (Arc<InMemoryStore>, TransactionRunner) {
    let store = Arc::new(InMemoryStore::new());
    let runner = TransactionRunner::new(store.clone());
    (store, runner)
}

/// Fields of the `i`-th benchmark record.
pub fn row(i: usize) -> Fields {
    fields([
        ("n", FieldValue::Int(i as i64)),
        ("label", FieldValue::Text(format!("row-{i}"))),
    ])
}

/// Generate a sequence of `count` inserts.
pub fn insert_sequence(count: usize) -> OperationSequence {
    let mut sequence = OperationSequence::new();
    for i in 0..count {
        sequence.push(CreateRecord::new(BENCH_TYPE, row(i)));
    }
    sequence
}
