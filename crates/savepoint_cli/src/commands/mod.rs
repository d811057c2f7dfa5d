//! CLI command implementations.

pub mod enroll;
pub mod scenario;

use savepoint_store::InMemoryStore;
use std::collections::BTreeMap;

/// Error raised by a command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Unknown scenario name.
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    /// Store could not be read.
    #[error(transparent)]
    Store(#[from] savepoint_store::StoreError),
}

/// Committed record counts per entity type.
pub fn committed_counts(store: &InMemoryStore) -> BTreeMap<String, usize> {
    store
        .entity_types()
        .into_iter()
        .map(|entity_type| {
            let count = store.count(&entity_type);
            (entity_type, count)
        })
        .collect()
}

pub(crate) fn format_counts(counts: &BTreeMap<String, usize>) -> String {
    if counts.is_empty() {
        return "(empty)".to_string();
    }
    counts
        .iter()
        .map(|(entity_type, count)| format!("{entity_type}={count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_counts_lists_entity_types() {
        let mut counts = BTreeMap::new();
        assert_eq!(format_counts(&counts), "(empty)");
        counts.insert("Item".to_string(), 2);
        counts.insert("Student".to_string(), 1);
        assert_eq!(format_counts(&counts), "Item=2, Student=1");
    }
}
