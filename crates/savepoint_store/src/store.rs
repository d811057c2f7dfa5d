//! Transactional store trait definition.

use crate::error::StoreResult;
use crate::record::{Fields, Record, RecordId};
use crate::transaction::{Savepoint, Transaction};
use crate::types::SequenceNumber;

/// A persistence layer with atomic commit/abort and nested savepoints.
///
/// Every call takes the transaction explicitly; there is no ambient
/// "current transaction". Writes go into the transaction and become visible
/// to other readers only when [`commit`](Self::commit) succeeds.
///
/// # Invariants
///
/// - A transaction is either active, committed or aborted; terminal states
///   are final and every further call with it fails
/// - `rollback_to` discards exactly the writes made since the savepoint was
///   created, earlier writes stay in the transaction
/// - Releasing or rolling back a savepoint makes it terminal; using it again
///   is an error, never a silent no-op
/// - Implementations must be `Send + Sync` so one store can serve many
///   concurrent transactions
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For tests, demos and ephemeral data
pub trait TransactionalStore: Send + Sync {
    /// Begins a new transaction.
    ///
    /// The caller must finish the transaction with [`commit`](Self::commit)
    /// or [`abort`](Self::abort). A transaction dropped unfinished discards
    /// its buffered writes; stores should use its
    /// [`lease`](Transaction::lease) to stop tracking it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    fn begin(&self) -> StoreResult<Transaction>;

    /// Commits a transaction, making all its surviving writes visible at once.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is not active, was not started by
    /// this store, or the store is unavailable. On error the transaction
    /// stays active so the caller can abort it.
    fn commit(&self, txn: &mut Transaction) -> StoreResult<SequenceNumber>;

    /// Aborts a transaction, discarding all its writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is not active or was not started
    /// by this store.
    fn abort(&self, txn: &mut Transaction) -> StoreResult<()>;

    /// Creates a savepoint at the current position of the transaction.
    fn savepoint(&self, txn: &mut Transaction) -> StoreResult<Savepoint>;

    /// Releases a savepoint, keeping the writes made since it.
    fn release(&self, txn: &mut Transaction, savepoint: Savepoint) -> StoreResult<()>;

    /// Rolls back to a savepoint and returns the number of discarded writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the savepoint was already released or rolled back,
    /// belongs to another transaction, or the store is unavailable.
    fn rollback_to(&self, txn: &mut Transaction, savepoint: Savepoint) -> StoreResult<usize>;

    /// Inserts a new record and returns it with its assigned id.
    fn insert(&self, txn: &mut Transaction, entity_type: &str, fields: Fields)
        -> StoreResult<Record>;

    /// Merges `fields` into an existing record and returns the result.
    fn update(
        &self,
        txn: &mut Transaction,
        entity_type: &str,
        id: RecordId,
        fields: Fields,
    ) -> StoreResult<Record>;

    /// Deletes a record and returns its last visible version.
    fn delete(&self, txn: &mut Transaction, entity_type: &str, id: RecordId)
        -> StoreResult<Record>;

    /// Reads a record as seen by the transaction, including its own writes.
    fn get(&self, txn: &Transaction, entity_type: &str, id: RecordId)
        -> StoreResult<Option<Record>>;

    /// Reads the latest committed version of a record.
    fn get_committed(&self, entity_type: &str, id: RecordId) -> StoreResult<Option<Record>>;

    /// Lists all committed records of an entity type.
    fn list_committed(&self, entity_type: &str) -> StoreResult<Vec<Record>>;
}
