//! Transaction and savepoint state.
//!
//! A [`Transaction`] buffers its writes in an ordered log. A savepoint is a
//! mark into that log: rolling back to it truncates the log at the mark,
//! releasing it keeps the writes. Stores apply the surviving log on commit.

use crate::error::{StoreError, StoreResult};
use crate::record::{Record, RecordId};
use crate::types::{SavepointId, TransactionId};
use serde::Serialize;
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

/// State of a savepoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SavepointState {
    /// Savepoint can be released or rolled back to.
    Active,
    /// Savepoint was released; its writes stay in the transaction.
    Released,
    /// Transaction was rolled back to this savepoint.
    RolledBack,
}

/// Handle to a savepoint.
///
/// The handle is a plain value that names its owning transaction. It does not
/// keep the transaction alive. Any other transaction rejects it, including
/// one with the same id begun by a different store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Savepoint {
    id: SavepointId,
    txid: TransactionId,
    /// Identity token of the owning transaction.
    token: Uuid,
    depth: usize,
}

impl Savepoint {
    /// Returns the savepoint ID.
    #[must_use]
    pub fn id(&self) -> SavepointId {
        self.id
    }

    /// Returns the owning transaction ID.
    #[must_use]
    pub fn txid(&self) -> TransactionId {
        self.txid
    }

    /// Returns the nesting depth (1 for an outermost savepoint).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// A buffered write.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    /// Insert or replace a record.
    Put(Record),
    /// Delete a record.
    Delete {
        /// Entity type of the deleted record.
        entity_type: String,
        /// Deleted record id.
        id: RecordId,
    },
}

impl PendingWrite {
    /// Returns the `(entity_type, id)` key the write targets.
    #[must_use]
    pub fn key(&self) -> (&str, RecordId) {
        match self {
            Self::Put(record) => (record.entity_type.as_str(), record.id),
            Self::Delete { entity_type, id } => (entity_type.as_str(), *id),
        }
    }
}

/// Weak registration of a transaction, kept by the store that began it.
///
/// A lease only matches the transaction it was taken from, and stops being
/// live once that transaction is dropped. Stores use it to recognize their
/// own transactions and to forget ones that were dropped unfinished.
#[derive(Debug, Clone)]
pub struct TransactionLease(Weak<Uuid>);

impl TransactionLease {
    /// Returns true while the transaction still exists.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Returns true if the lease was taken from `txn`.
    #[must_use]
    pub fn is_held_by(&self, txn: &Transaction) -> bool {
        std::ptr::eq(self.0.as_ptr(), Arc::as_ptr(&txn.lease))
    }
}

#[derive(Debug)]
struct SavepointEntry {
    handle: Savepoint,
    mark: usize,
    state: SavepointState,
}

/// An active transaction.
///
/// Changes made within a transaction are not visible to other readers until
/// commit. Transactions are created by a
/// [`TransactionalStore`](crate::TransactionalStore) and threaded explicitly
/// through every store call.
#[derive(Debug)]
pub struct Transaction {
    /// Transaction ID.
    id: TransactionId,
    /// Identity token; unique even when ids repeat across stores.
    lease: Arc<Uuid>,
    /// Current state.
    state: TransactionState,
    /// Write log in application order.
    writes: Vec<PendingWrite>,
    /// Every savepoint ever created, in creation order.
    savepoints: Vec<SavepointEntry>,
    /// Next savepoint ID.
    next_savepoint: u64,
}

impl Transaction {
    /// Creates a new transaction with a fresh identity token.
    ///
    /// Only store implementations should call this. The store keeps the
    /// [`lease`](Self::lease) to recognize the transaction later; another
    /// transaction created with the same id does not match it.
    #[must_use]
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            lease: Arc::new(Uuid::new_v4()),
            state: TransactionState::Active,
            writes: Vec::new(),
            savepoints: Vec::new(),
            next_savepoint: 1,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Takes a lease on this transaction.
    #[must_use]
    pub fn lease(&self) -> TransactionLease {
        TransactionLease(Arc::downgrade(&self.lease))
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Ensures the transaction is active.
    pub fn ensure_active(&self) -> StoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            state => Err(StoreError::TransactionNotActive {
                txid: self.id,
                state,
            }),
        }
    }

    /// Appends a put to the write log.
    pub fn put(&mut self, record: Record) -> StoreResult<()> {
        self.ensure_active()?;
        self.writes.push(PendingWrite::Put(record));
        Ok(())
    }

    /// Appends a delete to the write log.
    pub fn delete(&mut self, entity_type: impl Into<String>, id: RecordId) -> StoreResult<()> {
        self.ensure_active()?;
        self.writes.push(PendingWrite::Delete {
            entity_type: entity_type.into(),
            id,
        });
        Ok(())
    }

    /// Returns the latest pending write for a record, if any.
    #[must_use]
    pub fn pending(&self, entity_type: &str, id: RecordId) -> Option<&PendingWrite> {
        self.writes
            .iter()
            .rev()
            .find(|w| w.key() == (entity_type, id))
    }

    /// Returns all pending writes in application order.
    pub fn pending_writes(&self) -> impl Iterator<Item = &PendingWrite> {
        self.writes.iter()
    }

    /// Returns the number of pending writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Returns the number of active (nested) savepoints.
    #[must_use]
    pub fn savepoint_depth(&self) -> usize {
        self.savepoints
            .iter()
            .filter(|e| e.state == SavepointState::Active)
            .count()
    }

    /// Returns the state of a savepoint created by this transaction.
    #[must_use]
    pub fn savepoint_state(&self, savepoint: &Savepoint) -> Option<SavepointState> {
        if !self.owns(savepoint) {
            return None;
        }
        self.savepoints
            .iter()
            .find(|e| e.handle.id == savepoint.id)
            .map(|e| e.state)
    }

    /// Creates a savepoint at the current end of the write log.
    pub fn create_savepoint(&mut self) -> StoreResult<Savepoint> {
        self.ensure_active()?;

        let handle = Savepoint {
            id: SavepointId::new(self.next_savepoint),
            txid: self.id,
            token: *self.lease,
            depth: self.savepoint_depth() + 1,
        };
        self.next_savepoint += 1;
        self.savepoints.push(SavepointEntry {
            handle,
            mark: self.writes.len(),
            state: SavepointState::Active,
        });
        Ok(handle)
    }

    /// Releases a savepoint and every savepoint nested inside it.
    ///
    /// Writes made since the savepoint stay in the transaction.
    pub fn release_savepoint(&mut self, savepoint: &Savepoint) -> StoreResult<()> {
        let idx = self.locate_active(savepoint)?;
        self.finish_from(idx, SavepointState::Released);
        Ok(())
    }

    /// Discards every write made since the savepoint was created.
    ///
    /// The savepoint and every savepoint nested inside it become terminal.
    /// Returns the number of discarded writes.
    pub fn rollback_to_savepoint(&mut self, savepoint: &Savepoint) -> StoreResult<usize> {
        let idx = self.locate_active(savepoint)?;
        let mark = self.savepoints[idx].mark;
        let discarded = self.writes.len() - mark;
        self.writes.truncate(mark);
        self.finish_from(idx, SavepointState::RolledBack);
        Ok(discarded)
    }

    /// Marks the transaction as committed.
    ///
    /// Only store implementations should call this.
    pub fn mark_committed(&mut self) {
        self.state = TransactionState::Committed;
        self.finish_from(0, SavepointState::Released);
    }

    /// Marks the transaction as aborted and drops its write log.
    ///
    /// Only store implementations should call this.
    pub fn mark_aborted(&mut self) {
        self.state = TransactionState::Aborted;
        self.finish_from(0, SavepointState::RolledBack);
        self.writes.clear();
    }

    fn owns(&self, savepoint: &Savepoint) -> bool {
        savepoint.txid == self.id && savepoint.token == *self.lease
    }

    fn locate_active(&self, savepoint: &Savepoint) -> StoreResult<usize> {
        if !self.owns(savepoint) {
            return Err(StoreError::ForeignSavepoint {
                savepoint: savepoint.id,
                owner: savepoint.txid,
                txid: self.id,
            });
        }
        self.ensure_active()?;

        let idx = self
            .savepoints
            .iter()
            .position(|e| e.handle.id == savepoint.id)
            .ok_or(StoreError::UnknownSavepoint {
                savepoint: savepoint.id,
                txid: self.id,
            })?;

        match self.savepoints[idx].state {
            SavepointState::Active => Ok(idx),
            state => Err(StoreError::SavepointNotActive {
                savepoint: savepoint.id,
                state,
            }),
        }
    }

    fn finish_from(&mut self, idx: usize, terminal: SavepointState) {
        for entry in &mut self.savepoints[idx..] {
            if entry.state == SavepointState::Active {
                entry.state = terminal;
            }
        }
    }
}
