//! In-memory transactional store.

use crate::error::{StoreError, StoreResult};
use crate::record::{Fields, Record, RecordId};
use crate::schema::EntitySchema;
use crate::store::TransactionalStore;
use crate::transaction::{PendingWrite, Savepoint, Transaction, TransactionLease};
use crate::types::{SequenceNumber, TransactionId};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, trace};

/// An in-memory transactional store.
///
/// Writes are buffered in each [`Transaction`] and applied to the shared
/// record map under a commit lock, so readers only ever observe committed
/// state (read-committed isolation). A transaction reads its own writes.
///
/// Suitable for:
/// - Unit and integration tests
/// - Demos and ephemeral data
///
/// # Thread Safety
///
/// The store is `Send + Sync` and can be shared across threads behind an
/// `Arc`; each transaction is owned by a single unit of work.
///
/// # Example
///
/// ```rust
/// use savepoint_store::{fields, FieldValue, InMemoryStore, TransactionalStore};
///
/// let store = InMemoryStore::new();
/// let mut txn = store.begin().unwrap();
/// let record = store
///     .insert(&mut txn, "Student", fields([("name", FieldValue::from("Zhang San"))]))
///     .unwrap();
/// store.commit(&mut txn).unwrap();
/// assert!(store.get_committed("Student", record.id).unwrap().is_some());
/// ```
#[derive(Debug)]
pub struct InMemoryStore {
    /// Committed records by entity type.
    records: RwLock<BTreeMap<String, BTreeMap<RecordId, Record>>>,
    /// Registered schemas by entity type.
    schemas: RwLock<HashMap<String, EntitySchema>>,
    /// Next transaction ID.
    next_txid: AtomicU64,
    /// Sequence of the last commit.
    committed_seq: AtomicU64,
    /// Transactions begun and not yet finished, by lease.
    ///
    /// A transaction dropped without commit or abort leaves a dead lease
    /// behind, which is pruned on the next `begin` and never counted.
    active_txns: RwLock<HashMap<TransactionId, TransactionLease>>,
    /// Serializes commits.
    commit_lock: Mutex<()>,
    /// Cleared to simulate an outage.
    online: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            schemas: RwLock::new(HashMap::new()),
            next_txid: AtomicU64::new(1),
            committed_seq: AtomicU64::new(0),
            active_txns: RwLock::new(HashMap::new()),
            commit_lock: Mutex::new(()),
            online: AtomicBool::new(true),
        }
    }
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema, returning the store.
    #[must_use]
    pub fn with_schema(self, schema: EntitySchema) -> Self {
        self.register_schema(schema);
        self
    }

    /// Registers (or replaces) the schema of an entity type.
    pub fn register_schema(&self, schema: EntitySchema) {
        self.schemas
            .write()
            .insert(schema.name().to_string(), schema);
    }

    /// Takes the store offline or brings it back.
    ///
    /// While offline every call except `abort` fails with
    /// [`StoreError::Unavailable`].
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        debug!(online, "store availability changed");
    }

    /// Returns whether the store is reachable.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Returns the sequence number of the last commit.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        SequenceNumber::new(self.committed_seq.load(Ordering::SeqCst))
    }

    /// Returns the number of active transactions.
    ///
    /// Transactions dropped without commit or abort are not counted.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active_txns
            .read()
            .values()
            .filter(|lease| lease.is_live())
            .count()
    }

    /// Returns the number of committed records of an entity type.
    #[must_use]
    pub fn count(&self, entity_type: &str) -> usize {
        self.records
            .read()
            .get(entity_type)
            .map_or(0, BTreeMap::len)
    }

    /// Returns the total number of committed records.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.records.read().values().map(BTreeMap::len).sum()
    }

    /// Returns the entity types that have committed records.
    #[must_use]
    pub fn entity_types(&self) -> Vec<String> {
        self.records
            .read()
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(StoreError::unavailable("in-memory store is offline"))
        }
    }

    fn ensure_known(&self, txn: &Transaction) -> StoreResult<()> {
        match self.active_txns.read().get(&txn.id()) {
            Some(lease) if lease.is_held_by(txn) => Ok(()),
            _ => Err(StoreError::UnknownTransaction { txid: txn.id() }),
        }
    }

    /// Rejects transactions begun by another store. Finished transactions
    /// fall through so the transaction reports its own state.
    fn ensure_owned(&self, txn: &Transaction) -> StoreResult<()> {
        if txn.is_active() {
            self.ensure_known(txn)
        } else {
            Ok(())
        }
    }

    fn forget(&self, txid: TransactionId) {
        self.active_txns.write().remove(&txid);
    }

    /// Checks the store and transaction before a data operation.
    fn ready(&self, txn: &Transaction) -> StoreResult<()> {
        self.ensure_online()?;
        txn.ensure_active()?;
        self.ensure_known(txn)
    }

    fn validate(&self, entity_type: &str, fields: &Fields, insert: bool) -> StoreResult<()> {
        match self.schemas.read().get(entity_type) {
            Some(schema) if insert => schema.validate_insert(fields),
            Some(schema) => schema.validate_update(fields),
            None => Ok(()),
        }
    }

    fn visible(&self, txn: &Transaction, entity_type: &str, id: RecordId) -> Option<Record> {
        match txn.pending(entity_type, id) {
            Some(PendingWrite::Put(record)) => Some(record.clone()),
            Some(PendingWrite::Delete { .. }) => None,
            None => self
                .records
                .read()
                .get(entity_type)
                .and_then(|records| records.get(&id))
                .cloned(),
        }
    }
}

impl TransactionalStore for InMemoryStore {
    fn begin(&self) -> StoreResult<Transaction> {
        self.ensure_online()?;

        let txid = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        let txn = Transaction::new(txid);
        {
            let mut active = self.active_txns.write();
            active.retain(|_, lease| lease.is_live());
            active.insert(txid, txn.lease());
        }
        debug!(%txid, "transaction begun");

        Ok(txn)
    }

    fn commit(&self, txn: &mut Transaction) -> StoreResult<SequenceNumber> {
        self.ready(txn)?;

        let _guard = self.commit_lock.lock();
        let txid = txn.id();

        {
            let mut records = self.records.write();
            for write in txn.pending_writes() {
                match write {
                    PendingWrite::Put(record) => {
                        records
                            .entry(record.entity_type.clone())
                            .or_default()
                            .insert(record.id, record.clone());
                    }
                    PendingWrite::Delete { entity_type, id } => {
                        if let Some(by_type) = records.get_mut(entity_type) {
                            by_type.remove(id);
                        }
                    }
                }
            }
        }

        let sequence = SequenceNumber::new(self.committed_seq.fetch_add(1, Ordering::SeqCst) + 1);
        self.forget(txid);
        let writes = txn.write_count();
        txn.mark_committed();

        debug!(%txid, %sequence, writes, "transaction committed");
        Ok(sequence)
    }

    fn abort(&self, txn: &mut Transaction) -> StoreResult<()> {
        txn.ensure_active()?;
        self.ensure_known(txn)?;

        let txid = txn.id();
        self.forget(txid);
        let discarded = txn.write_count();
        txn.mark_aborted();

        debug!(%txid, discarded, "transaction aborted");
        Ok(())
    }

    fn savepoint(&self, txn: &mut Transaction) -> StoreResult<Savepoint> {
        self.ready(txn)?;
        let savepoint = txn.create_savepoint()?;
        trace!(txid = %txn.id(), savepoint = %savepoint.id(), depth = savepoint.depth(), "savepoint created");
        Ok(savepoint)
    }

    fn release(&self, txn: &mut Transaction, savepoint: Savepoint) -> StoreResult<()> {
        self.ensure_online()?;
        self.ensure_owned(txn)?;
        txn.release_savepoint(&savepoint)?;
        trace!(txid = %txn.id(), savepoint = %savepoint.id(), "savepoint released");
        Ok(())
    }

    fn rollback_to(&self, txn: &mut Transaction, savepoint: Savepoint) -> StoreResult<usize> {
        self.ensure_online()?;
        self.ensure_owned(txn)?;
        let discarded = txn.rollback_to_savepoint(&savepoint)?;
        debug!(txid = %txn.id(), savepoint = %savepoint.id(), discarded, "rolled back to savepoint");
        Ok(discarded)
    }

    fn insert(
        &self,
        txn: &mut Transaction,
        entity_type: &str,
        fields: Fields,
    ) -> StoreResult<Record> {
        self.ready(txn)?;
        self.validate(entity_type, &fields, true)?;

        let record = Record::new(entity_type, fields);
        txn.put(record.clone())?;
        trace!(txid = %txn.id(), entity_type, id = %record.id, "insert");
        Ok(record)
    }

    fn update(
        &self,
        txn: &mut Transaction,
        entity_type: &str,
        id: RecordId,
        fields: Fields,
    ) -> StoreResult<Record> {
        self.ready(txn)?;
        let mut record = self
            .visible(txn, entity_type, id)
            .ok_or_else(|| StoreError::record_not_found(entity_type, id))?;
        self.validate(entity_type, &fields, false)?;

        record.fields.extend(fields);
        txn.put(record.clone())?;
        trace!(txid = %txn.id(), entity_type, %id, "update");
        Ok(record)
    }

    fn delete(
        &self,
        txn: &mut Transaction,
        entity_type: &str,
        id: RecordId,
    ) -> StoreResult<Record> {
        self.ready(txn)?;
        let record = self
            .visible(txn, entity_type, id)
            .ok_or_else(|| StoreError::record_not_found(entity_type, id))?;

        txn.delete(entity_type, id)?;
        trace!(txid = %txn.id(), entity_type, %id, "delete");
        Ok(record)
    }

    fn get(
        &self,
        txn: &Transaction,
        entity_type: &str,
        id: RecordId,
    ) -> StoreResult<Option<Record>> {
        self.ready(txn)?;
        Ok(self.visible(txn, entity_type, id))
    }

    fn get_committed(&self, entity_type: &str, id: RecordId) -> StoreResult<Option<Record>> {
        self.ensure_online()?;
        Ok(self
            .records
            .read()
            .get(entity_type)
            .and_then(|records| records.get(&id))
            .cloned())
    }

    fn list_committed(&self, entity_type: &str) -> StoreResult<Vec<Record>> {
        self.ensure_online()?;
        Ok(self
            .records
            .read()
            .get(entity_type)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }
}
