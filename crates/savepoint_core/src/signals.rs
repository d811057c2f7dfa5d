//! Transaction lifecycle signals.
//!
//! Receivers are plain closures called synchronously, in connection order,
//! right after the event happened. A receiver connected with a dispatch uid
//! is only registered once no matter how often the connection is repeated.
//!
//! ```rust
//! use savepoint_core::{TransactionEvent, TransactionRunner};
//! use savepoint_store::InMemoryStore;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let runner = TransactionRunner::new(Arc::new(InMemoryStore::new()));
//! let commits = Arc::new(AtomicUsize::new(0));
//! let seen = Arc::clone(&commits);
//! runner.signals().connect_with_uid("count_commits", move |event| {
//!     if matches!(event, TransactionEvent::Committed { .. }) {
//!         seen.fetch_add(1, Ordering::SeqCst);
//!     }
//! });
//!
//! runner.run_in_transaction(|_tx| Ok(())).unwrap();
//! assert_eq!(commits.load(Ordering::SeqCst), 1);
//! ```

use parking_lot::RwLock;
use savepoint_store::{SavepointId, SequenceNumber, TransactionId};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// An event in the life of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransactionEvent {
    /// A transaction began.
    Begun {
        /// Transaction ID.
        txid: TransactionId,
    },
    /// A transaction committed.
    Committed {
        /// Transaction ID.
        txid: TransactionId,
        /// Commit sequence number.
        sequence: SequenceNumber,
    },
    /// A transaction aborted.
    Aborted {
        /// Transaction ID.
        txid: TransactionId,
        /// Error that caused the abort, if any.
        reason: Option<String>,
    },
    /// A savepoint was created.
    SavepointCreated {
        /// Transaction ID.
        txid: TransactionId,
        /// Savepoint ID.
        savepoint: SavepointId,
        /// Nesting depth.
        depth: usize,
    },
    /// A savepoint was released.
    SavepointReleased {
        /// Transaction ID.
        txid: TransactionId,
        /// Savepoint ID.
        savepoint: SavepointId,
    },
    /// The transaction rolled back to a savepoint.
    SavepointRolledBack {
        /// Transaction ID.
        txid: TransactionId,
        /// Savepoint ID.
        savepoint: SavepointId,
        /// Number of discarded writes.
        discarded: usize,
        /// Error that caused the rollback, if any.
        error: Option<String>,
    },
}

impl TransactionEvent {
    /// Returns the transaction the event belongs to.
    #[must_use]
    pub fn txid(&self) -> TransactionId {
        match self {
            Self::Begun { txid }
            | Self::Committed { txid, .. }
            | Self::Aborted { txid, .. }
            | Self::SavepointCreated { txid, .. }
            | Self::SavepointReleased { txid, .. }
            | Self::SavepointRolledBack { txid, .. } => *txid,
        }
    }

    /// Returns the event name used in logs and serialized output.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Begun { .. } => "begun",
            Self::Committed { .. } => "committed",
            Self::Aborted { .. } => "aborted",
            Self::SavepointCreated { .. } => "savepoint_created",
            Self::SavepointReleased { .. } => "savepoint_released",
            Self::SavepointRolledBack { .. } => "savepoint_rolled_back",
        }
    }
}

type Receiver = Arc<dyn Fn(&TransactionEvent) + Send + Sync>;

struct Connection {
    uid: Option<String>,
    receiver: Receiver,
}

/// Registry of transaction event receivers.
#[derive(Default)]
pub struct TransactionSignals {
    connections: RwLock<Vec<Connection>>,
}

impl TransactionSignals {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects a receiver.
    pub fn connect<F>(&self, receiver: F)
    where
        F: Fn(&TransactionEvent) + Send + Sync + 'static,
    {
        self.connections.write().push(Connection {
            uid: None,
            receiver: Arc::new(receiver),
        });
    }

    /// Connects a receiver under a dispatch uid.
    ///
    /// Returns `false` (and drops `receiver`) if the uid is already taken.
    pub fn connect_with_uid<F>(&self, uid: impl Into<String>, receiver: F) -> bool
    where
        F: Fn(&TransactionEvent) + Send + Sync + 'static,
    {
        let uid = uid.into();
        let mut connections = self.connections.write();
        if connections
            .iter()
            .any(|c| c.uid.as_deref() == Some(uid.as_str()))
        {
            return false;
        }
        connections.push(Connection {
            uid: Some(uid),
            receiver: Arc::new(receiver),
        });
        true
    }

    /// Disconnects the receiver registered under `uid`.
    pub fn disconnect(&self, uid: &str) -> bool {
        let mut connections = self.connections.write();
        let before = connections.len();
        connections.retain(|c| c.uid.as_deref() != Some(uid));
        connections.len() != before
    }

    /// Disconnects every receiver.
    pub fn clear(&self) {
        self.connections.write().clear();
    }

    /// Returns the number of connected receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Delivers an event to every receiver and returns how many were called.
    pub fn send(&self, event: &TransactionEvent) -> usize {
        // receivers may connect or disconnect while being called
        let receivers: Vec<Receiver> = self
            .connections
            .read()
            .iter()
            .map(|c| Arc::clone(&c.receiver))
            .collect();

        for receiver in &receivers {
            receiver(event);
        }
        receivers.len()
    }
}

impl fmt::Debug for TransactionSignals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionSignals")
            .field("receiver_count", &self.receiver_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn begun(id: u64) -> TransactionEvent {
        TransactionEvent::Begun {
            txid: TransactionId::new(id),
        }
    }

    #[test]
    fn send_reaches_all_receivers_in_order() {
        let signals = TransactionSignals::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let log = Arc::clone(&log);
            signals.connect(move |event| log.lock().push((tag, event.txid())));
        }

        assert_eq!(signals.send(&begun(7)), 2);
        assert_eq!(
            *log.lock(),
            vec![("first", TransactionId::new(7)), ("second", TransactionId::new(7))]
        );
    }

    #[test]
    fn dispatch_uid_prevents_duplicates() {
        let signals = TransactionSignals::new();
        assert!(signals.connect_with_uid("my_signal_receiver", |_| {}));
        assert!(!signals.connect_with_uid("my_signal_receiver", |_| {}));
        assert_eq!(signals.receiver_count(), 1);
    }

    #[test]
    fn disconnect_by_uid() {
        let signals = TransactionSignals::new();
        signals.connect_with_uid("a", |_| {});
        signals.connect(|_| {});

        assert!(signals.disconnect("a"));
        assert!(!signals.disconnect("a"));
        assert_eq!(signals.receiver_count(), 1);

        signals.clear();
        assert_eq!(signals.send(&begun(1)), 0);
    }

    #[test]
    fn receiver_may_connect_during_send() {
        let signals = Arc::new(TransactionSignals::new());
        let inner = Arc::clone(&signals);
        signals.connect(move |_| {
            inner.connect_with_uid("late", |_| {});
        });

        signals.send(&begun(1));
        assert_eq!(signals.receiver_count(), 2);
    }

    #[test]
    fn event_serializes_with_tag() {
        let event = TransactionEvent::SavepointRolledBack {
            txid: TransactionId::new(1),
            savepoint: SavepointId::new(2),
            discarded: 3,
            error: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "savepoint_rolled_back");
        assert_eq!(json["discarded"], 3);
        assert_eq!(event.name(), "savepoint_rolled_back");
    }
}
