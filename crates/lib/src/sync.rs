//! Outbound sync messages and the observer seam the transport attaches to.
//!
//! The core never talks to a socket. It emits [`SyncMessage`]s — the exact
//! transport-agnostic payloads a server expects — and [`RebaseEvent`]s for
//! internal observers, through whatever [`SyncObserver`]s are registered on
//! the façade. Observer failures are the observer's problem: delivery happens
//! after the triggering write has committed and never rolls it back.

use crate::clock::{ReplicaId, Timestamp};
use crate::patch::Operation;
use crate::store::Baseline;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A message bound for the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SyncMessage {
    /// Locally authored operations for the server to order and distribute.
    Operation {
        operations: Vec<Operation>,
        replica_id: ReplicaId,
    },
    /// Acknowledgment that everything at or below `timestamp` has been seen.
    Ack {
        timestamp: Timestamp,
        replica_id: ReplicaId,
    },
}

/// Notification that rebase folded history into new baselines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebaseEvent {
    pub baselines: Vec<Baseline>,
}

/// Receives outbound messages and rebase notifications from the façade.
///
/// Notifications run on the caller's thread with no façade lock held, so an
/// observer may call straight back into the store.
pub trait SyncObserver: Send + Sync {
    /// Called with each outbound message, after the write that produced it
    /// has committed.
    fn on_message(&self, message: &SyncMessage);

    /// Called after a rebase pass with the baselines it wrote.
    fn on_rebase(&self, _event: &RebaseEvent) {}
}

/// A registration list of observers, notified in registration order.
#[derive(Default, Clone)]
pub struct SyncObserverCollection {
    observers: Vec<Arc<dyn SyncObserver>>,
}

impl SyncObserverCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Arc<dyn SyncObserver>) {
        self.observers.push(observer);
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn notify_message(&self, message: &SyncMessage) {
        for observer in &self.observers {
            observer.on_message(message);
        }
    }

    pub fn notify_rebase(&self, event: &RebaseEvent) {
        for observer in &self.observers {
            observer.on_rebase(event);
        }
    }
}

impl std::fmt::Debug for SyncObserverCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncObserverCollection")
            .field("observers", &self.observers.len())
            .finish()
    }
}
