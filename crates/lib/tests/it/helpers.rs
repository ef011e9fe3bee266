use std::sync::{Arc, Mutex};

use tidemark::clock::ReplicaId;
use tidemark::sync::{RebaseEvent, SyncMessage, SyncObserver};
use tidemark::{Doc, Metadata, MetadataOptions, ObjectId, Timestamp};

/// Opens a store with default options and a generated replica id.
pub fn open_store() -> Metadata {
    Metadata::open(MetadataOptions::default())
}

/// A server-side timestamp at logical millisecond `n`.
///
/// Encoded stamps keep lexical order equal to temporal order, so tests can
/// reason about "1 then 2 then 3" without touching a real clock.
pub fn ts(n: u64) -> Timestamp {
    Timestamp::encode(n, 0, &ReplicaId::new("server"), 1)
}

/// Builds a document tree with its root identity already assigned.
pub fn rooted(oid: &ObjectId, json: serde_json::Value) -> Doc {
    let mut doc = Doc::from_json(json);
    doc.assign_oid(oid.clone());
    doc
}

/// Captures everything the façade emits.
#[derive(Default)]
pub struct CollectingObserver {
    pub messages: Mutex<Vec<SyncMessage>>,
    pub rebases: Mutex<Vec<RebaseEvent>>,
}

impl CollectingObserver {
    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn last_ack(&self) -> Option<Timestamp> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|message| match message {
                SyncMessage::Ack { timestamp, .. } => Some(timestamp.clone()),
                _ => None,
            })
    }
}

impl SyncObserver for CollectingObserver {
    fn on_message(&self, message: &SyncMessage) {
        self.messages.lock().unwrap().push(message.clone());
    }

    fn on_rebase(&self, event: &RebaseEvent) {
        self.rebases.lock().unwrap().push(event.clone());
    }
}

/// Opens a store with a collecting observer already registered.
pub fn observed_store() -> (Metadata, Arc<CollectingObserver>) {
    let store = open_store();
    let observer = Arc::new(CollectingObserver::default());
    store.register_observer(observer.clone());
    (store, observer)
}
