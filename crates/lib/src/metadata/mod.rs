//! The metadata façade: one front door over the stores, the clock, and rebase.
//!
//! [`Metadata`] owns the three tables and the hybrid logical clock behind a
//! single lock. Every public operation takes the lock for its full duration,
//! which is the transaction boundary the rest of the crate assumes: multi-store
//! writes are atomic, readers block on (and are blocked by) in-flight writes,
//! and concurrent calls interleave only between operations, never inside one.
//! Outbound messages are delivered to observers after the lock is released, so
//! a transport can call straight back in.
//!
//! ```
//! use tidemark::{Metadata, MetadataOptions, ObjectId, Doc};
//! use tidemark::diff::initial_to_operations;
//!
//! # fn main() -> tidemark::Result<()> {
//! let store = Metadata::open(MetadataOptions::default());
//! let root = ObjectId::new("todo/a:x");
//!
//! let mut doc = Doc::from_json(serde_json::json!({ "title": "hi" }));
//! let ops = store.with_clock(|clock| initial_to_operations(&mut doc, &root, clock))?;
//! store.insert_local_operations(ops)?;
//!
//! let snapshot = store.get_document_snapshot(&root)?.expect("present");
//! assert_eq!(snapshot.to_json(), serde_json::json!({ "title": "hi" }));
//! # Ok(())
//! # }
//! ```

mod errors;
mod rebase;

pub use errors::MetadataError;

use crate::clock::{Clock, Hlc, ReplicaId, SystemClock, Timestamp};
use crate::oid::ObjectId;
use crate::patch::{apply_patch, Operation};
use crate::store::{
    Baseline, BaselineStore, InfoStore, LocalReplicaInfo, OperationStore, Schema, StoredOperation,
};
use crate::sync::{SyncMessage, SyncObserver, SyncObserverCollection};
use crate::value::{substitute_refs, Doc, Snapshot};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Configuration for opening a [`Metadata`] store.
#[derive(Debug, Default)]
pub struct MetadataOptions {
    /// Durable replica identity. Generated when absent.
    pub replica_id: Option<ReplicaId>,
    /// The schema in effect, if the caller already knows it.
    pub schema: Option<Schema>,
    /// Time source override; real system time when absent.
    pub clock: Option<Box<dyn Clock>>,
    /// Disables both rebase triggers. Used by tooling that needs to inspect
    /// raw history.
    pub disable_rebase: bool,
}

impl MetadataOptions {
    pub fn with_replica_id(mut self, replica_id: ReplicaId) -> Self {
        self.replica_id = Some(replica_id);
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn without_rebase(mut self) -> Self {
        self.disable_rebase = true;
        self
    }
}

/// Everything the façade guards with its lock. One instance, one writer.
pub(crate) struct State {
    pub(crate) operations: OperationStore,
    pub(crate) baselines: BaselineStore,
    pub(crate) info: InfoStore,
    pub(crate) clock: Hlc,
}

/// The durable backup format: every field verbatim as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataExport {
    pub operations: Vec<StoredOperation>,
    pub baselines: Vec<Baseline>,
    pub local_replica: LocalReplicaInfo,
    pub schema: Option<Schema>,
}

/// Coordinates the operation and baseline stores, the local replica info, and
/// the clock; reconstructs documents; emits sync messages; compacts history.
pub struct Metadata {
    state: Mutex<State>,
    observers: Mutex<SyncObserverCollection>,
    closed: AtomicBool,
    disable_rebase: bool,
}

impl Metadata {
    /// Opens a store with the given options.
    pub fn open(options: MetadataOptions) -> Self {
        let replica_id = options.replica_id.unwrap_or_else(ReplicaId::generate);
        let schema_version = options.schema.as_ref().map_or(0, |s| s.version);
        let source = options.clock.unwrap_or_else(|| Box::new(SystemClock));
        let clock = Hlc::new(source, replica_id.clone(), schema_version);

        let mut info = InfoStore::new(replica_id);
        if let Some(schema) = options.schema {
            info.set_schema(schema);
        }

        Self {
            state: Mutex::new(State {
                operations: OperationStore::new(),
                baselines: BaselineStore::new(),
                info,
                clock,
            }),
            observers: Mutex::new(SyncObserverCollection::new()),
            closed: AtomicBool::new(false),
            disable_rebase: options.disable_rebase,
        }
    }

    /// Registers an observer for outbound messages and rebase events.
    pub fn register_observer(&self, observer: Arc<dyn SyncObserver>) {
        self.observers.lock().unwrap().register(observer);
    }

    /// The durable identity of this replica.
    pub fn replica_id(&self) -> ReplicaId {
        self.state.lock().unwrap().clock.replica().clone()
    }

    /// A copy of the current replica bookkeeping row.
    pub fn local_replica(&self) -> LocalReplicaInfo {
        self.state.lock().unwrap().info.replica().clone()
    }

    /// Issues the next timestamp.
    pub fn now(&self) -> Timestamp {
        self.state.lock().unwrap().clock.now()
    }

    /// Runs `f` with exclusive access to the clock.
    ///
    /// This is how the diff engine gets its stamps: the clock never leaves the
    /// façade's lock, so stamps issued here interleave correctly with every
    /// other operation.
    pub fn with_clock<R>(&self, f: impl FnOnce(&mut Hlc) -> R) -> R {
        f(&mut self.state.lock().unwrap().clock)
    }

    /// Marks the store closed. Rebase passes check the flag at the top and
    /// between iterations; in-flight transactions complete.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Persists locally authored operations, offers them to the transport,
    /// then attempts an autonomous rebase.
    ///
    /// Autonomous compaction is licensed only while this replica has never
    /// synced: with no remote participant, nothing can contradict local order,
    /// so everything up to the current local time folds away.
    pub fn insert_local_operations(&self, operations: Vec<Operation>) -> crate::Result<()> {
        if operations.is_empty() {
            return Ok(());
        }
        let (message, event) = {
            let mut state = self.state.lock().unwrap();
            let stored = operations
                .iter()
                .cloned()
                .map(StoredOperation::local)
                .collect();
            state.operations.add(stored);
            let message = SyncMessage::Operation {
                operations,
                replica_id: state.clock.replica().clone(),
            };

            let event = if !self.disable_rebase && state.info.replica().has_never_synced() {
                let watermark = state.clock.now();
                rebase::run_rebase(&mut state, &watermark, &self.closed)
            } else {
                None
            };
            (message, event)
        };

        let observers = self.observer_snapshot();
        observers.notify_message(&message);
        if let Some(event) = event {
            observers.notify_rebase(&event);
        }
        Ok(())
    }

    /// Persists operations received from the server and acknowledges the
    /// newest of them. Returns the root OIDs of the documents they touch.
    pub fn insert_remote_operations(
        &self,
        operations: Vec<Operation>,
    ) -> crate::Result<Vec<ObjectId>> {
        let (roots, message) = {
            let mut state = self.state.lock().unwrap();
            let newest = operations
                .iter()
                .map(|op| op.timestamp.clone())
                .max();
            let stored = operations.into_iter().map(StoredOperation::remote).collect();
            let roots = state.operations.add(stored);
            let message = newest.map(|timestamp| self.acknowledge(&mut state, timestamp));
            (roots, message)
        };
        if let Some(message) = message {
            self.observer_snapshot().notify_message(&message);
        }
        Ok(roots.into_iter().collect())
    }

    /// Persists baselines received from the server and acknowledges the newest
    /// of them. Returns the root OIDs of the documents they touch.
    pub fn insert_remote_baselines(
        &self,
        baselines: Vec<Baseline>,
    ) -> crate::Result<Vec<ObjectId>> {
        let (roots, message) = {
            let mut state = self.state.lock().unwrap();
            let newest = baselines.iter().map(|b| b.timestamp.clone()).max();
            let roots: BTreeSet<ObjectId> = baselines.iter().map(|b| b.oid.root()).collect();
            state.baselines.set_all(baselines);
            let message = newest.map(|timestamp| self.acknowledge(&mut state, timestamp));
            (roots, message)
        };
        if let Some(message) = message {
            self.observer_snapshot().notify_message(&message);
        }
        Ok(roots.into_iter().collect())
    }

    /// Acknowledges `timestamp`: raises the local watermark monotonically and
    /// emits an `ack` message.
    pub fn ack(&self, timestamp: &Timestamp) {
        let message = {
            let mut state = self.state.lock().unwrap();
            self.acknowledge(&mut state, timestamp.clone())
        };
        self.observer_snapshot().notify_message(&message);
    }

    fn acknowledge(&self, state: &mut State, timestamp: Timestamp) -> SyncMessage {
        state.clock.observe(&timestamp);
        state.info.raise_acked(&timestamp);
        state.info.mark_synced(&timestamp);
        SyncMessage::Ack {
            timestamp,
            replica_id: state.clock.replica().clone(),
        }
    }

    /// Records the server's global acknowledgment watermark and, unless
    /// rebasing is disabled, compacts history up to it.
    ///
    /// The server only advances this once every replica has acknowledged
    /// timestamps up to it, so nothing still in flight can causally precede
    /// the operations folded here.
    pub fn set_global_ack(&self, timestamp: &Timestamp) -> crate::Result<()> {
        let event = {
            let mut state = self.state.lock().unwrap();
            state.info.set_global_ack(timestamp);
            state.info.mark_synced(timestamp);
            state.clock.observe(timestamp);
            if self.disable_rebase {
                None
            } else {
                rebase::run_rebase(&mut state, timestamp, &self.closed)
            }
        };
        if let Some(event) = event {
            self.observer_snapshot().notify_rebase(&event);
        }
        Ok(())
    }

    /// Materializes the document rooted at `root`.
    ///
    /// Loads every baseline of the document, folds every operation over them
    /// in timestamp order, substitutes references beneath the root, and
    /// returns the result — or `None` if the root is deleted or was never
    /// initialized.
    pub fn get_document_snapshot(&self, root: &ObjectId) -> crate::Result<Option<Doc>> {
        self.require_root(root)?;
        let state = self.state.lock().unwrap();
        let prefix = root.document_prefix().to_string();

        let mut objects: BTreeMap<ObjectId, Snapshot> = BTreeMap::new();
        let mut baseline_times: BTreeMap<ObjectId, Timestamp> = BTreeMap::new();
        state.baselines.for_each_in_document(&prefix, |baseline| {
            baseline_times.insert(baseline.oid.clone(), baseline.timestamp.clone());
            if let Some(snapshot) = &baseline.snapshot {
                objects.insert(baseline.oid.clone(), snapshot.clone());
            }
        });

        let mut failed = None;
        state.operations.for_each_in_document(&prefix, None, |stored| {
            if failed.is_some() {
                return;
            }
            let operation = &stored.operation;
            // A baseline's stamp is normally below every live operation's;
            // re-check anyway so a half-folded table still replays cleanly.
            if let Some(folded_at) = baseline_times.get(&operation.oid) {
                if &operation.timestamp <= folded_at {
                    return;
                }
            }
            let base = objects.remove(&operation.oid);
            match apply_patch(base, &operation.oid, &operation.data) {
                Ok(Some(next)) => {
                    objects.insert(operation.oid.clone(), next);
                }
                Ok(None) => {}
                Err(err) => failed = Some(err),
            }
        });
        if let Some(err) = failed {
            return Err(err.into());
        }

        if !objects.contains_key(root) {
            return Ok(None);
        }
        let (doc, _) = substitute_refs(root, &objects)?;
        Ok(Some(doc))
    }

    /// Every OID appearing in baselines or operations under `root` — a
    /// superset of the OIDs reachable from the materialized document.
    pub fn get_all_document_related_oids(&self, root: &ObjectId) -> crate::Result<Vec<ObjectId>> {
        self.require_root(root)?;
        let state = self.state.lock().unwrap();
        let prefix = root.document_prefix().to_string();

        let mut oids = BTreeSet::new();
        state.baselines.for_each_in_document(&prefix, |baseline| {
            oids.insert(baseline.oid.clone());
        });
        state.operations.for_each_in_document(&prefix, None, |stored| {
            oids.insert(stored.oid().clone());
        });
        Ok(oids.into_iter().collect())
    }

    /// Replaces the stored schema.
    ///
    /// A same-version update whose shape differs from what is stored is
    /// rejected: that is silent drift, not an upgrade. Callers that mean it
    /// pass `override_conflict` equal to the stored version.
    pub fn update_schema(
        &self,
        schema: Schema,
        override_conflict: Option<u32>,
    ) -> crate::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(stored) = state.info.schema() {
            if stored.version == schema.version
                && stored.definition != schema.definition
                && override_conflict != Some(stored.version)
            {
                return Err(MetadataError::SchemaVersionConflict {
                    version: stored.version,
                }
                .into());
            }
        }
        state.clock.set_schema_version(schema.version);
        state.info.set_schema(schema);
        Ok(())
    }

    /// Everything persisted, verbatim, for durable backup.
    pub fn export(&self) -> MetadataExport {
        let state = self.state.lock().unwrap();
        MetadataExport {
            operations: state.operations.iter().cloned().collect(),
            baselines: state.baselines.iter().cloned().collect(),
            local_replica: state.info.replica().clone(),
            schema: state.info.schema().cloned(),
        }
    }

    /// Replaces all state from a backup, rehydrating the clock from the
    /// restored acked watermark.
    pub fn reset_from(&self, data: MetadataExport) -> crate::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.operations.reset();
        state.operations.add(data.operations);
        state.baselines.reset();
        state.baselines.set_all(data.baselines);

        if let Some(acked) = &data.local_replica.acked_logical_time {
            state.clock.observe(acked);
        }
        if let Some(schema) = &data.schema {
            state.clock.set_schema_version(schema.version);
            state.info.set_schema(schema.clone());
        }
        state.clock.set_replica(data.local_replica.id.clone());
        state.info.replace_replica(data.local_replica);
        Ok(())
    }

    /// Writes the export to `path` as JSON.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(&self.export())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Opens a store with `options` and restores it from a JSON export.
    pub fn load_from_file<P: AsRef<Path>>(path: P, options: MetadataOptions) -> crate::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let data: MetadataExport = serde_json::from_str(&json)?;
        let store = Self::open(options);
        store.reset_from(data)?;
        Ok(store)
    }

    /// Drops everything, including the replica's sync bookkeeping. The replica
    /// identity survives.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.operations.reset();
        state.baselines.reset();
        state.info.reset();
    }

    /// Copies the registration list so notifications run with no lock held;
    /// an observer may call straight back into the store.
    fn observer_snapshot(&self) -> SyncObserverCollection {
        self.observers.lock().unwrap().clone()
    }

    fn require_root(&self, oid: &ObjectId) -> Result<(), MetadataError> {
        if oid.is_root() {
            Ok(())
        } else {
            Err(MetadataError::NotADocumentRoot { oid: oid.clone() })
        }
    }
}

impl std::fmt::Debug for Metadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("Metadata")
            .field("replica", state.clock.replica())
            .field("operations", &state.operations.len())
            .field("baselines", &state.baselines.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
