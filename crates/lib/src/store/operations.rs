//! The append-only operation table.

use crate::clock::Timestamp;
use crate::oid::ObjectId;
use crate::patch::Operation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// An operation as persisted: the operation itself plus whether this replica
/// authored it. Only local operations are offered to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredOperation {
    #[serde(flatten)]
    pub operation: Operation,
    #[serde(default)]
    pub is_local: bool,
}

impl StoredOperation {
    pub fn local(operation: Operation) -> Self {
        Self {
            operation,
            is_local: true,
        }
    }

    pub fn remote(operation: Operation) -> Self {
        Self {
            operation,
            is_local: false,
        }
    }

    pub fn oid(&self) -> &ObjectId {
        &self.operation.oid
    }

    pub fn timestamp(&self) -> &Timestamp {
        &self.operation.timestamp
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct OperationKey {
    oid: ObjectId,
    timestamp: Timestamp,
}

/// Index of `(oid, timestamp) -> operation` with secondary access by exact OID
/// and by document root.
///
/// The primary map keys compound on `(oid, timestamp)` so a scan over one OID
/// returns a timestamp-ordered run. The secondary set orders the same rows by
/// `(document, timestamp, oid)` so a whole-document scan is timestamp-ordered
/// too. Rows are immutable once inserted; the only deletion path is rebase
/// folding them into baselines.
#[derive(Debug, Default)]
pub struct OperationStore {
    operations: BTreeMap<OperationKey, StoredOperation>,
    by_document: BTreeSet<(String, Timestamp, ObjectId)>,
}

impl OperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batch-inserts operations, deduplicating on `(oid, timestamp)`.
    ///
    /// Returns the set of document root OIDs the batch touched (including
    /// roots of deduplicated rows: the caller still owns reacting to them).
    pub fn add(&mut self, operations: Vec<StoredOperation>) -> BTreeSet<ObjectId> {
        let mut roots = BTreeSet::new();
        for stored in operations {
            roots.insert(stored.oid().root());
            let key = OperationKey {
                oid: stored.oid().clone(),
                timestamp: stored.timestamp().clone(),
            };
            if self.operations.contains_key(&key) {
                continue;
            }
            self.by_document.insert((
                stored.oid().document_prefix().to_string(),
                stored.timestamp().clone(),
                stored.oid().clone(),
            ));
            self.operations.insert(key, stored);
        }
        roots
    }

    pub fn get(&self, oid: &ObjectId, timestamp: &Timestamp) -> Option<&StoredOperation> {
        self.operations.get(&OperationKey {
            oid: oid.clone(),
            timestamp: timestamp.clone(),
        })
    }

    /// Removes one row, keeping the secondary order in step.
    pub fn remove(&mut self, oid: &ObjectId, timestamp: &Timestamp) -> Option<StoredOperation> {
        let removed = self.operations.remove(&OperationKey {
            oid: oid.clone(),
            timestamp: timestamp.clone(),
        })?;
        self.by_document.remove(&(
            oid.document_prefix().to_string(),
            timestamp.clone(),
            oid.clone(),
        ));
        Some(removed)
    }

    /// Visits every operation of the document `prefix` in timestamp order,
    /// optionally truncating at `to` (inclusive).
    pub fn for_each_in_document(
        &self,
        prefix: &str,
        to: Option<&Timestamp>,
        mut f: impl FnMut(&StoredOperation),
    ) {
        let start = (prefix.to_string(), Timestamp::new(""), ObjectId::default());
        for (document, timestamp, oid) in self
            .by_document
            .range((Bound::Included(start), Bound::Unbounded))
        {
            if document.as_str() != prefix {
                break;
            }
            if let Some(to) = to {
                if timestamp > to {
                    break;
                }
            }
            if let Some(stored) = self.get(oid, timestamp) {
                f(stored);
            }
        }
    }

    /// Visits every operation of one sub-object in timestamp order, optionally
    /// truncating at `to` (inclusive).
    pub fn for_each_for_entity(
        &self,
        oid: &ObjectId,
        to: Option<&Timestamp>,
        mut f: impl FnMut(&StoredOperation),
    ) {
        let start = OperationKey {
            oid: oid.clone(),
            timestamp: Timestamp::new(""),
        };
        for (key, stored) in self
            .operations
            .range((Bound::Included(start), Bound::Unbounded))
        {
            if &key.oid != oid {
                break;
            }
            if let Some(to) = to {
                if &key.timestamp > to {
                    break;
                }
            }
            f(stored);
        }
    }

    /// Visits every operation at or below `before`, in no particular order.
    pub fn for_each(&self, before: Option<&Timestamp>, mut f: impl FnMut(&StoredOperation)) {
        for (key, stored) in &self.operations {
            if let Some(before) = before {
                if &key.timestamp > before {
                    continue;
                }
            }
            f(stored);
        }
    }

    /// True if any operation remains for this sub-object.
    pub fn has_entity(&self, oid: &ObjectId) -> bool {
        let mut any = false;
        self.for_each_for_entity(oid, None, |_| any = true);
        any
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredOperation> {
        self.operations.values()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn reset(&mut self) {
        self.operations.clear();
        self.by_document.clear();
    }
}
