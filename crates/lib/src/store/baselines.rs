//! The baseline table: folded snapshots of sub-objects.

use crate::clock::Timestamp;
use crate::oid::ObjectId;
use crate::value::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The folded state of one sub-object as of `timestamp`: every operation with
/// an equal or earlier stamp is considered incorporated.
///
/// A baseline with an absent snapshot is a tombstone — the object was deleted,
/// but live operations for it still exist and need the deletion on record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub oid: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
    pub timestamp: Timestamp,
}

impl Baseline {
    pub fn new(
        oid: impl Into<ObjectId>,
        snapshot: Snapshot,
        timestamp: impl Into<Timestamp>,
    ) -> Self {
        Self {
            oid: oid.into(),
            snapshot: Some(snapshot),
            timestamp: timestamp.into(),
        }
    }

    pub fn tombstone(oid: impl Into<ObjectId>, timestamp: impl Into<Timestamp>) -> Self {
        Self {
            oid: oid.into(),
            snapshot: None,
            timestamp: timestamp.into(),
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.snapshot.is_none()
    }
}

/// Map of `oid -> baseline`.
#[derive(Debug, Default)]
pub struct BaselineStore {
    baselines: BTreeMap<ObjectId, Baseline>,
}

impl BaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, oid: &ObjectId) -> Option<&Baseline> {
        self.baselines.get(oid)
    }

    pub fn set(&mut self, baseline: Baseline) {
        self.baselines.insert(baseline.oid.clone(), baseline);
    }

    pub fn set_all(&mut self, baselines: Vec<Baseline>) {
        for baseline in baselines {
            self.set(baseline);
        }
    }

    pub fn remove(&mut self, oid: &ObjectId) -> Option<Baseline> {
        self.baselines.remove(oid)
    }

    /// Visits every baseline of the document `prefix`.
    pub fn for_each_in_document(&self, prefix: &str, mut f: impl FnMut(&Baseline)) {
        // All ids sharing the document prefix are one contiguous lexical run;
        // in_document filters out neighbors like `todo/ab` inside it.
        for (oid, baseline) in self.baselines.range(ObjectId::new(prefix)..) {
            if !oid.as_str().starts_with(prefix) {
                break;
            }
            if oid.in_document(prefix) {
                f(baseline);
            }
        }
    }

    pub fn all_for_document(&self, prefix: &str) -> Vec<Baseline> {
        let mut out = Vec::new();
        self.for_each_in_document(prefix, |baseline| out.push(baseline.clone()));
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &Baseline> {
        self.baselines.values()
    }

    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }

    pub fn reset(&mut self) {
        self.baselines.clear();
    }
}
