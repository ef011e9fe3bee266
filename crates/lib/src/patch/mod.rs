//! The operation model: every mutation a sub-object can undergo.
//!
//! A [`Patch`] is one mutation of one normalized sub-object; an [`Operation`]
//! is a patch addressed to an [`ObjectId`] and stamped with a [`Timestamp`].
//! Operations are totally ordered by timestamp, and replaying them in that
//! order over a baseline reconstructs the sub-object.
//!
//! The wire form is internally tagged (`op` field, kebab-case), so a patch
//! like `{"op":"list-insert","index":1,"values":[...]}` round-trips through
//! serde without a hand-written dispatcher; exhaustive matching replaces the
//! "unknown patch kind" runtime failure entirely.

mod apply;
mod errors;

pub use apply::{apply_operations, apply_patch};
pub use errors::PatchError;

use crate::clock::Timestamp;
use crate::oid::ObjectId;
use crate::value::{Snapshot, Value};
use serde::{Deserialize, Serialize};

/// Addresses one slot of a normalized object: a property of a map or an index
/// of a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotKey {
    Index(usize),
    Field(String),
}

impl From<&str> for SlotKey {
    fn from(name: &str) -> Self {
        SlotKey::Field(name.to_string())
    }
}

impl From<String> for SlotKey {
    fn from(name: String) -> Self {
        SlotKey::Field(name)
    }
}

impl From<usize> for SlotKey {
    fn from(index: usize) -> Self {
        SlotKey::Index(index)
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotKey::Field(name) => write!(f, "{name}"),
            SlotKey::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Which matching occurrences a `list-remove` deletes. Absent means all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoveTarget {
    First,
    Last,
    All,
}

/// One mutation of one sub-object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Patch {
    /// Create or replace the entire sub-object with a deep-cloned value.
    Initialize { value: Snapshot },
    /// Set a property or list slot.
    Set { name: SlotKey, value: Value },
    /// Delete a property (maps only).
    Remove { name: String },
    /// Append to a list.
    ListPush { value: Value },
    /// Insert one or many values at an index.
    ListInsert {
        index: usize,
        #[serde(alias = "value", deserialize_with = "one_or_many")]
        values: Vec<Value>,
    },
    /// Remove a range of slots.
    ListDelete { index: usize, count: usize },
    /// Splice-move a slot from one index to another.
    ListMoveByIndex { from: usize, to: usize },
    /// Locate a slot by reference id and move it to an index.
    ListMoveByRef { value: ObjectId, index: usize },
    /// Remove matching values; references match by id, scalars by equality.
    ListRemove {
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        only: Option<RemoveTarget>,
    },
    /// Set-style append: add the value only if no equal value is present.
    ListAdd { value: Value },
    /// Mark the sub-object deleted; it materializes as absent.
    Delete,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<Value>),
        One(Value),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(values) => values,
        OneOrMany::One(value) => vec![value],
    })
}

impl Patch {
    pub fn initialize(value: Snapshot) -> Self {
        Patch::Initialize { value }
    }

    pub fn set(name: impl Into<SlotKey>, value: impl Into<Value>) -> Self {
        Patch::Set {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn remove(name: impl Into<String>) -> Self {
        Patch::Remove { name: name.into() }
    }

    pub fn list_push(value: impl Into<Value>) -> Self {
        Patch::ListPush {
            value: value.into(),
        }
    }

    pub fn list_insert(index: usize, values: Vec<Value>) -> Self {
        Patch::ListInsert { index, values }
    }

    pub fn list_insert_one(index: usize, value: impl Into<Value>) -> Self {
        Patch::ListInsert {
            index,
            values: vec![value.into()],
        }
    }

    pub fn list_delete(index: usize, count: usize) -> Self {
        Patch::ListDelete { index, count }
    }

    pub fn list_move_by_index(from: usize, to: usize) -> Self {
        Patch::ListMoveByIndex { from, to }
    }

    pub fn list_move_by_ref(value: ObjectId, index: usize) -> Self {
        Patch::ListMoveByRef { value, index }
    }

    pub fn list_remove(value: impl Into<Value>, only: Option<RemoveTarget>) -> Self {
        Patch::ListRemove {
            value: value.into(),
            only,
        }
    }

    pub fn list_add(value: impl Into<Value>) -> Self {
        Patch::ListAdd {
            value: value.into(),
        }
    }

    pub fn delete() -> Self {
        Patch::Delete
    }

    /// The wire name of this patch kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Patch::Initialize { .. } => "initialize",
            Patch::Set { .. } => "set",
            Patch::Remove { .. } => "remove",
            Patch::ListPush { .. } => "list-push",
            Patch::ListInsert { .. } => "list-insert",
            Patch::ListDelete { .. } => "list-delete",
            Patch::ListMoveByIndex { .. } => "list-move-by-index",
            Patch::ListMoveByRef { .. } => "list-move-by-ref",
            Patch::ListRemove { .. } => "list-remove",
            Patch::ListAdd { .. } => "list-add",
            Patch::Delete => "delete",
        }
    }

    /// True for the patch kinds that only make sense on a list.
    pub fn is_list_patch(&self) -> bool {
        matches!(
            self,
            Patch::ListPush { .. }
                | Patch::ListInsert { .. }
                | Patch::ListDelete { .. }
                | Patch::ListMoveByIndex { .. }
                | Patch::ListMoveByRef { .. }
                | Patch::ListRemove { .. }
                | Patch::ListAdd { .. }
        )
    }
}

/// A timestamped patch addressed to one sub-object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub oid: ObjectId,
    pub timestamp: Timestamp,
    pub data: Patch,
}

impl Operation {
    pub fn new(oid: impl Into<ObjectId>, timestamp: impl Into<Timestamp>, data: Patch) -> Self {
        Self {
            oid: oid.into(),
            timestamp: timestamp.into(),
            data,
        }
    }

    /// The root OID of the document this operation belongs to.
    pub fn root(&self) -> ObjectId {
        self.oid.root()
    }
}
