//! Folding patches over normalized values.

use super::{Operation, Patch, PatchError, RemoveTarget, SlotKey};
use crate::oid::ObjectId;
use crate::value::{Scalar, Snapshot, Value};

/// Applies one patch to the current shallow value of the target sub-object.
///
/// `base` is absent either before the object first exists or after a `delete`;
/// only `initialize` can bring it (back) into existence, and every other patch
/// on an absent base is a no-op. Shape mismatches — a list patch aimed at a
/// map, a property removal aimed at a list — are logged and skipped rather
/// than failed, so replay survives fields that schema evolution reshaped.
pub fn apply_patch(
    base: Option<Snapshot>,
    oid: &ObjectId,
    patch: &Patch,
) -> Result<Option<Snapshot>, PatchError> {
    if let Patch::Initialize { value } = patch {
        return Ok(Some(value.clone()));
    }
    let Some(mut snapshot) = base else {
        // Deleted (or never-initialized) objects stay absent.
        return Ok(None);
    };
    let shape = snapshot.type_name();

    match patch {
        Patch::Initialize { .. } => unreachable!("handled above"),
        Patch::Delete => return Ok(None),

        Patch::Set { name, value } => match (&mut snapshot, name) {
            (Snapshot::Map(map), SlotKey::Field(name)) => {
                map.insert(name.clone(), value.clone());
            }
            (Snapshot::List(items), SlotKey::Index(index)) => {
                if *index >= items.len() {
                    // Sparse assignment fills the gap with nulls.
                    items.resize(*index + 1, Value::Scalar(Scalar::Null));
                }
                items[*index] = value.clone();
            }
            _ => skip(oid, patch, shape),
        },

        Patch::Remove { name } => match &mut snapshot {
            Snapshot::Map(map) => {
                map.remove(name);
            }
            Snapshot::List(_) => skip(oid, patch, shape),
        },

        Patch::ListPush { value } => match &mut snapshot {
            Snapshot::List(items) => items.push(value.clone()),
            Snapshot::Map(_) => skip(oid, patch, shape),
        },

        Patch::ListInsert { index, values } => {
            if values.is_empty() {
                return Err(PatchError::EmptyInsert { oid: oid.clone() });
            }
            match &mut snapshot {
                Snapshot::List(items) => {
                    let at = (*index).min(items.len());
                    items.splice(at..at, values.iter().cloned());
                }
                Snapshot::Map(_) => skip(oid, patch, shape),
            }
        }

        Patch::ListDelete { index, count } => match &mut snapshot {
            Snapshot::List(items) => {
                let start = (*index).min(items.len());
                let end = index.saturating_add(*count).min(items.len());
                items.drain(start..end);
            }
            Snapshot::Map(_) => skip(oid, patch, shape),
        },

        Patch::ListMoveByIndex { from, to } => match &mut snapshot {
            Snapshot::List(items) => {
                if *from < items.len() {
                    let value = items.remove(*from);
                    let at = (*to).min(items.len());
                    items.insert(at, value);
                } else {
                    tracing::warn!(oid = %oid, from, "list move source out of range, skipping");
                }
            }
            Snapshot::Map(_) => skip(oid, patch, shape),
        },

        Patch::ListMoveByRef { value, index } => match &mut snapshot {
            Snapshot::List(items) => {
                match items.iter().position(|v| v.as_ref_id() == Some(value)) {
                    Some(from) => {
                        let moved = items.remove(from);
                        let at = (*index).min(items.len());
                        items.insert(at, moved);
                    }
                    None => {
                        tracing::warn!(oid = %oid, target = %value, "list move target not found, skipping");
                    }
                }
            }
            Snapshot::Map(_) => skip(oid, patch, shape),
        },

        Patch::ListRemove { value, only } => match &mut snapshot {
            Snapshot::List(items) => match only {
                Some(RemoveTarget::First) => {
                    if let Some(at) = items.iter().position(|v| v == value) {
                        items.remove(at);
                    }
                }
                Some(RemoveTarget::Last) => {
                    if let Some(at) = items.iter().rposition(|v| v == value) {
                        items.remove(at);
                    }
                }
                Some(RemoveTarget::All) | None => items.retain(|v| v != value),
            },
            Snapshot::Map(_) => skip(oid, patch, shape),
        },

        Patch::ListAdd { value } => match &mut snapshot {
            Snapshot::List(items) => {
                if !items.contains(value) {
                    items.push(value.clone());
                }
            }
            Snapshot::Map(_) => skip(oid, patch, shape),
        },
    }

    Ok(Some(snapshot))
}

fn skip(oid: &ObjectId, patch: &Patch, shape: &'static str) {
    tracing::warn!(
        oid = %oid,
        kind = patch.kind(),
        shape,
        "patch does not fit value shape, skipping"
    );
}

/// Folds a sequence of operations over a base value, in array order.
///
/// Each patch applies to the result of the previous one. Callers are
/// responsible for presenting operations in timestamp order; no re-sorting
/// happens here.
pub fn apply_operations(
    base: Option<Snapshot>,
    operations: &[Operation],
) -> Result<Option<Snapshot>, PatchError> {
    let mut current = base;
    for operation in operations {
        current = apply_patch(current, &operation.oid, &operation.data)?;
    }
    Ok(current)
}
