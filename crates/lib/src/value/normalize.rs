//! Decomposing document trees into flat normalized objects, and back.

use super::{Doc, DocList, DocMap, Snapshot, Value, ValueError};
use crate::oid::ObjectId;
use std::collections::{BTreeMap, HashSet};

/// Walks `value` and produces one shallow [`Snapshot`] per object or list in
/// the tree, keyed by id.
///
/// The root must already carry its identity (assign it with
/// [`Doc::assign_oid`]). Nested objects that lack one are stamped with a
/// key-path-derived sub-id of their parent — and keep it afterwards, so
/// normalizing the same tree twice yields the same ids. The parent slot that
/// held each nested object holds a [`Value::Ref`] in the parent's snapshot.
pub fn normalize(value: &mut Doc) -> Result<BTreeMap<ObjectId, Snapshot>, ValueError> {
    if value.is_scalar() {
        return Err(ValueError::ScalarRoot);
    }
    let root_oid = value.oid().cloned().ok_or(ValueError::MissingRootOid)?;

    let mut out = BTreeMap::new();
    walk(value, &root_oid, &mut out);
    Ok(out)
}

fn walk(node: &mut Doc, oid: &ObjectId, out: &mut BTreeMap<ObjectId, Snapshot>) {
    let snapshot = match node {
        Doc::Scalar(_) => unreachable!("walk is only called on objects"),
        Doc::Map(map) => {
            let mut slots = BTreeMap::new();
            for (key, child) in map.entries.iter_mut() {
                slots.insert(key.clone(), slot_value(child, oid, key, out));
            }
            Snapshot::Map(slots)
        }
        Doc::List(list) => {
            let mut slots = Vec::with_capacity(list.items.len());
            for (index, child) in list.items.iter_mut().enumerate() {
                slots.push(slot_value(child, oid, &index.to_string(), out));
            }
            Snapshot::List(slots)
        }
    };
    out.insert(oid.clone(), snapshot);
}

fn slot_value(
    child: &mut Doc,
    parent_oid: &ObjectId,
    segment: &str,
    out: &mut BTreeMap<ObjectId, Snapshot>,
) -> Value {
    match child {
        Doc::Scalar(s) => Value::Scalar(s.clone()),
        _ => {
            let child_oid = child
                .oid()
                .cloned()
                .unwrap_or_else(|| parent_oid.child(segment));
            child.assign_oid(child_oid.clone());
            walk(child, &child_oid, out);
            Value::Ref(child_oid)
        }
    }
}

/// Re-materializes the document rooted at `root` from a snapshot map,
/// replacing every reference by the object it names and stamping each built
/// node with its id.
///
/// Returns the tree together with the list of ids that were referenced while
/// building it (the reachable set under `root`, excluding `root` itself). A
/// reference with no entry in `objects` is fatal: it means the persisted
/// state is corrupt.
pub fn substitute_refs(
    root: &ObjectId,
    objects: &BTreeMap<ObjectId, Snapshot>,
) -> Result<(Doc, Vec<ObjectId>), ValueError> {
    let mut referenced = Vec::new();
    let mut seen = HashSet::new();
    let mut on_path = HashSet::new();
    let doc = build(root, objects, &mut referenced, &mut seen, &mut on_path)?;
    Ok((doc, referenced))
}

fn build(
    oid: &ObjectId,
    objects: &BTreeMap<ObjectId, Snapshot>,
    referenced: &mut Vec<ObjectId>,
    seen: &mut HashSet<ObjectId>,
    on_path: &mut HashSet<ObjectId>,
) -> Result<Doc, ValueError> {
    let snapshot = objects.get(oid).ok_or_else(|| ValueError::MissingReference {
        oid: oid.clone(),
    })?;
    if !on_path.insert(oid.clone()) {
        return Err(ValueError::CircularReference { oid: oid.clone() });
    }

    let mut resolve = |value: &Value| -> Result<Doc, ValueError> {
        match value {
            Value::Scalar(s) => Ok(Doc::Scalar(s.clone())),
            Value::Ref(child) => {
                if seen.insert(child.clone()) {
                    referenced.push(child.clone());
                }
                build(child, objects, referenced, seen, on_path)
            }
        }
    };

    let doc = match snapshot {
        Snapshot::Map(slots) => {
            let mut map = DocMap::new();
            for (key, value) in slots {
                map.entries.insert(key.clone(), resolve(value)?);
            }
            map.oid = Some(oid.clone());
            Doc::Map(map)
        }
        Snapshot::List(slots) => {
            let mut list = DocList::new();
            for value in slots {
                list.items.push(resolve(value)?);
            }
            list.oid = Some(oid.clone());
            Doc::List(list)
        }
    };

    on_path.remove(oid);
    Ok(doc)
}
