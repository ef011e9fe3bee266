//! The diff engine: turning a before/after pair of documents into operations.
//!
//! Three entry points, mirroring the three ways values change:
//!
//! * [`initial_to_operations`] — a value enters the store: normalize it and
//!   emit one `initialize` per resulting sub-object.
//! * [`diff_to_operations`] — a value changed: walk the pair and emit the
//!   minimal ordered operation list that turns one into the other.
//! * [`shallow_diff`] — both sides are already normalized: compare slot by
//!   slot without recursion.
//!
//! Every emitted operation is stamped from the caller's [`Hlc`] in emission
//! order, so ordering by timestamp reproduces the emission order exactly.
//! Positional list diffing never synthesizes moves or inserts; callers that
//! know a move happened emit the dedicated list patches directly.

mod errors;

pub use errors::DiffError;

use crate::clock::Hlc;
use crate::oid::ObjectId;
use crate::patch::{Operation, Patch, SlotKey};
use crate::value::{normalize, Doc, Snapshot, Value};

/// Knobs for [`diff_to_operations`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOptions {
    /// If the new side contains an object with no identity where the old side
    /// had one, adopt the old identity instead of reassigning a fresh one.
    pub merge_unknown_objects: bool,
    /// If a property is absent on the new side, leave the old value untouched
    /// rather than emitting a `remove`. Used when absent fields mean
    /// "defaulted", not "deleted".
    pub default_undefined: bool,
}

/// Emits the `initialize` operations that bring `value` into existence under
/// `root_oid`.
///
/// The value is normalized in place: identities are assigned throughout and
/// stay on the tree afterwards.
pub fn initial_to_operations(
    value: &mut Doc,
    root_oid: &ObjectId,
    clock: &mut Hlc,
) -> Result<Vec<Operation>, DiffError> {
    value.assign_oid(root_oid.clone());
    let normalized = normalize(value)?;
    Ok(normalized
        .into_iter()
        .map(|(oid, snapshot)| Operation::new(oid, clock.now(), Patch::initialize(snapshot)))
        .collect())
}

/// Diffs `to` against `from` and emits the ordered operation list that turns
/// one into the other.
///
/// `from` must carry its identity (it came out of the store or a previous
/// normalization); `to` adopts that identity at the root and is stamped as the
/// walk discovers new sub-objects.
pub fn diff_to_operations(
    from: &Doc,
    to: &mut Doc,
    clock: &mut Hlc,
    options: &DiffOptions,
) -> Result<Vec<Operation>, DiffError> {
    let root_oid = from.oid().cloned().ok_or(DiffError::MissingIdentity)?;
    to.assign_oid(root_oid.clone());
    let mut operations = Vec::new();
    diff_objects(from, to, &root_oid, clock, options, &mut operations)?;
    Ok(operations)
}

fn diff_objects(
    from: &Doc,
    to: &mut Doc,
    oid: &ObjectId,
    clock: &mut Hlc,
    options: &DiffOptions,
    out: &mut Vec<Operation>,
) -> Result<(), DiffError> {
    match (from, to) {
        (Doc::List(from_list), Doc::List(to_list)) => {
            let to_len = to_list.len();
            for (index, new) in to_list.items.iter_mut().enumerate() {
                let old = from_list.get(index);
                diff_item(SlotKey::Index(index), new, old, oid, clock, options, out)?;
            }
            if from_list.len() > to_len {
                // Dropped tail elements that were objects die with their ids.
                for dropped in from_list.iter().skip(to_len) {
                    if let Some(old_oid) = dropped.oid() {
                        out.push(Operation::new(old_oid, clock.now(), Patch::delete()));
                    }
                }
                out.push(Operation::new(
                    oid,
                    clock.now(),
                    Patch::list_delete(to_len, from_list.len() - to_len),
                ));
            }
            Ok(())
        }
        (Doc::Map(from_map), Doc::Map(to_map)) => {
            for (key, new) in to_map.entries.iter_mut() {
                let old = from_map.get(key);
                diff_item(SlotKey::Field(key.clone()), new, old, oid, clock, options, out)?;
            }
            if !options.default_undefined {
                for key in from_map.entries.keys() {
                    if !to_map.entries.contains_key(key) {
                        out.push(Operation::new(oid, clock.now(), Patch::remove(key.clone())));
                    }
                }
            }
            Ok(())
        }
        (from, to) => Err(DiffError::ShapeConflict {
            oid: oid.clone(),
            from: shape_name(from),
            to: shape_name(to),
        }),
    }
}

fn shape_name(doc: &Doc) -> &'static str {
    match doc {
        Doc::Scalar(s) => s.type_name(),
        Doc::Map(_) => "map",
        Doc::List(_) => "list",
    }
}

fn diff_item(
    key: SlotKey,
    new: &mut Doc,
    old: Option<&Doc>,
    parent_oid: &ObjectId,
    clock: &mut Hlc,
    options: &DiffOptions,
    out: &mut Vec<Operation>,
) -> Result<(), DiffError> {
    let old_object_oid = old.and_then(Doc::oid);

    match new {
        Doc::Scalar(scalar) => {
            let unchanged = matches!(old, Some(Doc::Scalar(o)) if o == scalar);
            if !unchanged {
                out.push(Operation::new(
                    parent_oid,
                    clock.now(),
                    Patch::set(key, Value::Scalar(scalar.clone())),
                ));
                // An object replaced by a scalar is gone for good.
                if let Some(old_oid) = old_object_oid {
                    out.push(Operation::new(old_oid, clock.now(), Patch::delete()));
                }
            }
            Ok(())
        }
        _ => {
            let value_oid = match new.oid() {
                Some(oid) => oid.clone(),
                None => match old_object_oid {
                    // Identity adoption: the caller declared unknown objects
                    // to be the same object as whatever sat in the slot.
                    Some(old_oid) if options.merge_unknown_objects => old_oid.clone(),
                    _ => ObjectId::random_sub(parent_oid.document_prefix()),
                },
            };

            if let Some(old_doc) = old {
                if old_doc.oid() == Some(&value_oid) {
                    // Same identity: the slot did not change hands, recurse.
                    new.assign_oid(value_oid.clone());
                    return diff_objects(old_doc, new, &value_oid, clock, options, out);
                }
            }

            out.extend(initial_to_operations(new, &value_oid, clock)?);
            out.push(Operation::new(
                parent_oid,
                clock.now(),
                Patch::set(key, Value::Ref(value_oid)),
            ));
            if let Some(old_oid) = old_object_oid {
                out.push(Operation::new(old_oid, clock.now(), Patch::delete()));
            }
            Ok(())
        }
    }
}

/// Diffs two already-normalized values slot by slot.
///
/// No recursion happens here: normalized values hold only scalars and
/// references, so the only conflict left is a map diffed against a list.
pub fn shallow_diff(
    from: &Snapshot,
    to: &Snapshot,
    oid: &ObjectId,
    clock: &mut Hlc,
) -> Result<Vec<Operation>, DiffError> {
    let mut out = Vec::new();
    match (from, to) {
        (Snapshot::Map(from_map), Snapshot::Map(to_map)) => {
            for (key, value) in to_map {
                if from_map.get(key) != Some(value) {
                    out.push(Operation::new(
                        oid,
                        clock.now(),
                        Patch::set(key.clone(), value.clone()),
                    ));
                }
            }
            for key in from_map.keys() {
                if !to_map.contains_key(key) {
                    out.push(Operation::new(oid, clock.now(), Patch::remove(key.clone())));
                }
            }
        }
        (Snapshot::List(from_items), Snapshot::List(to_items)) => {
            for (index, value) in to_items.iter().enumerate() {
                if from_items.get(index) != Some(value) {
                    out.push(Operation::new(
                        oid,
                        clock.now(),
                        Patch::set(index, value.clone()),
                    ));
                }
            }
            if from_items.len() > to_items.len() {
                out.push(Operation::new(
                    oid,
                    clock.now(),
                    Patch::list_delete(to_items.len(), from_items.len() - to_items.len()),
                ));
            }
        }
        (from, to) => {
            return Err(DiffError::ShapeConflict {
                oid: oid.clone(),
                from: from.type_name(),
                to: to.type_name(),
            });
        }
    }
    Ok(out)
}
