//! Creating, editing and materializing documents through the façade.

use crate::helpers::*;
use serde_json::json;
use tidemark::diff::{diff_to_operations, initial_to_operations, DiffOptions};
use tidemark::patch::{Operation, Patch};
use tidemark::{ObjectId, Value};

#[test]
fn initialize_and_read() {
    let store = open_store();
    let root = ObjectId::new("todo/a:x");

    let mut doc = rooted(&root, json!({ "id": "a", "title": "hi" }));
    let ops = store
        .with_clock(|clock| initial_to_operations(&mut doc, &root, clock))
        .unwrap();
    assert_eq!(ops.len(), 1);
    assert!(matches!(ops[0].data, Patch::Initialize { .. }));
    store.insert_local_operations(ops).unwrap();

    let snapshot = store.get_document_snapshot(&root).unwrap().unwrap();
    assert_eq!(snapshot.to_json(), json!({ "id": "a", "title": "hi" }));
    assert_eq!(snapshot.oid().unwrap(), &root);
}

#[test]
fn nested_edit_preserving_identity() {
    let store = open_store();
    let root = ObjectId::new("todo/a:x");

    let mut doc = rooted(&root, json!({ "id": "a", "sub": { "v": 1 } }));
    let ops = store
        .with_clock(|clock| initial_to_operations(&mut doc, &root, clock))
        .unwrap();
    store.insert_local_operations(ops).unwrap();

    // Read, edit the materialized tree (identity rides along), diff, write.
    let current = store.get_document_snapshot(&root).unwrap().unwrap();
    let mut edited = current.clone();
    edited
        .as_map_mut()
        .unwrap()
        .insert("sub", {
            let mut sub = current.get("sub").unwrap().clone();
            sub.as_map_mut().unwrap().insert("v", 2i64);
            sub
        });

    let ops = store
        .with_clock(|clock| {
            diff_to_operations(&current, &mut edited, clock, &DiffOptions::default())
        })
        .unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].oid, "todo/a:x#sub");
    assert_eq!(ops[0].data, Patch::set("v", 2i64));
    store.insert_local_operations(ops).unwrap();

    let snapshot = store.get_document_snapshot(&root).unwrap().unwrap();
    assert_eq!(snapshot.to_json(), json!({ "id": "a", "sub": { "v": 2 } }));
}

#[test]
fn nested_edit_reassigning_identity() {
    let store = open_store();
    let root = ObjectId::new("todo/a:x");

    let mut doc = rooted(&root, json!({ "id": "a", "sub": { "v": 1 } }));
    let ops = store
        .with_clock(|clock| initial_to_operations(&mut doc, &root, clock))
        .unwrap();
    store.insert_local_operations(ops).unwrap();

    // A freshly parsed edit has no identities; without merging, the sub-object
    // is replaced wholesale.
    let current = store.get_document_snapshot(&root).unwrap().unwrap();
    let mut edited = rooted(&root, json!({ "id": "a", "sub": { "v": 2 } }));
    let ops = store
        .with_clock(|clock| {
            diff_to_operations(&current, &mut edited, clock, &DiffOptions::default())
        })
        .unwrap();

    let kinds: Vec<&str> = ops.iter().map(|op| op.data.kind()).collect();
    assert_eq!(kinds, vec!["initialize", "set", "delete"]);
    assert_eq!(ops[2].oid, "todo/a:x#sub");
    store.insert_local_operations(ops).unwrap();

    let snapshot = store.get_document_snapshot(&root).unwrap().unwrap();
    assert_eq!(snapshot.to_json(), json!({ "id": "a", "sub": { "v": 2 } }));
    // The new sub-object carries its reassigned identity.
    let sub_oid = snapshot.get("sub").unwrap().oid().unwrap().clone();
    assert_ne!(sub_oid, "todo/a:x#sub");
    assert!(sub_oid.in_document("todo/a"));
}

#[test]
fn remote_operations_replay_in_timestamp_order_regardless_of_arrival() {
    let root = ObjectId::new("todo/a:x");
    let make_ops = || {
        vec![
            Operation::new(
                root.clone(),
                ts(1),
                Patch::initialize([("title".to_string(), Value::from("first"))].into_iter().collect()),
            ),
            Operation::new(root.clone(), ts(2), Patch::set("title", "second")),
            Operation::new(root.clone(), ts(3), Patch::set("title", "third")),
        ]
    };

    // In order.
    let store = open_store();
    store.insert_remote_operations(make_ops()).unwrap();
    let in_order = store.get_document_snapshot(&root).unwrap().unwrap();

    // Shuffled arrival, split across calls.
    let store = open_store();
    let mut ops = make_ops();
    let last = ops.split_off(2);
    ops.reverse();
    store.insert_remote_operations(last).unwrap();
    store.insert_remote_operations(ops).unwrap();
    let shuffled = store.get_document_snapshot(&root).unwrap().unwrap();

    assert_eq!(in_order.to_json(), json!({ "title": "third" }));
    assert_eq!(shuffled.to_json(), in_order.to_json());
}

#[test]
fn set_then_remove_of_the_same_key_folds_through() {
    let store = open_store();
    let root = ObjectId::new("todo/a:x");
    store
        .insert_remote_operations(vec![
            Operation::new(root.clone(), ts(1), Patch::initialize(
                [("keep".to_string(), Value::from(true))].into_iter().collect(),
            )),
            Operation::new(root.clone(), ts(2), Patch::set("gone", 1i64)),
            Operation::new(root.clone(), ts(3), Patch::remove("gone")),
        ])
        .unwrap();

    let snapshot = store.get_document_snapshot(&root).unwrap().unwrap();
    assert_eq!(snapshot.to_json(), json!({ "keep": true }));
}

#[test]
fn deleted_root_materializes_as_absent() {
    let store = open_store();
    let root = ObjectId::new("todo/a:x");
    store
        .insert_remote_operations(vec![
            Operation::new(root.clone(), ts(1), Patch::initialize(
                [("title".to_string(), Value::from("hi"))].into_iter().collect(),
            )),
            Operation::new(root.clone(), ts(2), Patch::delete()),
        ])
        .unwrap();
    assert!(store.get_document_snapshot(&root).unwrap().is_none());

    // A later initialize re-introduces the same id.
    store
        .insert_remote_operations(vec![Operation::new(
            root.clone(),
            ts(3),
            Patch::initialize([("title".to_string(), Value::from("back"))].into_iter().collect()),
        )])
        .unwrap();
    let snapshot = store.get_document_snapshot(&root).unwrap().unwrap();
    assert_eq!(snapshot.to_json(), json!({ "title": "back" }));
}

#[test]
fn unknown_documents_are_absent_not_errors() {
    let store = open_store();
    assert!(store
        .get_document_snapshot(&ObjectId::new("todo/missing:z"))
        .unwrap()
        .is_none());
}

#[test]
fn document_level_apis_reject_sub_object_ids() {
    let store = open_store();
    let err = store
        .get_document_snapshot(&ObjectId::new("todo/a:x#sub"))
        .unwrap_err();
    assert!(err.is_caller_error());

    let err = store
        .get_all_document_related_oids(&ObjectId::new("todo/a:x#sub"))
        .unwrap_err();
    assert!(err.is_caller_error());
}

#[test]
fn related_oids_union_operations_and_baselines() {
    let store = open_store();
    let root = ObjectId::new("todo/a:x");

    let mut doc = rooted(
        &root,
        json!({ "id": "a", "sub": { "v": 1 }, "items": [ { "w": 2 } ] }),
    );
    let ops = store
        .with_clock(|clock| initial_to_operations(&mut doc, &root, clock))
        .unwrap();
    // Local insert on a never-synced store folds these into baselines;
    // a follow-up remote operation leaves a row in the operation table too.
    store.insert_local_operations(ops).unwrap();
    store
        .insert_remote_operations(vec![Operation::new(
            ObjectId::new("todo/a:x#extra"),
            ts(9_999_999_999_999),
            Patch::initialize(tidemark::Snapshot::empty_map()),
        )])
        .unwrap();

    let oids = store.get_all_document_related_oids(&root).unwrap();
    let oids: Vec<&str> = oids.iter().map(|oid| oid.as_str()).collect();
    assert_eq!(
        oids,
        vec![
            "todo/a:x",
            "todo/a:x#extra",
            "todo/a:x#items",
            "todo/a:x#items.0",
            "todo/a:x#sub",
        ]
    );
}
