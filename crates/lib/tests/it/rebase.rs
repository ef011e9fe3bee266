//! History compaction under the acknowledgment watermark.

use crate::helpers::*;
use serde_json::json;
use tidemark::diff::initial_to_operations;
use tidemark::patch::{Operation, Patch};
use tidemark::{Metadata, MetadataOptions, ObjectId, Value};

fn seed_ops(root: &ObjectId) -> Vec<Operation> {
    vec![
        Operation::new(
            root.clone(),
            ts(1),
            Patch::initialize([("title".to_string(), Value::from("hi"))].into_iter().collect()),
        ),
        Operation::new(root.clone(), ts(2), Patch::set("done", true)),
        Operation::new(root.clone(), ts(3), Patch::set("count", 3i64)),
    ]
}

#[test]
fn global_ack_compacts_history() {
    let (store, observer) = observed_store();
    let root = ObjectId::new("todo/a:x");
    store.insert_remote_operations(seed_ops(&root)).unwrap();

    let before = store.get_document_snapshot(&root).unwrap().unwrap();
    store.set_global_ack(&ts(3)).unwrap();

    // The operation table is empty for that OID; the baseline carries the
    // maximum folded timestamp; the snapshot is unchanged.
    let export = store.export();
    assert!(export.operations.is_empty());
    assert_eq!(export.baselines.len(), 1);
    assert_eq!(export.baselines[0].oid, root);
    assert_eq!(export.baselines[0].timestamp, ts(3));

    let after = store.get_document_snapshot(&root).unwrap().unwrap();
    assert_eq!(before.to_json(), after.to_json());

    let rebases = observer.rebases.lock().unwrap();
    assert_eq!(rebases.len(), 1);
    assert_eq!(rebases[0].baselines.len(), 1);
    assert_eq!(rebases[0].baselines[0].oid, root);
}

#[test]
fn watermark_leaves_newer_operations_alone() {
    let store = open_store();
    let root = ObjectId::new("todo/a:x");
    store.insert_remote_operations(seed_ops(&root)).unwrap();

    store.set_global_ack(&ts(2)).unwrap();

    let export = store.export();
    assert_eq!(export.operations.len(), 1);
    assert_eq!(export.operations[0].operation.timestamp, ts(3));
    // Baseline is stamped with the maximum *folded* timestamp, not the watermark.
    assert_eq!(export.baselines[0].timestamp, ts(2));

    let snapshot = store.get_document_snapshot(&root).unwrap().unwrap();
    assert_eq!(
        snapshot.to_json(),
        json!({ "title": "hi", "done": true, "count": 3 })
    );
}

#[test]
fn rebase_is_idempotent_across_repeated_acks() {
    let store = open_store();
    let root = ObjectId::new("todo/a:x");
    store.insert_remote_operations(seed_ops(&root)).unwrap();

    store.set_global_ack(&ts(3)).unwrap();
    let first = store.export();
    store.set_global_ack(&ts(3)).unwrap();
    let second = store.export();
    assert_eq!(first, second);
}

#[test]
fn deleted_object_keeps_a_tombstone_while_operations_remain() {
    let store = open_store();
    let sub = ObjectId::new("todo/a:x#sub");
    store
        .insert_remote_operations(vec![
            Operation::new(sub.clone(), ts(1), Patch::initialize(
                [("v".to_string(), Value::from(1i64))].into_iter().collect(),
            )),
            Operation::new(sub.clone(), ts(2), Patch::delete()),
            // Still in flight beyond the watermark.
            Operation::new(sub.clone(), ts(4), Patch::set("v", 2i64)),
        ])
        .unwrap();

    store.set_global_ack(&ts(3)).unwrap();
    let export = store.export();
    assert_eq!(export.operations.len(), 1);
    let tombstone = export
        .baselines
        .iter()
        .find(|b| b.oid == sub)
        .expect("tombstone retained");
    assert!(tombstone.is_tombstone());
    assert_eq!(tombstone.timestamp, ts(2));

    // Folding the rest leaves nothing live, so the tombstone goes too.
    store.set_global_ack(&ts(4)).unwrap();
    let export = store.export();
    assert!(export.operations.is_empty());
    assert!(export.baselines.is_empty());
}

#[test]
fn local_inserts_compact_autonomously_before_first_sync() {
    let store = open_store();
    let root = ObjectId::new("todo/a:x");

    let mut doc = rooted(&root, json!({ "id": "a", "sub": { "v": 1 } }));
    let ops = store
        .with_clock(|clock| initial_to_operations(&mut doc, &root, clock))
        .unwrap();
    store.insert_local_operations(ops).unwrap();

    let export = store.export();
    assert!(export.operations.is_empty(), "history folded away");
    assert_eq!(export.baselines.len(), 2);

    let snapshot = store.get_document_snapshot(&root).unwrap().unwrap();
    assert_eq!(snapshot.to_json(), json!({ "id": "a", "sub": { "v": 1 } }));
}

#[test]
fn autonomous_compaction_stops_after_first_sync() {
    let store = open_store();
    let root = ObjectId::new("todo/a:x");

    // Any server contact disables the autonomous trigger.
    store
        .insert_remote_operations(vec![Operation::new(
            root.clone(),
            ts(1),
            Patch::initialize([("id".to_string(), Value::from("a"))].into_iter().collect()),
        )])
        .unwrap();
    assert!(!store.local_replica().has_never_synced());

    let set = Operation::new(root.clone(), store.now(), Patch::set("done", true));
    store.insert_local_operations(vec![set]).unwrap();

    let export = store.export();
    assert_eq!(export.operations.len(), 2, "nothing folded locally");
    assert!(export.baselines.is_empty());
}

#[test]
fn disabled_rebase_keeps_raw_history() {
    let store = Metadata::open(MetadataOptions::default().without_rebase());
    let root = ObjectId::new("todo/a:x");
    store.insert_remote_operations(seed_ops(&root)).unwrap();
    store.set_global_ack(&ts(3)).unwrap();

    let export = store.export();
    assert_eq!(export.operations.len(), 3);
    assert!(export.baselines.is_empty());
}

#[test]
fn close_short_circuits_compaction() {
    let store = open_store();
    let root = ObjectId::new("todo/a:x");
    store.insert_remote_operations(seed_ops(&root)).unwrap();

    store.close();
    assert!(store.is_closed());
    store.set_global_ack(&ts(3)).unwrap();

    let export = store.export();
    assert_eq!(export.operations.len(), 3, "no folding after close");
    assert!(export.baselines.is_empty());
}
