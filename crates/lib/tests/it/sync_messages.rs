//! Outbound message emission and acknowledgment bookkeeping.

use crate::helpers::*;
use serde_json::json;
use tidemark::clock::ReplicaId;
use tidemark::diff::initial_to_operations;
use tidemark::patch::{Operation, Patch};
use tidemark::sync::SyncMessage;
use tidemark::{ObjectId, Timestamp, Value};

#[test]
fn local_inserts_emit_an_operation_message() {
    let (store, observer) = observed_store();
    let root = ObjectId::new("todo/a:x");

    let mut doc = rooted(&root, json!({ "id": "a" }));
    let ops = store
        .with_clock(|clock| initial_to_operations(&mut doc, &root, clock))
        .unwrap();
    store.insert_local_operations(ops.clone()).unwrap();

    let messages = observer.messages.lock().unwrap();
    assert_eq!(messages.len(), 1);
    match &messages[0] {
        SyncMessage::Operation {
            operations,
            replica_id,
        } => {
            assert_eq!(operations, &ops);
            assert_eq!(replica_id, &store.replica_id());
        }
        other => panic!("expected an operation message, got {other:?}"),
    }
}

#[test]
fn remote_inserts_acknowledge_the_newest_stamp() {
    let (store, observer) = observed_store();
    let root = ObjectId::new("todo/a:x");
    store
        .insert_remote_operations(vec![
            Operation::new(root.clone(), ts(7), Patch::set("later", true)),
            Operation::new(
                root.clone(),
                ts(5),
                Patch::initialize([("id".to_string(), Value::from("a"))].into_iter().collect()),
            ),
        ])
        .unwrap();

    assert_eq!(observer.last_ack().unwrap(), ts(7));
    assert_eq!(store.local_replica().acked_logical_time.unwrap(), ts(7));
}

#[test]
fn remote_inserts_report_affected_roots() {
    let store = open_store();
    let roots = store
        .insert_remote_operations(vec![
            Operation::new("todo/a:x#sub", ts(1), Patch::delete()),
            Operation::new("list/b:y", ts(2), Patch::delete()),
            Operation::new("todo/a:x", ts(3), Patch::delete()),
        ])
        .unwrap();
    let roots: Vec<&str> = roots.iter().map(|oid| oid.as_str()).collect();
    assert_eq!(roots, vec!["list/b:y", "todo/a:x"]);
}

#[test]
fn remote_baselines_acknowledge_and_report_roots() {
    let (store, observer) = observed_store();
    let baseline = tidemark::store::Baseline::new(
        "todo/a:x",
        [("id".to_string(), Value::from("a"))].into_iter().collect(),
        ts(4),
    );
    let roots = store.insert_remote_baselines(vec![baseline]).unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0], "todo/a:x");
    assert_eq!(observer.last_ack().unwrap(), ts(4));

    let snapshot = store
        .get_document_snapshot(&ObjectId::new("todo/a:x"))
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.to_json(), json!({ "id": "a" }));
}

#[test]
fn acks_are_monotone_and_emitted() {
    let (store, observer) = observed_store();
    store.ack(&ts(5));
    store.ack(&ts(3));

    assert_eq!(store.local_replica().acked_logical_time.unwrap(), ts(5));
    assert_eq!(observer.message_count(), 2, "every ack is emitted");
    assert_eq!(observer.last_ack().unwrap(), ts(3));
}

#[test]
fn issued_stamps_exceed_everything_acknowledged() {
    let store = open_store();
    // A stamp from the future, from another replica.
    let foreign = Timestamp::encode(2_000_000_000_000, 17, &ReplicaId::new("other"), 1);
    store.ack(&foreign);

    let issued = store.now();
    assert!(issued > foreign);
    let next = store.now();
    assert!(next > issued);
}
