//! Durable backup, restore, and file persistence.

use crate::helpers::*;
use serde_json::json;
use tidemark::clock::ReplicaId;
use tidemark::patch::{Operation, Patch};
use tidemark::store::Schema;
use tidemark::{Metadata, MetadataOptions, ObjectId, Value};

fn seeded_store() -> (Metadata, ObjectId) {
    let store = open_store();
    let root = ObjectId::new("todo/a:x");
    store
        .insert_remote_operations(vec![
            Operation::new(
                root.clone(),
                ts(1),
                Patch::initialize([("title".to_string(), Value::from("hi"))].into_iter().collect()),
            ),
            Operation::new(root.clone(), ts(2), Patch::set("done", true)),
        ])
        .unwrap();
    store.set_global_ack(&ts(1)).unwrap();
    store
        .update_schema(Schema::new(1, json!({ "todo": ["title", "done"] })), None)
        .unwrap();
    (store, root)
}

#[test]
fn export_carries_every_table_verbatim() {
    let (store, root) = seeded_store();
    let export = store.export();

    assert_eq!(export.operations.len(), 1);
    assert!(!export.operations[0].is_local);
    assert_eq!(export.baselines.len(), 1);
    assert_eq!(export.baselines[0].oid, root);
    assert_eq!(export.local_replica.id, store.replica_id());
    assert_eq!(export.local_replica.acked_logical_time.as_ref().unwrap(), &ts(2));
    assert_eq!(export.schema.as_ref().unwrap().version, 1);
}

#[test]
fn reset_from_restores_an_identical_store() {
    let (store, root) = seeded_store();
    let export = store.export();

    let restored = Metadata::open(MetadataOptions::default());
    restored.reset_from(export.clone()).unwrap();

    assert_eq!(restored.export(), export);
    assert_eq!(
        restored.get_document_snapshot(&root).unwrap().unwrap().to_json(),
        store.get_document_snapshot(&root).unwrap().unwrap().to_json(),
    );
    // The restored clock is rehydrated past the restored watermark.
    assert!(restored.now() > ts(2));
}

#[test]
fn export_survives_a_json_roundtrip() {
    let (store, _) = seeded_store();
    let export = store.export();
    let json = serde_json::to_string(&export).unwrap();
    let back: tidemark::metadata::MetadataExport = serde_json::from_str(&json).unwrap();
    assert_eq!(back, export);
}

#[test]
fn save_and_load_through_a_file() {
    let (store, root) = seeded_store();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backup.json");

    store.save_to_file(&path).unwrap();
    let restored = Metadata::load_from_file(&path, MetadataOptions::default()).unwrap();

    assert_eq!(restored.export(), store.export());
    assert_eq!(
        restored.get_document_snapshot(&root).unwrap().unwrap().to_json(),
        json!({ "title": "hi", "done": true })
    );
}

#[test]
fn reset_clears_everything_but_identity() {
    let (store, root) = seeded_store();
    let replica = store.replica_id();
    store.reset();

    assert!(store.export().operations.is_empty());
    assert!(store.export().baselines.is_empty());
    assert!(store.export().schema.is_none());
    assert_eq!(store.replica_id(), replica);
    assert!(store.get_document_snapshot(&root).unwrap().is_none());
}

#[test]
fn restored_replica_identity_wins_over_options() {
    let (store, _) = seeded_store();
    let export = store.export();

    let restored = Metadata::open(
        MetadataOptions::default().with_replica_id(ReplicaId::new("someone-else")),
    );
    restored.reset_from(export).unwrap();
    assert_eq!(restored.local_replica().id, store.replica_id());
}
