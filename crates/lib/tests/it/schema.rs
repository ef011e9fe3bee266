//! Stored schema versioning and drift rejection.

use crate::helpers::*;
use serde_json::json;
use tidemark::store::Schema;

fn schema(version: u32, shape: serde_json::Value) -> Schema {
    Schema::new(version, shape)
}

#[test]
fn same_version_drift_is_rejected() {
    let store = open_store();
    store
        .update_schema(schema(1, json!({ "todo": ["id", "title"] })), None)
        .unwrap();

    let err = store
        .update_schema(schema(1, json!({ "todo": ["id", "title", "done"] })), None)
        .unwrap_err();
    assert!(err.is_schema_conflict());

    // The stored schema is untouched by the rejected update.
    assert_eq!(
        store.export().schema.unwrap().definition,
        json!({ "todo": ["id", "title"] })
    );
}

#[test]
fn override_conflict_must_name_the_stored_version() {
    let store = open_store();
    store.update_schema(schema(1, json!({ "shape": "a" })), None).unwrap();

    let err = store
        .update_schema(schema(1, json!({ "shape": "b" })), Some(7))
        .unwrap_err();
    assert!(err.is_schema_conflict());

    store
        .update_schema(schema(1, json!({ "shape": "b" })), Some(1))
        .unwrap();
    assert_eq!(store.export().schema.unwrap().definition, json!({ "shape": "b" }));
}

#[test]
fn version_bumps_are_always_accepted() {
    let store = open_store();
    store.update_schema(schema(1, json!({ "shape": "a" })), None).unwrap();
    store.update_schema(schema(2, json!({ "shape": "b" })), None).unwrap();

    let stored = store.export().schema.unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(stored.definition, json!({ "shape": "b" }));
}

#[test]
fn identical_same_version_updates_are_no_conflict() {
    let store = open_store();
    store.update_schema(schema(1, json!({ "shape": "a" })), None).unwrap();
    store.update_schema(schema(1, json!({ "shape": "a" })), None).unwrap();
}

#[test]
fn stamps_carry_the_current_schema_version() {
    let store = open_store();
    assert_eq!(store.now().parts().unwrap().schema_version, 0);

    store.update_schema(schema(3, json!({ "shape": "a" })), None).unwrap();
    assert_eq!(store.now().parts().unwrap().schema_version, 3);
}
