//! The info table: singleton rows for the local replica, the global ack
//! watermark, and the stored schema.

use crate::clock::{ReplicaId, Timestamp};
use serde::{Deserialize, Serialize};

/// The durable identity and sync bookkeeping of this replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalReplicaInfo {
    /// This replica's durable id.
    pub id: ReplicaId,
    /// The highest timestamp this replica has acknowledged.
    pub acked_logical_time: Option<Timestamp>,
    /// The highest timestamp ever received from the server. Absent until the
    /// first sync; its absence is what licenses autonomous rebasing.
    pub last_synced_logical_time: Option<Timestamp>,
}

impl LocalReplicaInfo {
    pub fn new(id: ReplicaId) -> Self {
        Self {
            id,
            acked_logical_time: None,
            last_synced_logical_time: None,
        }
    }

    /// True if this replica has never heard from a server.
    pub fn has_never_synced(&self) -> bool {
        self.last_synced_logical_time.is_none()
    }
}

/// The schema as persisted: an integer version plus the shape it described.
///
/// The shape is opaque to this layer; it is stored verbatim so that
/// [`same-version drift`](crate::metadata::Metadata::update_schema) can be
/// detected by plain comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub version: u32,
    pub definition: serde_json::Value,
}

impl Schema {
    pub fn new(version: u32, definition: serde_json::Value) -> Self {
        Self {
            version,
            definition,
        }
    }
}

/// Singleton rows of local state.
#[derive(Debug)]
pub struct InfoStore {
    replica: LocalReplicaInfo,
    global_ack: Option<Timestamp>,
    schema: Option<Schema>,
}

impl InfoStore {
    pub fn new(replica_id: ReplicaId) -> Self {
        Self {
            replica: LocalReplicaInfo::new(replica_id),
            global_ack: None,
            schema: None,
        }
    }

    pub fn replica(&self) -> &LocalReplicaInfo {
        &self.replica
    }

    pub fn replace_replica(&mut self, replica: LocalReplicaInfo) {
        self.replica = replica;
    }

    /// Raises the acked watermark; acknowledgments never move backwards.
    pub fn raise_acked(&mut self, timestamp: &Timestamp) {
        if self.replica.acked_logical_time.as_ref() < Some(timestamp) {
            self.replica.acked_logical_time = Some(timestamp.clone());
        }
    }

    /// Records contact with the server at `timestamp`, monotonically.
    pub fn mark_synced(&mut self, timestamp: &Timestamp) {
        if self.replica.last_synced_logical_time.as_ref() < Some(timestamp) {
            self.replica.last_synced_logical_time = Some(timestamp.clone());
        }
    }

    pub fn global_ack(&self) -> Option<&Timestamp> {
        self.global_ack.as_ref()
    }

    pub fn set_global_ack(&mut self, timestamp: &Timestamp) {
        if self.global_ack.as_ref() < Some(timestamp) {
            self.global_ack = Some(timestamp.clone());
        }
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn set_schema(&mut self, schema: Schema) {
        self.schema = Some(schema);
    }

    /// Clears everything except the replica identity.
    pub fn reset(&mut self) {
        self.replica = LocalReplicaInfo::new(self.replica.id.clone());
        self.global_ack = None;
        self.schema = None;
    }
}
