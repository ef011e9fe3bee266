//!
//! Tidemark: the synchronization and persistence core of a local-first document store.
//!
//! Clients mutate richly nested documents locally; every mutation is recorded as a
//! fine-grained [`patch::Operation`] stamped by a hybrid logical clock. Operations and
//! consolidated snapshots (baselines) are persisted locally, exchanged with a server,
//! and periodically compacted so local history stays bounded. Documents are
//! reconstructed by replaying operations over baselines.
//!
//! ## Core Concepts
//!
//! * **Object identifiers (`oid::ObjectId`)**: Structured strings naming every
//!   addressable sub-object of a document (`collection/docId:subId#path`).
//! * **Normalization (`value`)**: Decomposing a nested [`value::Doc`] into a flat map
//!   of `ObjectId -> Snapshot`, with nested objects replaced by references.
//! * **Operations (`patch`)**: The tagged set of mutations a sub-object can undergo,
//!   and the applier that folds them over a normalized value.
//! * **Diffing (`diff`)**: Producing a minimal ordered operation list from a
//!   before/after pair of documents.
//! * **The clock (`clock`)**: A hybrid logical clock issuing lexically ordered
//!   timestamps that encode wall time, a counter, the replica id, and the current
//!   schema version.
//! * **Stores (`store`)**: The three logical tables (operations, baselines, info)
//!   that make up local persistence.
//! * **The façade (`metadata::Metadata`)**: Coordinates the stores and the clock,
//!   reconstructs documents, emits sync messages, and compacts history by rebasing
//!   operations into baselines under an acknowledgment watermark.
//!
//! Transport, schema definition, migration execution, and the durable key-value
//! engine are external collaborators; this crate is the engine between them.

pub mod clock;
pub mod diff;
pub mod metadata;
pub mod oid;
pub mod patch;
pub mod store;
pub mod sync;
pub mod value;

pub use clock::{Clock, Hlc, ReplicaId, SystemClock, Timestamp};
pub use metadata::{Metadata, MetadataOptions};
pub use oid::ObjectId;
pub use patch::{Operation, Patch};
pub use value::{Doc, Snapshot, Value};

#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;

/// Result type used throughout the Tidemark library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Tidemark library.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured errors from the object-identifier codec
    #[error(transparent)]
    Oid(#[from] oid::OidError),

    /// Structured errors from normalization and ref substitution
    #[error(transparent)]
    Value(#[from] value::ValueError),

    /// Structured errors from the diff engine
    #[error(transparent)]
    Diff(#[from] diff::DiffError),

    /// Structured errors from the patch applier
    #[error(transparent)]
    Patch(#[from] patch::PatchError),

    /// Structured errors from the metadata façade
    #[error(transparent)]
    Metadata(#[from] metadata::MetadataError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
            Error::Oid(_) => "oid",
            Error::Value(_) => "value",
            Error::Diff(_) => "diff",
            Error::Patch(_) => "patch",
            Error::Metadata(_) => "metadata",
        }
    }

    /// Check if this error indicates corrupted persisted state rather than bad input.
    pub fn is_corruption(&self) -> bool {
        match self {
            Error::Value(err) => err.is_corruption(),
            _ => false,
        }
    }

    /// Check if this error is a rejected schema update.
    pub fn is_schema_conflict(&self) -> bool {
        matches!(
            self,
            Error::Metadata(metadata::MetadataError::SchemaVersionConflict { .. })
        )
    }

    /// Check if this error indicates an API misuse by the caller.
    pub fn is_caller_error(&self) -> bool {
        match self {
            Error::Metadata(err) => err.is_caller_error(),
            Error::Oid(_) => true,
            _ => false,
        }
    }
}
