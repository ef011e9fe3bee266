//! Error types for normalization and reference substitution.

use crate::oid::ObjectId;
use thiserror::Error;

/// Structured error types for value decomposition and re-materialization.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ValueError {
    /// The root passed to normalization carries no object identifier.
    #[error("Root value has no object id assigned")]
    MissingRootOid,

    /// Normalization was asked to decompose a bare scalar.
    #[error("Cannot normalize a scalar value; only objects and lists have identity")]
    ScalarRoot,

    /// An object reference points at an id with no entry in the provided map.
    ///
    /// This indicates corruption of persisted state, not bad caller input.
    #[error("Missing referenced object: {oid}")]
    MissingReference { oid: ObjectId },

    /// Following references revisited an object already on the path.
    #[error("Circular reference through object: {oid}")]
    CircularReference { oid: ObjectId },
}

impl ValueError {
    /// Check if this error indicates corrupted persisted state.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            ValueError::MissingReference { .. } | ValueError::CircularReference { .. }
        )
    }
}
