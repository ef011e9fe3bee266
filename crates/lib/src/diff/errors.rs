//! Error types for the diff engine.

use crate::oid::ObjectId;
use crate::value::ValueError;
use thiserror::Error;

/// Structured error types for diffing document pairs.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DiffError {
    /// The before/after pair disagrees about the shape of a sub-object.
    ///
    /// Fatal to the enclosing diff call: positional diffing cannot reconcile a
    /// list against a map.
    #[error("Shape conflict at {oid}: cannot diff {from} against {to}")]
    ShapeConflict {
        oid: ObjectId,
        from: &'static str,
        to: &'static str,
    },

    /// The `from` side of a diff carries no identity to diff under.
    #[error("Diff source has no object id assigned")]
    MissingIdentity,

    /// Normalization of a new sub-tree failed.
    #[error(transparent)]
    Value(#[from] ValueError),
}

impl DiffError {
    /// Check if this error is a shape conflict between the two sides.
    pub fn is_shape_conflict(&self) -> bool {
        matches!(self, DiffError::ShapeConflict { .. })
    }
}
