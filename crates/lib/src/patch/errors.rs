//! Error types for the patch applier.

use crate::oid::ObjectId;
use thiserror::Error;

/// Structured error types for patch application.
///
/// Most shape mismatches are deliberately *not* errors: a list patch aimed at a
/// value that schema evolution reshaped into something else is logged and
/// skipped so replay keeps making progress. The variants here are the genuinely
/// fatal conditions.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PatchError {
    /// A list insertion carried no values at all.
    #[error("Empty list insertion targeting {oid}")]
    EmptyInsert { oid: ObjectId },
}
