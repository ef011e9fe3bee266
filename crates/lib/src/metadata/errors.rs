//! Error types for the metadata façade.

use crate::oid::ObjectId;
use thiserror::Error;

/// Structured error types for façade operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MetadataError {
    /// A document-level API was handed a sub-object OID.
    ///
    /// Document-level APIs key on the root; passing `todo/a:x#sub` here is a
    /// programming error in the caller, not a data condition.
    #[error("Not a document root: {oid}")]
    NotADocumentRoot { oid: ObjectId },

    /// A schema update changed the stored shape without raising the version.
    ///
    /// Silent drift would leave two replicas disagreeing about what version
    /// `version` means. Callers that intend the change pass
    /// `override_conflict` equal to the stored version.
    #[error("Schema changed without a version bump (stored version {version})")]
    SchemaVersionConflict { version: u32 },
}

impl MetadataError {
    /// Check if this error indicates an API misuse by the caller.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, MetadataError::NotADocumentRoot { .. })
    }
}
