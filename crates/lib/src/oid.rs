//! Object-identifier codec used throughout Tidemark.
//!
//! An [`ObjectId`] names one addressable sub-object of a document. The grammar is
//! `collection '/' docId (':' subId ('#' path)?)?`:
//!
//! * `todo/a` — a document prefix (all sub-objects of the document share it),
//! * `todo/a:x` — a root object (no `#` key path),
//! * `todo/a:x#items.0` — a sub-object reached through the key path `items.0`.
//!
//! The root of any OID is obtained by lexical truncation at `#`; the document
//! prefix by truncation at `:`. Both are derivable without any store lookup.
//!
//! Identifiers are stored as `Arc<str>` for cheap sharing across the stores and
//! the reconstruction path.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Separator between the document prefix and a sub-object id.
const SUB_SEPARATOR: char = ':';
/// Separator between a root object id and its key path.
const PATH_SEPARATOR: char = '#';
/// Separator between key-path segments.
const SEGMENT_SEPARATOR: char = '.';

/// Errors produced by the object-identifier codec.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum OidError {
    /// The string does not match the OID grammar.
    #[error("Malformed object id '{oid}': {reason}")]
    Malformed { oid: String, reason: &'static str },
}

/// An object identifier naming one sub-object of a document.
///
/// Comparison, hashing and ordering are plain lexical ordering of the underlying
/// string, which is what the operation store relies on for prefix scans.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(Arc<str>);

impl Default for ObjectId {
    fn default() -> Self {
        Self(Arc::from(""))
    }
}

impl ObjectId {
    /// Creates an ObjectId from any string-like input without validating it.
    ///
    /// Use [`ObjectId::parse`] for input that crosses a trust boundary.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().into())
    }

    /// Parses and validates an OID against the grammar.
    pub fn parse(s: impl Into<String>) -> Result<Self, OidError> {
        let s: String = s.into();
        let malformed = |reason: &'static str| OidError::Malformed {
            oid: s.clone(),
            reason,
        };

        let (collection, rest) = s.split_once('/').ok_or(malformed("missing '/'"))?;
        if collection.is_empty() {
            return Err(malformed("empty collection"));
        }
        if collection.contains([SUB_SEPARATOR, PATH_SEPARATOR]) {
            return Err(malformed("separator inside collection"));
        }
        if rest.contains('/') {
            return Err(malformed("more than one '/'"));
        }

        let (doc_id, sub) = match rest.split_once(SUB_SEPARATOR) {
            Some((doc_id, sub)) => (doc_id, Some(sub)),
            None => (rest, None),
        };
        if doc_id.is_empty() {
            return Err(malformed("empty document id"));
        }
        if doc_id.contains(PATH_SEPARATOR) {
            return Err(malformed("key path without sub id"));
        }

        if let Some(sub) = sub {
            let (sub_id, path) = match sub.split_once(PATH_SEPARATOR) {
                Some((sub_id, path)) => (sub_id, Some(path)),
                None => (sub, None),
            };
            if sub_id.is_empty() {
                return Err(malformed("empty sub id"));
            }
            if sub_id.contains(SUB_SEPARATOR) {
                return Err(malformed("more than one ':'"));
            }
            if let Some(path) = path {
                if path.is_empty() {
                    return Err(malformed("empty key path"));
                }
                if path.contains([SUB_SEPARATOR, PATH_SEPARATOR]) {
                    return Err(malformed("separator inside key path"));
                }
            }
        }

        Ok(Self(s.into()))
    }

    /// Constructs a root OID from its parts.
    pub fn from_parts(collection: &str, doc_id: &str, sub_id: &str) -> Self {
        Self::new(format!("{collection}/{doc_id}{SUB_SEPARATOR}{sub_id}"))
    }

    /// Generates a fresh root-shaped OID under `document_prefix` with a random sub id.
    ///
    /// Used when the diff engine must reassign identity: a key-path-derived id
    /// would collide with the identity it is replacing.
    pub fn random_sub(document_prefix: &str) -> Self {
        let sub = uuid::Uuid::new_v4().simple().to_string();
        Self::new(format!("{document_prefix}{SUB_SEPARATOR}{sub}"))
    }

    /// Returns the OID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the OID is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The collection segment (before the first `/`).
    pub fn collection(&self) -> &str {
        self.0.split('/').next().unwrap_or("")
    }

    /// The key path after `#`, if any.
    pub fn key_path(&self) -> Option<&str> {
        let idx = self.0.find(PATH_SEPARATOR)?;
        Some(&self.0[idx + 1..])
    }

    /// True if this OID names a root object (it carries no key path).
    pub fn is_root(&self) -> bool {
        !self.0.contains(PATH_SEPARATOR)
    }

    /// The root OID, obtained by lexical truncation at `#`.
    pub fn root(&self) -> ObjectId {
        match self.0.find(PATH_SEPARATOR) {
            Some(idx) => ObjectId::new(&self.0[..idx]),
            None => self.clone(),
        }
    }

    /// The document prefix shared by every sub-object of the document, obtained by
    /// lexical truncation at `:`.
    pub fn document_prefix(&self) -> &str {
        match self.0.find(SUB_SEPARATOR) {
            Some(idx) => &self.0[..idx],
            None => &self.0,
        }
    }

    /// True if this OID belongs to the document named by `prefix`.
    ///
    /// A plain string prefix test is not enough: the prefix `todo/a` must not
    /// claim `todo/ab:x`.
    pub fn in_document(&self, prefix: &str) -> bool {
        match self.0.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with(SUB_SEPARATOR),
            None => false,
        }
    }

    /// Derives the sub-OID for the child slot `segment` of this object.
    ///
    /// On a root this starts a key path (`todo/a:x` → `todo/a:x#items`); on a
    /// sub-object it extends it (`todo/a:x#items` → `todo/a:x#items.0`).
    pub fn child(&self, segment: &str) -> ObjectId {
        let sep = if self.0.contains(PATH_SEPARATOR) {
            SEGMENT_SEPARATOR
        } else {
            PATH_SEPARATOR
        };
        ObjectId::new(format!("{}{sep}{segment}", self.0))
    }

    /// Derives the sub-OID for the list slot at `index`.
    pub fn index_child(&self, index: usize) -> ObjectId {
        self.child(&index.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<&ObjectId> for ObjectId {
    fn from(oid: &ObjectId) -> Self {
        oid.clone()
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

impl std::ops::Deref for ObjectId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq<str> for ObjectId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for ObjectId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl PartialEq<String> for ObjectId {
    fn eq(&self, other: &String) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<ObjectId> for str {
    fn eq(&self, other: &ObjectId) -> bool {
        self == &*other.0
    }
}

impl PartialEq<ObjectId> for &str {
    fn eq(&self, other: &ObjectId) -> bool {
        *self == &*other.0
    }
}

impl From<ObjectId> for String {
    fn from(oid: ObjectId) -> Self {
        oid.0.to_string()
    }
}

impl From<&ObjectId> for String {
    fn from(oid: &ObjectId) -> Self {
        oid.0.to_string()
    }
}

// Manual Serialize/Deserialize implementations for Arc<str>
impl Serialize for ObjectId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(ObjectId(Arc::from(s)))
    }
}
