//! The deep document tree with hidden identity.
//!
//! [`Doc`] is what callers edit: a nested tree of maps, lists and scalars.
//! Every map and list node carries an optional, hidden [`ObjectId`] — the
//! identity that normalization assigns once and clones preserve. Identity is
//! never part of the serialized view: [`Doc::to_json`] elides it entirely.

use super::Scalar;
use crate::oid::ObjectId;
use std::collections::BTreeMap;

/// A nested document value.
#[derive(Debug, Clone, PartialEq)]
pub enum Doc {
    Scalar(Scalar),
    Map(DocMap),
    List(DocList),
}

/// A nested object node: property map plus hidden identity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocMap {
    pub(crate) oid: Option<ObjectId>,
    pub(crate) entries: BTreeMap<String, Doc>,
}

/// A nested list node: ordered items plus hidden identity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocList {
    pub(crate) oid: Option<ObjectId>,
    pub(crate) items: Vec<Doc>,
}

impl DocMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Doc>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Doc> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Doc)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DocList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: impl Into<Doc>) {
        self.items.push(value.into());
    }

    pub fn get(&self, index: usize) -> Option<&Doc> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Doc> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Doc {
    /// Returns the hidden identity of this node, if it has been assigned.
    ///
    /// Scalars carry no identity.
    pub fn oid(&self) -> Option<&ObjectId> {
        match self {
            Doc::Scalar(_) => None,
            Doc::Map(map) => map.oid.as_ref(),
            Doc::List(list) => list.oid.as_ref(),
        }
    }

    /// Stamps this node with an identity. Once assigned, normalization keeps
    /// it: identity is content-stable across clones.
    ///
    /// Assigning to a scalar is a no-op; scalars have no identity.
    pub fn assign_oid(&mut self, oid: ObjectId) {
        match self {
            Doc::Scalar(_) => {}
            Doc::Map(map) => map.oid = Some(oid),
            Doc::List(list) => list.oid = Some(oid),
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Doc::Scalar(_))
    }

    /// True for nodes that carry identity (maps and lists).
    pub fn is_object(&self) -> bool {
        !self.is_scalar()
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Doc::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&DocMap> {
        match self {
            Doc::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut DocMap> {
        match self {
            Doc::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&DocList> {
        match self {
            Doc::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut DocList> {
        match self {
            Doc::List(list) => Some(list),
            _ => None,
        }
    }

    /// Looks up a property on a map node.
    pub fn get(&self, key: &str) -> Option<&Doc> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Looks up a slot on a list node.
    pub fn index(&self, index: usize) -> Option<&Doc> {
        self.as_list().and_then(|list| list.get(index))
    }

    /// Builds a tree from a plain JSON value. No identities are assigned.
    pub fn from_json(value: serde_json::Value) -> Doc {
        match value {
            serde_json::Value::Null => Doc::Scalar(Scalar::Null),
            serde_json::Value::Bool(b) => Doc::Scalar(Scalar::Bool(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Doc::Scalar(Scalar::Int(i))
                } else {
                    Doc::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            serde_json::Value::String(s) => Doc::Scalar(Scalar::Text(s)),
            serde_json::Value::Array(items) => Doc::List(DocList {
                oid: None,
                items: items.into_iter().map(Doc::from_json).collect(),
            }),
            serde_json::Value::Object(entries) => Doc::Map(DocMap {
                oid: None,
                entries: entries
                    .into_iter()
                    .map(|(k, v)| (k, Doc::from_json(v)))
                    .collect(),
            }),
        }
    }

    /// Renders the tree as plain JSON. Hidden identities are elided: consumers
    /// of serialized documents never see OIDs inline.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Doc::Scalar(Scalar::Null) => serde_json::Value::Null,
            Doc::Scalar(Scalar::Bool(b)) => serde_json::Value::Bool(*b),
            Doc::Scalar(Scalar::Int(i)) => serde_json::Value::from(*i),
            Doc::Scalar(Scalar::Float(f)) => {
                serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, Into::into)
            }
            Doc::Scalar(Scalar::Text(s)) => serde_json::Value::String(s.clone()),
            Doc::Map(map) => serde_json::Value::Object(
                map.entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Doc::List(list) => {
                serde_json::Value::Array(list.items.iter().map(Doc::to_json).collect())
            }
        }
    }
}

impl From<Scalar> for Doc {
    fn from(s: Scalar) -> Self {
        Doc::Scalar(s)
    }
}

impl From<bool> for Doc {
    fn from(v: bool) -> Self {
        Doc::Scalar(Scalar::Bool(v))
    }
}

impl From<i64> for Doc {
    fn from(v: i64) -> Self {
        Doc::Scalar(Scalar::Int(v))
    }
}

impl From<f64> for Doc {
    fn from(v: f64) -> Self {
        Doc::Scalar(Scalar::Float(v))
    }
}

impl From<&str> for Doc {
    fn from(v: &str) -> Self {
        Doc::Scalar(Scalar::Text(v.to_string()))
    }
}

impl From<String> for Doc {
    fn from(v: String) -> Self {
        Doc::Scalar(Scalar::Text(v))
    }
}

impl From<DocMap> for Doc {
    fn from(map: DocMap) -> Self {
        Doc::Map(map)
    }
}

impl From<DocList> for Doc {
    fn from(list: DocList) -> Self {
        Doc::List(list)
    }
}
