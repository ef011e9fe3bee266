//! Value types for normalized document storage.
//!
//! Documents are arbitrarily nested trees, but nothing nested is ever persisted
//! inline. A [`Doc`] (the deep tree, with hidden identity on every object and
//! list) is decomposed by [`normalize`] into flat [`Snapshot`]s — one per
//! addressable sub-object — whose slots hold either a [`Scalar`] or a
//! [`Value::Ref`] standing in for the nested child. [`substitute_refs`] is the
//! inverse: it re-materializes a `Doc` from a snapshot map.

mod doc;
mod errors;
mod normalize;

pub use doc::{Doc, DocList, DocMap};
pub use errors::ValueError;
pub use normalize::{normalize, substitute_refs};

use crate::oid::ObjectId;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A leaf value. Absence is modelled by the absence of the slot itself, not by
/// a scalar variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Returns the type name as a string.
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "int",
            Scalar::Float(_) => "float",
            Scalar::Text(_) => "text",
        }
    }
}

/// A property value inside a normalized object: a scalar, or a reference to a
/// nested sub-object stored under its own id.
///
/// Equality compares references by id and scalars by strict equality, which is
/// the comparison the set-style list patches are specified against.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Ref(ObjectId),
}

impl Value {
    /// Null scalar shorthand.
    pub fn null() -> Self {
        Value::Scalar(Scalar::Null)
    }

    /// Returns the referenced id if this value is a reference.
    pub fn as_ref_id(&self) -> Option<&ObjectId> {
        match self {
            Value::Ref(oid) => Some(oid),
            Value::Scalar(_) => None,
        }
    }

    /// Returns true if this value is a reference.
    pub fn is_ref(&self) -> bool {
        matches!(self, Value::Ref(_))
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Scalar(Scalar::Bool(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Scalar(Scalar::Int(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(Scalar::Float(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Scalar(Scalar::Text(v.to_string()))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Scalar(Scalar::Text(v))
    }
}

impl From<ObjectId> for Value {
    fn from(oid: ObjectId) -> Self {
        Value::Ref(oid)
    }
}

// References serialize as `{"kind":"ref","id":...}` so they can never be
// mistaken for document content; scalars serialize as themselves.
impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Scalar(s) => s.serialize(serializer),
            Value::Ref(oid) => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("kind", "ref")?;
                map.serialize_entry("id", oid)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a scalar or an object reference")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Value, E> {
                Ok(Value::Scalar(Scalar::Null))
            }

            fn visit_none<E: serde::de::Error>(self) -> Result<Value, E> {
                Ok(Value::Scalar(Scalar::Null))
            }

            fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<Value, E> {
                Ok(Value::Scalar(Scalar::Bool(v)))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Value, E> {
                Ok(Value::Scalar(Scalar::Int(v)))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Value, E> {
                if let Ok(v) = i64::try_from(v) {
                    Ok(Value::Scalar(Scalar::Int(v)))
                } else {
                    Ok(Value::Scalar(Scalar::Float(v as f64)))
                }
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Value, E> {
                Ok(Value::Scalar(Scalar::Float(v)))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Value, E> {
                Ok(Value::Scalar(Scalar::Text(v.to_string())))
            }

            fn visit_string<E: serde::de::Error>(self, v: String) -> Result<Value, E> {
                Ok(Value::Scalar(Scalar::Text(v)))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
                let mut kind: Option<String> = None;
                let mut id: Option<ObjectId> = None;
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "kind" => kind = Some(map.next_value()?),
                        "id" => id = Some(map.next_value()?),
                        other => {
                            return Err(serde::de::Error::unknown_field(other, &["kind", "id"]));
                        }
                    }
                }
                match (kind.as_deref(), id) {
                    (Some("ref"), Some(id)) => Ok(Value::Ref(id)),
                    _ => Err(serde::de::Error::custom(
                        "expected an object reference {kind: \"ref\", id: ...}",
                    )),
                }
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

/// One normalized sub-object: a shallow property map or an ordered sequence.
///
/// Nested objects never appear inline; they are always [`Value::Ref`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Snapshot {
    Map(BTreeMap<String, Value>),
    List(Vec<Value>),
}

impl Snapshot {
    /// An empty property map.
    pub fn empty_map() -> Self {
        Snapshot::Map(BTreeMap::new())
    }

    /// An empty list.
    pub fn empty_list() -> Self {
        Snapshot::List(Vec::new())
    }

    /// Returns the type name as a string.
    pub fn type_name(&self) -> &'static str {
        match self {
            Snapshot::Map(_) => "map",
            Snapshot::List(_) => "list",
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Snapshot::List(_))
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Snapshot::Map(map) => Some(map),
            Snapshot::List(_) => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Snapshot::Map(map) => Some(map),
            Snapshot::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Snapshot::List(items) => Some(items),
            Snapshot::Map(_) => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Snapshot::List(items) => Some(items),
            Snapshot::Map(_) => None,
        }
    }

    /// Iterates over every slot value, map or list alike.
    pub fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            Snapshot::Map(map) => Box::new(map.values()),
            Snapshot::List(items) => Box::new(items.iter()),
        }
    }

    /// The ids of every sub-object this snapshot references.
    pub fn referenced_oids(&self) -> impl Iterator<Item = &ObjectId> + '_ {
        self.values().filter_map(Value::as_ref_id)
    }
}

impl FromIterator<(String, Value)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Snapshot::Map(iter.into_iter().collect())
    }
}

impl FromIterator<Value> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Snapshot::List(iter.into_iter().collect())
    }
}
