//! Order-preserving document model.
//!
//! Pipeline documents decode into [`Node`] trees rather than native maps so
//! that key order and duplicate keys survive until normalization. Mapping keys
//! are nodes too: YAML allows numbers, booleans and even collections as keys.
//!
//! Decoding keeps `<<` entries as they appear. [`Node::resolve_merges`] applies
//! them, and is only run on documents read from user input.

use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, Serializer};

/// Key that merges the entries of another mapping into the current one.
pub const MERGE_KEY: &str = "<<";

/// A node in a decoded pipeline document.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Node {
    /// An optional value that was never provided.
    #[default]
    Absent,
    Scalar(Scalar),
    Sequence(Vec<Node>),
    Map(Mapping),
}

/// A leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

/// A numeric leaf, kept in the representation it was decoded with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    PosInt(u64),
    NegInt(i64),
    Float(f64),
}

/// Ordered `(key, value)` pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mapping {
    entries: Vec<(Node, Node)>,
}

impl Node {
    /// Short name of the node's type, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Absent => "absent",
            Node::Scalar(scalar) => scalar.kind(),
            Node::Sequence(_) => "sequence",
            Node::Map(_) => "mapping",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Map(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_merge_key(&self) -> bool {
        self.as_str() == Some(MERGE_KEY)
    }

    /// Apply YAML merge keys throughout the tree.
    pub fn resolve_merges(self) -> Node {
        match self {
            Node::Sequence(items) => {
                Node::Sequence(items.into_iter().map(Node::resolve_merges).collect())
            }
            Node::Map(mapping) => Node::Map(mapping.resolve_merges()),
            other => other,
        }
    }
}

impl Scalar {
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "bool",
            Scalar::Number(_) => "number",
            Scalar::String(_) => "string",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::PosInt(n) => write!(f, "{}", n),
            Number::NegInt(n) => write!(f, "{}", n),
            Number::Float(n) if n.is_nan() => f.write_str(".nan"),
            Number::Float(n) if n.is_infinite() => {
                f.write_str(if n.is_sign_positive() { ".inf" } else { "-.inf" })
            }
            Number::Float(n) => write!(f, "{}", n),
        }
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        if n < 0 {
            Number::NegInt(n)
        } else {
            Number::PosInt(n as u64)
        }
    }
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, key: impl Into<Node>, value: impl Into<Node>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Value of the first entry whose key is the string `key`.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (Node, Node)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Node> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Replace `<<` entries with the entries of the mapping(s) they reference.
    ///
    /// Keys declared explicitly in the mapping take precedence over merged keys,
    /// and earlier merge sources take precedence over later ones. A `<<` whose
    /// value is not a mapping or a list of mappings is an ordinary key.
    pub fn resolve_merges(self) -> Mapping {
        let entries: Vec<(Node, Node)> = self
            .entries
            .into_iter()
            .map(|(k, v)| (k.resolve_merges(), v.resolve_merges()))
            .collect();

        if !entries.iter().any(|(k, v)| is_merge(k, v)) {
            return Mapping { entries };
        }

        let explicit: Vec<Node> = entries
            .iter()
            .filter(|(k, v)| !is_merge(k, v))
            .map(|(k, _)| k.clone())
            .collect();

        let mut merged: Vec<(Node, Node)> = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            if !is_merge(&key, &value) {
                merged.push((key, value));
                continue;
            }

            for source in merge_sources(value) {
                for (k, v) in source {
                    if explicit.contains(&k) || merged.iter().any(|(existing, _)| *existing == k) {
                        continue;
                    }
                    merged.push((k, v));
                }
            }
        }

        Mapping { entries: merged }
    }
}

fn is_merge(key: &Node, value: &Node) -> bool {
    if !key.is_merge_key() {
        return false;
    }
    match value {
        Node::Map(_) => true,
        Node::Sequence(items) => items.iter().all(|item| matches!(item, Node::Map(_))),
        _ => false,
    }
}

fn merge_sources(value: Node) -> Vec<Mapping> {
    match value {
        Node::Map(mapping) => vec![mapping],
        Node::Sequence(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Node::Map(mapping) => Some(mapping),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

impl FromIterator<(Node, Node)> for Mapping {
    fn from_iter<T: IntoIterator<Item = (Node, Node)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Mapping {
    type Item = (Node, Node);
    type IntoIter = std::vec::IntoIter<(Node, Node)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Mapping {
    type Item = &'a (Node, Node);
    type IntoIter = std::slice::Iter<'a, (Node, Node)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl From<Scalar> for Node {
    fn from(scalar: Scalar) -> Self {
        Node::Scalar(scalar)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Scalar(Scalar::String(s.to_string()))
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Scalar(Scalar::String(s))
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Scalar(Scalar::Bool(b))
    }
}

impl From<i64> for Node {
    fn from(n: i64) -> Self {
        Node::Scalar(Scalar::Number(n.into()))
    }
}

impl From<u64> for Node {
    fn from(n: u64) -> Self {
        Node::Scalar(Scalar::Number(Number::PosInt(n)))
    }
}

impl From<f64> for Node {
    fn from(n: f64) -> Self {
        Node::Scalar(Scalar::Number(Number::Float(n)))
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Node::Sequence(items)
    }
}

impl From<Mapping> for Node {
    fn from(mapping: Mapping) -> Self {
        Node::Map(mapping)
    }
}

// Serialization

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Node::Absent => serializer.serialize_none(),
            Node::Scalar(scalar) => scalar.serialize(serializer),
            Node::Sequence(items) => serializer.collect_seq(items),
            Node::Map(mapping) => mapping.serialize(serializer),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Number(n) => n.serialize(serializer),
            Scalar::String(s) => serializer.serialize_str(s),
        }
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match *self {
            Number::PosInt(n) => serializer.serialize_u64(n),
            Number::NegInt(n) => serializer.serialize_i64(n),
            Number::Float(n) => serializer.serialize_f64(n),
        }
    }
}

impl Serialize for Mapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(k, v)| (k, v)))
    }
}

// Deserialization

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any YAML value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Node, E> {
        Ok(Node::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Node, E> {
        Ok(Node::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Node, E> {
        Ok(Node::from(v))
    }

    fn visit_i128<E: de::Error>(self, v: i128) -> std::result::Result<Node, E> {
        Ok(match i64::try_from(v) {
            Ok(n) => Node::from(n),
            Err(_) => Node::from(v as f64),
        })
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> std::result::Result<Node, E> {
        Ok(match u64::try_from(v) {
            Ok(n) => Node::from(n),
            Err(_) => Node::from(v as f64),
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Node, E> {
        Ok(Node::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Node, E> {
        Ok(Node::from(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Node, E> {
        Ok(Node::from(v))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Node, E> {
        Ok(Node::Scalar(Scalar::Null))
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Node, E> {
        Ok(Node::Absent)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Node, D::Error> {
        Node::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Node, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Node::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> std::result::Result<Node, A::Error> {
        MappingVisitor.visit_map(map).map(Node::Map)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

struct MappingVisitor;

impl<'de> Visitor<'de> for MappingVisitor {
    type Value = Mapping;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a YAML mapping")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Mapping, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(entry) = map.next_entry::<Node, Node>()? {
            entries.push(entry);
        }
        Ok(Mapping { entries })
    }
}

impl<'de> Deserialize<'de> for Mapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(MappingVisitor)
    }
}
