//! Conversion of documents into string-keyed JSON values.
//!
//! Downstream consumers work with JSON, where object keys are always
//! strings. YAML keys may be numbers, booleans or null, so keys are coerced
//! to their string rendering here. Collection keys and non-finite floats have
//! no JSON form and are rejected.

use serde_json::Value;
use stepfile_core::{Node, Number, Scalar};

use crate::codec;
use crate::error::{ParseError, ParseResult};
use crate::path::NodePath;

/// Round-trip an interpolated document through YAML into a JSON value.
///
/// Merge keys were applied when the source was decoded, so a `<<` key here is
/// an ordinary key.
pub fn normalize(node: &Node) -> ParseResult<Value> {
    let root = NodePath::root();
    let encoded = codec::encode(node).map_err(|err| normalization(&root, err))?;
    let decoded = codec::decode_verbatim(encoded.as_bytes()).map_err(|err| normalization(&root, err))?;
    canonicalize(decoded)
}

/// Decode raw YAML straight into a JSON value.
pub fn decode_string_keyed(bytes: &[u8]) -> ParseResult<Value> {
    let node = codec::decode(bytes).map_err(ParseError::syntax)?;
    canonicalize(node)
}

/// Convert a decoded document into a JSON value.
///
/// When a mapping holds the same key twice after coercion, the last entry wins.
pub fn canonicalize(node: Node) -> ParseResult<Value> {
    let mut path = NodePath::root();
    to_value(node, &mut path)
}

fn to_value(node: Node, path: &mut NodePath) -> ParseResult<Value> {
    match node {
        Node::Absent | Node::Scalar(Scalar::Null) => Ok(Value::Null),
        Node::Scalar(Scalar::Bool(b)) => Ok(Value::Bool(b)),
        Node::Scalar(Scalar::Number(n)) => number(n, path),
        Node::Scalar(Scalar::String(s)) => Ok(Value::String(s)),
        Node::Sequence(items) => {
            let mut values = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                path.push_index(index);
                let result = to_value(item, path);
                path.pop();
                values.push(result?);
            }
            Ok(Value::Array(values))
        }
        Node::Map(mapping) => {
            let mut object = serde_json::Map::new();
            for (key, value) in mapping {
                let name = key_string(&key, path)?;
                path.push_key(&key);
                let result = to_value(value, path);
                path.pop();
                object.insert(name, result?);
            }
            Ok(Value::Object(object))
        }
    }
}

fn key_string(key: &Node, path: &NodePath) -> ParseResult<String> {
    match key {
        Node::Scalar(Scalar::String(s)) => Ok(s.clone()),
        Node::Scalar(Scalar::Number(n)) => Ok(n.to_string()),
        Node::Scalar(Scalar::Bool(b)) => Ok(b.to_string()),
        Node::Absent | Node::Scalar(Scalar::Null) => Ok("null".to_string()),
        other => Err(ParseError::Normalization {
            path: path.to_string(),
            message: format!("{} keys cannot be converted to strings", other.kind()),
        }),
    }
}

fn number(n: Number, path: &NodePath) -> ParseResult<Value> {
    match n {
        Number::PosInt(n) => Ok(Value::from(n)),
        Number::NegInt(n) => Ok(Value::from(n)),
        Number::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| ParseError::Normalization {
                path: path.to_string(),
                message: format!("{} has no JSON representation", n),
            }),
    }
}

fn normalization(path: &NodePath, err: serde_yaml::Error) -> ParseError {
    ParseError::Normalization {
        path: path.to_string(),
        message: err.to_string(),
    }
}
