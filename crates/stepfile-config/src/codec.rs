//! YAML encoding and decoding of pipeline documents.
//!
//! The `decode*` functions read user input and apply YAML merge keys.
//! [`decode_verbatim`] reads back documents produced by [`encode`], where a
//! `<<` key is data and must stay as it is.

use stepfile_core::{Mapping, Node};

/// Decode a document that is a bare list of steps.
///
/// An empty or `null` document decodes as an empty list.
pub fn decode_steps(bytes: &[u8]) -> Result<Vec<Node>, serde_yaml::Error> {
    let steps: Option<Vec<Node>> = serde_yaml::from_slice(bytes)?;
    Ok(steps
        .unwrap_or_default()
        .into_iter()
        .map(Node::resolve_merges)
        .collect())
}

/// Decode a document whose top level is a mapping, keeping key order.
pub fn decode_mapping(bytes: &[u8]) -> Result<Mapping, serde_yaml::Error> {
    serde_yaml::from_slice(bytes).map(Mapping::resolve_merges)
}

/// Decode a document of any shape.
pub fn decode(bytes: &[u8]) -> Result<Node, serde_yaml::Error> {
    decode_verbatim(bytes).map(Node::resolve_merges)
}

/// Decode a document without applying merge keys.
pub fn decode_verbatim(bytes: &[u8]) -> Result<Node, serde_yaml::Error> {
    serde_yaml::from_slice(bytes)
}

pub fn encode(node: &Node) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(node)
}
