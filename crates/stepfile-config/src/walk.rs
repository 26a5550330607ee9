//! Interpolation across a whole document tree.

use stepfile_core::{Environment, Mapping, Node, Scalar};

use crate::error::{ParseError, ParseResult};
use crate::interpolate::Evaluator;
use crate::path::NodePath;

/// Default bound on document nesting.
///
/// Documents decoded from bytes are already limited by `serde_yaml`, which
/// rejects nesting deeper than 128 levels as a syntax error. This bound
/// applies to trees built in code.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Produces an interpolated copy of a document.
///
/// Every string scalar and every string mapping key is passed through the
/// evaluator. The copy has exactly the shape of the source: same variants,
/// same sequence lengths, same keys in the same order. The first failure
/// aborts the walk.
pub struct TreeInterpolator<'a> {
    env: &'a Environment,
    evaluator: &'a dyn Evaluator,
    max_depth: usize,
}

impl<'a> TreeInterpolator<'a> {
    pub fn new(env: &'a Environment, evaluator: &'a dyn Evaluator) -> Self {
        Self {
            env,
            evaluator,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn interpolate(&self, node: &Node) -> ParseResult<Node> {
        let mut path = NodePath::root();
        self.walk(node, &mut path)
    }

    fn walk(&self, node: &Node, path: &mut NodePath) -> ParseResult<Node> {
        if path.depth() > self.max_depth {
            return Err(ParseError::DepthExceeded {
                path: path.to_string(),
                limit: self.max_depth,
            });
        }

        match node {
            Node::Absent => Ok(Node::Absent),
            Node::Scalar(Scalar::String(s)) => Ok(Node::from(self.string(s, path)?)),
            Node::Scalar(other) => Ok(Node::Scalar(other.clone())),
            Node::Sequence(items) => {
                let mut interpolated = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    path.push_index(index);
                    let result = self.walk(item, path);
                    path.pop();
                    interpolated.push(result?);
                }
                Ok(Node::Sequence(interpolated))
            }
            Node::Map(mapping) => {
                let mut interpolated = Mapping::with_capacity(mapping.len());
                for (key, value) in mapping {
                    path.push_key(key);
                    let result = self.entry(key, value, path);
                    path.pop();
                    let (key, value) = result?;
                    interpolated.push(key, value);
                }
                Ok(Node::Map(interpolated))
            }
        }
    }

    fn entry(&self, key: &Node, value: &Node, path: &mut NodePath) -> ParseResult<(Node, Node)> {
        let key = match key.as_str() {
            Some(s) => Node::from(self.string(s, path)?),
            None => key.clone(),
        };
        let value = self.walk(value, path)?;
        Ok((key, value))
    }

    fn string(&self, template: &str, path: &NodePath) -> ParseResult<String> {
        self.evaluator
            .interpolate(self.env, template)
            .map_err(|source| ParseError::Interpolation {
                path: path.to_string(),
                template: template.to_string(),
                source,
            })
    }
}
