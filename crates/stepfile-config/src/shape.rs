//! Top-level shape detection.

use stepfile_core::{Mapping, Node};
use tracing::debug;

use crate::codec;
use crate::error::{ParseError, ParseResult};

/// The two legal shapes of a pipeline document.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineShape {
    /// A bare list of steps. No `env` block processing applies.
    Steps(Vec<Node>),
    /// A mapping, possibly with a top-level `env` block.
    Document(Mapping),
}

impl PipelineShape {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineShape::Steps(_) => "steps",
            PipelineShape::Document(_) => "document",
        }
    }

    pub fn into_node(self) -> Node {
        match self {
            PipelineShape::Steps(steps) => Node::Sequence(steps),
            PipelineShape::Document(mapping) => Node::Map(mapping),
        }
    }
}

/// Decode a pipeline as a list of steps, falling back to a mapping.
///
/// When neither works, the mapping diagnostic is reported since that is the
/// shape most pipelines use.
pub fn detect_shape(bytes: &[u8]) -> ParseResult<PipelineShape> {
    // Historically pipelines may be uploaded as just a list of steps
    if let Ok(steps) = codec::decode_steps(bytes) {
        debug!(steps = steps.len(), "Pipeline is a list of steps");
        return Ok(PipelineShape::Steps(steps));
    }

    let mapping = codec::decode_mapping(bytes).map_err(ParseError::syntax)?;
    debug!(entries = mapping.len(), "Pipeline is a mapping");
    Ok(PipelineShape::Document(mapping))
}
