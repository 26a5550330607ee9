//! Parser configuration.

use serde::{Deserialize, Serialize};

use crate::walk::DEFAULT_MAX_DEPTH;

/// Label used in diagnostics when a pipeline has no filename.
pub const DEFAULT_LABEL: &str = "pipeline";

/// Options controlling how a pipeline is parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Skip the `env` block and variable interpolation; only normalize.
    pub no_interpolation: bool,
    /// Name of the pipeline source, used to prefix error messages.
    pub filename: Option<String>,
    /// Maximum nesting depth the interpolator will walk.
    pub max_depth: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            no_interpolation: false,
            filename: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParserOptions {
    /// The filename, or a generic label for unnamed pipelines.
    pub fn label(&self) -> &str {
        self.filename.as_deref().unwrap_or(DEFAULT_LABEL)
    }
}
