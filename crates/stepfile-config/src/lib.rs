//! Pipeline definition parsing for stepfile.
//!
//! This crate handles:
//! - Detecting the shape of a pipeline document (bare steps or a mapping)
//! - Applying the top-level `env` block to the environment
//! - Variable interpolation across the whole document
//! - Normalizing the result into a string-keyed JSON value

pub mod codec;
pub mod env_block;
pub mod error;
pub mod interpolate;
pub mod normalize;
pub mod options;
pub mod parser;
pub mod path;
pub mod shape;
pub mod walk;

pub use error::{ParseError, ParseResult, PipelineError, PipelineResult};
pub use interpolate::{EvalError, Evaluator, ShellEvaluator};
pub use options::ParserOptions;
pub use parser::{PipelineParser, parse_pipeline};
pub use shape::PipelineShape;
