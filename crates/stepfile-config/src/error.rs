//! Pipeline parsing errors.

use thiserror::Error;

use crate::interpolate::EvalError;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{0}")]
    Syntax(String),

    #[error("Expected pipeline top-level env block to be a map, got {found}")]
    EnvShape { found: &'static str },

    #[error("Unexpected type of {found} for env block key {key}")]
    EnvKeyType { key: String, found: &'static str },

    #[error("failed to interpolate {template:?} at {path}: {source}")]
    Interpolation {
        path: String,
        template: String,
        #[source]
        source: EvalError,
    },

    #[error("cannot normalize {path}: {message}")]
    Normalization { path: String, message: String },

    #[error("document at {path} is nested deeper than {limit} levels")]
    DepthExceeded { path: String, limit: usize },
}

impl ParseError {
    /// Build a syntax error from a codec diagnostic.
    pub(crate) fn syntax(err: impl std::fmt::Display) -> Self {
        let message = err.to_string();
        match message.strip_prefix("yaml: ") {
            Some(stripped) => ParseError::Syntax(stripped.to_string()),
            None => ParseError::Syntax(message),
        }
    }
}

/// A [`ParseError`] labelled with the pipeline it came from.
#[derive(Debug, Error)]
#[error("Failed to parse {label}: {kind}")]
pub struct PipelineError {
    pub label: String,
    pub kind: ParseError,
}

impl PipelineError {
    pub fn kind(&self) -> &ParseError {
        &self.kind
    }

    pub fn into_kind(self) -> ParseError {
        self.kind
    }
}

pub type ParseResult<T> = std::result::Result<T, ParseError>;
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
