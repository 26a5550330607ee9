//! Pre-processing of the top-level `env` block.
//!
//! Variables declared in a pipeline's `env` block are interpolated in
//! declaration order and added to the environment before the rest of the
//! document is interpolated, so a later entry can refer to an earlier one:
//!
//! ```yaml
//! env:
//!   REGISTRY: registry.example.com
//!   IMAGE: ${REGISTRY}/app
//! ```

use stepfile_core::{Environment, Mapping, Node};
use tracing::debug;

use crate::error::{ParseError, ParseResult};
use crate::interpolate::Evaluator;
use crate::path::NodePath;

pub const ENV_KEY: &str = "env";

/// Apply the pipeline's `env` block to `env`, returning the updated environment.
///
/// Only string values are applied; other values are left for the document
/// walk. The first `env` entry in the pipeline is the one used.
pub fn apply_env_block(
    mut env: Environment,
    pipeline: &Mapping,
    evaluator: &dyn Evaluator,
) -> ParseResult<Environment> {
    let Some(block) = pipeline.get(ENV_KEY) else {
        return Ok(env);
    };
    let Node::Map(entries) = block else {
        return Err(ParseError::EnvShape {
            found: block.kind(),
        });
    };

    let mut path = NodePath::root();
    path.push_key(&Node::from(ENV_KEY));

    for (key, value) in entries {
        let Some(name) = key.as_str() else {
            return Err(ParseError::EnvKeyType {
                key: key_display(key),
                found: key.kind(),
            });
        };

        if let Some(template) = value.as_str() {
            let interpolated = evaluator.interpolate(&env, template).map_err(|source| {
                path.push_key(key);
                ParseError::Interpolation {
                    path: path.to_string(),
                    template: template.to_string(),
                    source,
                }
            })?;
            debug!(key = %name, "Applying env block variable");
            env.set(name, interpolated);
        }
    }

    Ok(env)
}

fn key_display(key: &Node) -> String {
    match key {
        Node::Scalar(scalar) => scalar.to_string(),
        other => other.kind().to_string(),
    }
}
