//! Variable interpolation for pipeline documents.
//!
//! Supports shell-style references:
//! - `$NAME`, `${NAME}` - Value of `NAME`; an unset variable is an error
//! - `${NAME:-default}` - `default` when `NAME` is unset or empty
//! - `${NAME-default}` - `default` when `NAME` is unset
//! - `${NAME:?message}` - Error with `message` when `NAME` is unset or empty
//! - `${NAME?message}` - Error with `message` when `NAME` is unset
//! - `${NAME:offset}`, `${NAME:offset:length}` - Substring (by character)
//! - `$$`, `\$` - A literal `$`
//!
//! Defaults and messages are templates themselves, so `${A:-${B}}` works.

use regex::Regex;
use std::sync::LazyLock;
use stepfile_core::Environment;
use thiserror::Error;

static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*").unwrap());

// Body of `${NAME:...}` after the colon, e.g. ` -3` or `2:4`
static SUBSTRING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(-?\d+)\s*(?::\s*(\d+)\s*)?$").unwrap());

/// Errors produced while evaluating a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("${name} is not set")]
    Undefined { name: String },

    #[error("${name}: {message}")]
    Required { name: String, message: String },

    #[error("unterminated expression starting at offset {offset}")]
    Unterminated { offset: usize },

    #[error("invalid expression ${{{expression}}}")]
    Invalid { expression: String },
}

/// Substitutes variable references in a template string.
pub trait Evaluator: Send + Sync {
    fn interpolate(&self, env: &Environment, template: &str) -> Result<String, EvalError>;
}

/// The default [`Evaluator`], implementing the shell-style syntax above.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellEvaluator;

impl Evaluator for ShellEvaluator {
    fn interpolate(&self, env: &Environment, template: &str) -> Result<String, EvalError> {
        if !template.contains('$') {
            return Ok(template.to_string());
        }
        expand(env, template)
    }
}

/// Interpolate a template with [`ShellEvaluator`].
pub fn interpolate(env: &Environment, template: &str) -> Result<String, EvalError> {
    ShellEvaluator.interpolate(env, template)
}

fn expand(env: &Environment, template: &str) -> Result<String, EvalError> {
    let mut output = String::with_capacity(template.len());
    let mut pos = 0;

    while pos < template.len() {
        let rest = &template[pos..];

        if rest.starts_with("$$") || rest.starts_with("\\$") {
            output.push('$');
            pos += 2;
            continue;
        }

        if rest.starts_with("${") {
            let body_start = pos + 2;
            let end = closing_brace(template, body_start)
                .ok_or(EvalError::Unterminated { offset: pos })?;
            output.push_str(&expand_braced(env, &template[body_start..end])?);
            pos = end + 1;
            continue;
        }

        if let Some(after) = rest.strip_prefix('$') {
            if let Some(name) = NAME_REGEX.find(after) {
                output.push_str(lookup(env, name.as_str())?);
                pos += 1 + name.end();
                continue;
            }
        }

        let Some(ch) = rest.chars().next() else {
            break;
        };
        output.push(ch);
        pos += ch.len_utf8();
    }

    Ok(output)
}

/// Byte index of the `}` closing an expression whose body starts at `start`.
fn closing_brace(template: &str, start: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (i, ch) in template[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn expand_braced(env: &Environment, body: &str) -> Result<String, EvalError> {
    let invalid = || EvalError::Invalid {
        expression: body.to_string(),
    };

    let name = NAME_REGEX.find(body).ok_or_else(invalid)?;
    let value = env.get(name.as_str());
    let name = name.as_str();
    let op = &body[name.len()..];

    if op.is_empty() {
        return lookup(env, name).map(str::to_string);
    }

    // `:-` and `:?` must be checked before the bare `:` substring form
    if let Some(default) = op.strip_prefix(":-") {
        return match value {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            _ => expand(env, default),
        };
    }
    if let Some(default) = op.strip_prefix('-') {
        return match value {
            Some(v) => Ok(v.to_string()),
            None => expand(env, default),
        };
    }
    if let Some(message) = op.strip_prefix(":?") {
        return match value {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            _ => Err(required(env, name, message)?),
        };
    }
    if let Some(message) = op.strip_prefix('?') {
        return match value {
            Some(v) => Ok(v.to_string()),
            None => Err(required(env, name, message)?),
        };
    }
    if let Some(range) = op.strip_prefix(':') {
        let caps = SUBSTRING_REGEX.captures(range).ok_or_else(invalid)?;
        let offset: i64 = caps[1].parse().map_err(|_| invalid())?;
        let length = match caps.get(2) {
            Some(m) => Some(m.as_str().parse::<usize>().map_err(|_| invalid())?),
            None => None,
        };
        return Ok(substring(lookup(env, name)?, offset, length));
    }

    Err(invalid())
}

fn required(env: &Environment, name: &str, message: &str) -> Result<EvalError, EvalError> {
    let message = if message.is_empty() {
        "not set".to_string()
    } else {
        expand(env, message)?
    };
    Ok(EvalError::Required {
        name: name.to_string(),
        message,
    })
}

fn lookup<'a>(env: &'a Environment, name: &str) -> Result<&'a str, EvalError> {
    env.get(name).ok_or_else(|| EvalError::Undefined {
        name: name.to_string(),
    })
}

fn substring(value: &str, offset: i64, length: Option<usize>) -> String {
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len();

    let start = if offset < 0 {
        len.saturating_sub(offset.unsigned_abs() as usize)
    } else {
        (offset as usize).min(len)
    };
    let end = match length {
        Some(length) => start.saturating_add(length).min(len),
        None => len,
    };

    chars[start..end].iter().collect()
}
