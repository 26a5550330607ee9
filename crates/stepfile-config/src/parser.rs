//! Top-level pipeline parsing.
//!
//! A parse runs these stages in order, stopping at the first error:
//! 1. Shape detection (list of steps, or a mapping)
//! 2. `env` block pre-processing (mappings only)
//! 3. Interpolation of every string and string key in the document
//! 4. Normalization into a string-keyed JSON value
//!
//! With interpolation disabled, only normalization runs.

use serde_json::Value;
use stepfile_core::Environment;
use tracing::{debug, debug_span};

use crate::env_block::apply_env_block;
use crate::error::{ParseResult, PipelineError, PipelineResult};
use crate::interpolate::{Evaluator, ShellEvaluator};
use crate::normalize::{decode_string_keyed, normalize};
use crate::options::ParserOptions;
use crate::shape::{PipelineShape, detect_shape};
use crate::walk::TreeInterpolator;

/// Parse a pipeline document into a JSON value.
///
/// Variables declared in the pipeline's `env` block are written into `env`,
/// but only once the whole block has been applied successfully.
pub fn parse_pipeline(
    pipeline: &[u8],
    env: &mut Environment,
    options: &ParserOptions,
    evaluator: &dyn Evaluator,
) -> PipelineResult<Value> {
    let label = options.label();
    let _span = debug_span!("parse_pipeline", pipeline = %label).entered();

    run(pipeline, env, options, evaluator).map_err(|kind| PipelineError {
        label: label.to_string(),
        kind,
    })
}

fn run(
    pipeline: &[u8],
    env: &mut Environment,
    options: &ParserOptions,
    evaluator: &dyn Evaluator,
) -> ParseResult<Value> {
    if options.no_interpolation {
        debug!("Interpolation disabled, normalizing only");
        return decode_string_keyed(pipeline);
    }

    let shape = detect_shape(pipeline)?;
    if let PipelineShape::Document(mapping) = &shape {
        *env = apply_env_block(env.clone(), mapping, evaluator)?;
    }

    let document = shape.into_node();
    let interpolated = TreeInterpolator::new(env, evaluator)
        .with_max_depth(options.max_depth)
        .interpolate(&document)?;
    debug!(kind = interpolated.kind(), "Pipeline interpolated");

    normalize(&interpolated)
}

/// Builder-style front end to [`parse_pipeline`].
///
/// # Example
/// ```
/// use stepfile_config::PipelineParser;
/// use stepfile_core::Environment;
///
/// let mut parser = PipelineParser::new()
///     .filename("pipeline.yml")
///     .env(Environment::from_slice(["FOO=bar"]));
/// let value = parser.parse(b"- command: echo ${FOO}").unwrap();
/// assert_eq!(value[0]["command"], "echo bar");
/// ```
pub struct PipelineParser {
    env: Option<Environment>,
    last_env: Option<Environment>,
    options: ParserOptions,
    evaluator: Box<dyn Evaluator>,
}

impl PipelineParser {
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Self {
        Self {
            env: None,
            last_env: None,
            options,
            evaluator: Box::new(ShellEvaluator),
        }
    }

    /// Use `env` instead of the process environment.
    ///
    /// Variables from each parsed `env` block are added to it and stay
    /// visible to later calls.
    pub fn env(mut self, env: Environment) -> Self {
        self.env = Some(env);
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.options.filename = Some(filename.into());
        self
    }

    pub fn no_interpolation(mut self, no_interpolation: bool) -> Self {
        self.options.no_interpolation = no_interpolation;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.options.max_depth = max_depth;
        self
    }

    pub fn evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Parse a pipeline.
    ///
    /// Without an explicit environment, each call starts from a fresh snapshot
    /// of the process environment.
    pub fn parse(&mut self, pipeline: &[u8]) -> PipelineResult<Value> {
        if let Some(env) = self.env.as_mut() {
            return parse_pipeline(pipeline, env, &self.options, self.evaluator.as_ref());
        }

        let mut env = Environment::from_process();
        let result = parse_pipeline(pipeline, &mut env, &self.options, self.evaluator.as_ref());
        self.last_env = Some(env);
        result
    }

    /// The environment, including variables from parsed `env` blocks.
    ///
    /// Without an explicit environment this is the one used by the most
    /// recent call to [`parse`](Self::parse).
    pub fn environment(&self) -> Option<&Environment> {
        self.env.as_ref().or(self.last_env.as_ref())
    }

    pub fn into_environment(self) -> Option<Environment> {
        self.env.or(self.last_env)
    }
}

impl Default for PipelineParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::interpolate::EvalError;
    use serde_json::json;

    fn parse(yaml: &str, env: &mut Environment) -> PipelineResult<Value> {
        parse_pipeline(yaml.as_bytes(), env, &ParserOptions::default(), &ShellEvaluator)
    }

    #[test]
    fn test_parse_steps() {
        let mut env = Environment::from_slice(["FOO=bar"]);
        let value = parse("- command: \"echo ${FOO}\"\n", &mut env).unwrap();
        assert_eq!(value, json!([{"command": "echo bar"}]));
    }

    #[test]
    fn test_parse_interpolates_keys() {
        let mut env = Environment::from_slice(["KEYVAR=name"]);
        let value = parse("\"${KEYVAR}\": value\n", &mut env).unwrap();
        assert_eq!(value, json!({"name": "value"}));
    }

    #[test]
    fn test_env_block_applies_sequentially() {
        let yaml = r#"
env:
  A: a
  B: "${A}-b"
steps:
  - command: echo $B
"#;
        let mut env = Environment::new();
        let value = parse(yaml, &mut env).unwrap();

        assert_eq!(
            value,
            json!({
                "env": {"A": "a", "B": "a-b"},
                "steps": [{"command": "echo a-b"}]
            })
        );
        assert_eq!(env.snapshot(), vec!["A=a", "B=a-b"]);
    }

    #[test]
    fn test_env_block_non_string_values_are_kept() {
        let yaml = "env:\n  RETRIES: 3\nsteps:\n  - command: make\n";
        let mut env = Environment::new();
        let value = parse(yaml, &mut env).unwrap();
        assert_eq!(value["env"]["RETRIES"], json!(3));
        assert!(env.is_empty());
    }

    #[test]
    fn test_no_interpolation_keeps_templates() {
        let yaml = "env:\n  A: \"${UNDEFINED}\"\nsteps:\n  - command: echo ${FOO} $$HOME\n";
        let mut env = Environment::new();
        let options = ParserOptions {
            no_interpolation: true,
            ..ParserOptions::default()
        };

        let value = parse_pipeline(yaml.as_bytes(), &mut env, &options, &ShellEvaluator).unwrap();
        assert_eq!(
            value,
            json!({
                "env": {"A": "${UNDEFINED}"},
                "steps": [{"command": "echo ${FOO} $$HOME"}]
            })
        );
        assert!(env.is_empty());
    }

    #[test]
    fn test_env_not_a_map() {
        let mut env = Environment::new();
        let err = parse("env: not-a-map\nsteps: []\n", &mut env).unwrap_err();
        assert!(matches!(err.kind(), ParseError::EnvShape { found: "string" }));
        assert_eq!(
            err.to_string(),
            "Failed to parse pipeline: Expected pipeline top-level env block to be a map, got string"
        );
    }

    #[test]
    fn test_undefined_variable_fails_whole_parse() {
        let mut env = Environment::new();
        let options = ParserOptions {
            filename: Some("pipeline.yml".to_string()),
            ..ParserOptions::default()
        };
        let yaml = "steps:\n  - command: echo ${UNDEFINED}\n";

        let err = parse_pipeline(yaml.as_bytes(), &mut env, &options, &ShellEvaluator).unwrap_err();
        assert_eq!(err.label, "pipeline.yml");
        assert!(err.to_string().starts_with("Failed to parse pipeline.yml: "));
        match err.into_kind() {
            ParseError::Interpolation { template, source, .. } => {
                assert_eq!(template, "echo ${UNDEFINED}");
                assert_eq!(
                    source,
                    EvalError::Undefined {
                        name: "UNDEFINED".to_string()
                    }
                );
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_failed_env_block_leaves_environment_untouched() {
        let yaml = "env:\n  A: set\n  B: ${MISSING}\n";
        let mut env = Environment::from_slice(["KEEP=1"]);
        assert!(parse(yaml, &mut env).is_err());
        assert_eq!(env.snapshot(), vec!["KEEP=1"]);
    }

    #[test]
    fn test_syntax_error_is_labelled() {
        let mut env = Environment::new();
        let options = ParserOptions {
            filename: Some("broken.yml".to_string()),
            ..ParserOptions::default()
        };
        let err = parse_pipeline(b"steps: [unclosed\n", &mut env, &options, &ShellEvaluator).unwrap_err();
        assert!(matches!(err.kind(), ParseError::Syntax(_)));
        assert!(err.to_string().starts_with("Failed to parse broken.yml: "));
    }

    #[test]
    fn test_plain_document_matches_normalizer() {
        let yaml = "steps:\n  - label: build\n    command: make\n    timeout_in_minutes: 10\n";
        let mut env = Environment::new();
        let value = parse(yaml, &mut env).unwrap();
        let expected = decode_string_keyed(yaml.as_bytes()).unwrap();
        assert_eq!(value, expected);
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let mut env = Environment::from_slice(["FOO=bar"]);
        let a = parse("label: ${FOO}\ncommand: make\n", &mut env).unwrap();
        let b = parse("command: make\nlabel: ${FOO}\n", &mut env).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, json!({"label": "bar", "command": "make"}));
    }

    #[test]
    fn test_duplicate_env_blocks() {
        // The first block feeds the environment; the normalized output keeps
        // the last one, like any other duplicate key.
        let yaml = "env:\n  A: one\nenv:\n  B: two\n";
        let mut env = Environment::new();
        let value = parse(yaml, &mut env).unwrap();
        assert_eq!(value, json!({"env": {"B": "two"}}));
        assert_eq!(env.get("A"), Some("one"));
        assert!(!env.contains("B"));
    }

    #[test]
    fn test_max_depth_option() {
        let yaml = "a:\n  b:\n    c:\n      d: deep\n";
        let mut env = Environment::new();
        let options = ParserOptions {
            max_depth: 2,
            ..ParserOptions::default()
        };
        let err = parse_pipeline(yaml.as_bytes(), &mut env, &options, &ShellEvaluator).unwrap_err();
        assert!(matches!(err.kind(), ParseError::DepthExceeded { limit: 2, .. }));
    }

    #[test]
    fn test_parser_defaults_to_process_environment() {
        temp_env::with_var("STEPFILE_PARSER_TEST", Some("from-process"), || {
            let mut parser = PipelineParser::new();
            let value = parser.parse(b"- echo ${STEPFILE_PARSER_TEST}\n").unwrap();
            assert_eq!(value, json!(["echo from-process"]));
            assert!(parser.environment().is_some());
        });
    }

    #[test]
    fn test_process_environment_is_fresh_per_parse() {
        temp_env::with_var_unset("STEPFILE_LEAK_TEST", || {
            let mut parser = PipelineParser::new();
            parser
                .parse(b"env:\n  STEPFILE_LEAK_TEST: first\nsteps: []\n")
                .unwrap();
            assert_eq!(
                parser.environment().unwrap().get("STEPFILE_LEAK_TEST"),
                Some("first")
            );

            let err = parser.parse(b"- echo ${STEPFILE_LEAK_TEST}\n").unwrap_err();
            assert!(matches!(err.kind(), ParseError::Interpolation { .. }));
            assert!(!parser.environment().unwrap().contains("STEPFILE_LEAK_TEST"));
        });
    }

    #[test]
    fn test_explicit_environment_is_kept_across_parses() {
        let mut parser = PipelineParser::new().env(Environment::new());
        parser.parse(b"env:\n  A: one\n").unwrap();
        let value = parser.parse(b"- echo $A\n").unwrap();
        assert_eq!(value, json!(["echo one"]));
    }

    #[test]
    fn test_interpolated_merge_key_is_plain_key() {
        let mut env = Environment::from_slice(["K=<<"]);
        let value = parse("\"${K}\": {a: 1}\n", &mut env).unwrap();
        assert_eq!(value, json!({"<<": {"a": 1}}));
    }

    #[test]
    fn test_quoted_merge_key_with_scalar_value() {
        let mut env = Environment::new();
        let value = parse("steps:\n  - \"<<\": literal\n", &mut env).unwrap();
        assert_eq!(value, json!({"steps": [{"<<": "literal"}]}));
    }

    #[test]
    fn test_merge_keys_in_source_are_applied() {
        let yaml = r#"
defaults: &defaults
  agents: {queue: default}
steps:
  - <<: *defaults
    command: make
"#;
        let mut env = Environment::new();
        let value = parse(yaml, &mut env).unwrap();
        assert_eq!(
            value["steps"],
            json!([{"agents": {"queue": "default"}, "command": "make"}])
        );
    }

    #[test]
    fn test_decoder_nesting_limit_is_syntax_error() {
        let yaml = format!("{}{}", "[".repeat(200), "]".repeat(200));
        let mut env = Environment::new();
        let err = parse(&yaml, &mut env).unwrap_err();
        assert!(matches!(err.kind(), ParseError::Syntax(_)));
    }

    #[test]
    fn test_parser_exposes_updated_environment() {
        let mut parser = PipelineParser::new()
            .filename("pipeline.yml")
            .env(Environment::from_slice(["BASE=/srv"]));
        parser.parse(b"env:\n  APP_DIR: ${BASE}/app\n").unwrap();

        let env = parser.into_environment().unwrap();
        assert_eq!(env.get("APP_DIR"), Some("/srv/app"));
    }

    struct Shouting;

    impl Evaluator for Shouting {
        fn interpolate(&self, _env: &Environment, template: &str) -> Result<String, EvalError> {
            Ok(template.to_uppercase())
        }
    }

    #[test]
    fn test_custom_evaluator() {
        let mut parser = PipelineParser::new()
            .env(Environment::new())
            .evaluator(Shouting);
        let value = parser.parse(b"label: hello\n").unwrap();
        assert_eq!(value, json!({"LABEL": "HELLO"}));
    }
}
