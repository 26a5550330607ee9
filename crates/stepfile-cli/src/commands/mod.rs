//! CLI command implementations.

pub mod parse;

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use stepfile_config::{ParserOptions, ShellEvaluator, parse_pipeline};
use stepfile_core::Environment;
use tracing::debug;

/// Path that selects standard input.
pub const STDIN_PATH: &str = "-";

/// Arguments shared by every command that reads a pipeline.
#[derive(Args, Debug, Clone, Default)]
pub struct PipelineArgs {
    /// Pipeline file, or `-` for stdin
    #[arg(default_value = STDIN_PATH)]
    pub path: String,

    /// Skip the env block and variable interpolation
    #[arg(long, env = "STEPFILE_NO_INTERPOLATION")]
    pub no_interpolation: bool,

    /// Set a variable before parsing (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_entry)]
    pub env: Vec<(String, String)>,

    /// Start from an empty environment instead of the process environment
    #[arg(long)]
    pub clean_env: bool,

    /// Maximum nesting depth of the pipeline document
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// YAML file with parser options
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

fn parse_env_entry(entry: &str) -> Result<(String, String), String> {
    Environment::parse_entry(entry).map_err(|e| e.to_string())
}

impl PipelineArgs {
    fn label(&self) -> &str {
        if self.path == STDIN_PATH {
            "stdin"
        } else {
            &self.path
        }
    }

    /// Options from `--config`, with command-line flags taking precedence.
    fn options(&self) -> Result<ParserOptions> {
        let mut options = match &self.config {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                serde_yaml::from_str(&content)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => ParserOptions::default(),
        };

        if self.no_interpolation {
            options.no_interpolation = true;
        }
        if let Some(max_depth) = self.max_depth {
            options.max_depth = max_depth;
        }
        options.filename = Some(self.label().to_string());
        Ok(options)
    }

    fn environment(&self) -> Environment {
        let mut env = if self.clean_env {
            Environment::new()
        } else {
            Environment::from_process()
        };
        env.extend(self.env.iter().cloned());
        env
    }

    fn read(&self) -> Result<Vec<u8>> {
        if self.path == STDIN_PATH {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read pipeline from stdin")?;
            Ok(buf)
        } else {
            std::fs::read(&self.path).with_context(|| format!("failed to read {}", self.path))
        }
    }
}

/// Read, interpolate and normalize the pipeline named by `args`.
pub fn load_pipeline(args: &PipelineArgs) -> Result<Value> {
    let options = args.options()?;
    let mut env = args.environment();
    let content = args.read()?;
    debug!(pipeline = %options.label(), bytes = content.len(), "Loaded pipeline");

    let value = parse_pipeline(&content, &mut env, &options, &ShellEvaluator)?;
    Ok(value)
}

pub fn validate(args: &PipelineArgs) -> Result<()> {
    match load_pipeline(args) {
        Ok(_) => {
            println!("Pipeline is valid");
            Ok(())
        }
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(1);
        }
    }
}
