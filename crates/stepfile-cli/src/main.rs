//! stepfile CLI tool.

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::PipelineArgs;

#[derive(Parser)]
#[command(name = "stepfile")]
#[command(about = "Parse and interpolate CI pipeline definitions", long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, env = "STEPFILE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a pipeline and print it as JSON
    Parse {
        #[command(flatten)]
        pipeline: PipelineArgs,
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Check that a pipeline parses
    Validate {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Commands::Parse { pipeline, pretty } => {
            commands::parse::run(&pipeline, pretty)?;
        }
        Commands::Validate { pipeline } => {
            commands::validate(&pipeline)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_arguments() {
        let cli = Cli::try_parse_from([
            "stepfile",
            "--log-format",
            "json",
            "parse",
            "pipeline.yml",
            "--env",
            "FOO=bar",
            "--env",
            "EMPTY=",
            "--clean-env",
            "--pretty",
        ])
        .unwrap();

        assert_eq!(cli.log_format, LogFormat::Json);
        let Commands::Parse { pipeline, pretty } = cli.command else {
            panic!("expected the parse command");
        };
        assert!(pretty);
        assert!(pipeline.clean_env);
        assert_eq!(pipeline.path, "pipeline.yml");
        assert_eq!(
            pipeline.env,
            vec![
                ("FOO".to_string(), "bar".to_string()),
                ("EMPTY".to_string(), String::new())
            ]
        );
    }

    #[test]
    fn test_rejects_malformed_env_entry() {
        let result = Cli::try_parse_from(["stepfile", "validate", "--env", "NOVALUE"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_path_defaults_to_stdin() {
        let cli = Cli::try_parse_from(["stepfile", "validate", "--no-interpolation"]).unwrap();
        let Commands::Validate { pipeline } = cli.command else {
            panic!("expected the validate command");
        };
        assert_eq!(pipeline.path, "-");
        assert!(pipeline.no_interpolation);
    }
}
