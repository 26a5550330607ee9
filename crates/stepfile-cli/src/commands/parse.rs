//! `stepfile parse`: print the interpolated pipeline as JSON.

use anyhow::Result;
use serde_json::Value;

use super::{PipelineArgs, load_pipeline};

pub fn run(args: &PipelineArgs, pretty: bool) -> Result<()> {
    let value = load_pipeline(args)?;
    println!("{}", render(&value, pretty)?);
    Ok(())
}

fn render(value: &Value, pretty: bool) -> Result<String> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(out)
}
