//! Config command handlers

use crate::cli::{CliResult, ConfigInitArgs};
use std::fs;

const EXAMPLE_CONFIG: &str = include_str!("../../floe.example.toml");

/// Handle `floe config init`
pub fn handle_config_init(args: &ConfigInitArgs) -> CliResult<String> {
    if args.output.exists() && !args.force {
        return Err(format!(
            "File already exists: {}. Use --force to overwrite.",
            args.output.display()
        )
        .into());
    }

    fs::write(&args.output, EXAMPLE_CONFIG)?;

    Ok(format!(
        "✓ Configuration file created: {}\n  Edit this file to tune routing thresholds and sync behavior.",
        args.output.display()
    ))
}
