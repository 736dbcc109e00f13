//! Transpile and blacklist command implementations

use crate::cli::{BlacklistArgs, CliResult, TranspileArgs};
use crate::config::FloeConfig;
use crate::transpiler::Transpiler;
use serde_json::json;

fn transpiler_for(dialect: Option<&str>, config: &FloeConfig) -> CliResult<Transpiler> {
    let name = dialect.unwrap_or(&config.routing.source_dialect);
    Ok(Transpiler::new(name)?)
}

/// Handle `floe transpile`
pub fn handle_transpile(args: &TranspileArgs, config: &FloeConfig, sql: &str) -> CliResult<String> {
    let transpiler = transpiler_for(args.dialect.as_deref(), config)?;
    Ok(transpiler.to_local_dialect(sql)?)
}

/// Handle `floe blacklist`
pub fn handle_blacklist(args: &BlacklistArgs, config: &FloeConfig, sql: &str) -> CliResult<String> {
    let transpiler = transpiler_for(args.dialect.as_deref(), config)?;
    let found = transpiler.detect_blacklisted_functions(sql);

    if args.json {
        return Ok(serde_json::to_string_pretty(&json!({
            "dialect": transpiler.source_dialect(),
            "functions": found,
        }))?);
    }

    if found.is_empty() {
        Ok("✓ No cloud-only functions found".to_string())
    } else {
        Ok(format!("✗ Cloud-only functions: {}", found.join(", ")))
    }
}
