//! CLI module for Floe
//!
//! Command-line interface definitions and handlers.
//!
//! # Commands
//!
//! - `transpile` - Rewrite warehouse SQL into the local dialect
//! - `blacklist` - List cloud-only function calls in a SQL file
//! - `route` - Decide where a model should run
//! - `stability` - Inspect or clear the crash ledger
//! - `sync-health` - Summarize recent cross-engine syncs
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Transpile a compiled model
//! floe transpile target/compiled/orders.sql
//!
//! # Route a model with the gate engine and explain the decision
//! floe route --model orders --explain target/compiled/orders.sql
//!
//! # Generate shell completions
//! floe completions bash > ~/.bash_completion.d/floe
//! ```

pub mod completions;
pub mod config;
pub mod output;
pub mod route;
pub mod stability;
pub mod sync;
pub mod transpile;

pub use completions::handle_completions;
pub use config::handle_config_init;

use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::FloeConfig;
use crate::routing::PolicyKind;

/// Result type shared by command handlers.
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Floe - local-first execution router for warehouse models
#[derive(Parser, Debug)]
#[command(
    name = "floe",
    version,
    about = "Route warehouse models between a local engine and the cloud"
)]
pub struct Cli {
    /// Path to configuration file (defaults apply when it does not exist)
    #[arg(short, long, global = true, default_value = "floe.toml", env = "FLOE_CONFIG")]
    pub config: PathBuf,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transpile SQL to the local dialect
    Transpile(TranspileArgs),
    /// List cloud-only function calls
    Blacklist(BlacklistArgs),
    /// Decide where a model runs
    Route(RouteArgs),
    /// Crash ledger utilities
    #[command(subcommand)]
    Stability(StabilityCommands),
    /// Show sync ledger health
    SyncHealth(SyncHealthArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct TranspileArgs {
    /// Source dialect (defaults to routing.source_dialect)
    #[arg(short, long)]
    pub dialect: Option<String>,

    /// SQL file, or `-` for stdin
    pub input: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct BlacklistArgs {
    /// Source dialect (defaults to routing.source_dialect)
    #[arg(short, long)]
    pub dialect: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// SQL file, or `-` for stdin
    pub input: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Model name
    #[arg(short, long)]
    pub model: String,

    /// Unique id (defaults to model.<name>)
    #[arg(long)]
    pub unique_id: Option<String>,

    /// Model config as JSON, e.g. '{"route_override": "cloud"}'
    #[arg(long)]
    pub config_json: Option<String>,

    /// Declared sources as a JSON array
    #[arg(long)]
    pub sources_json: Option<String>,

    /// Upstream node id (repeatable)
    #[arg(long = "depends-on")]
    pub dependencies: Vec<String>,

    /// Upstream table sizes in GB as JSON, e.g. '{"raw.events": 12.5}'
    #[arg(long)]
    pub table_sizes_json: Option<String>,

    /// Routing policy (gates, heuristic)
    #[arg(short, long, default_value = "gates")]
    pub policy: PolicyKind,

    /// Print the per-check analysis
    #[arg(long)]
    pub explain: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Compiled SQL file, or `-` for stdin
    pub input: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum StabilityCommands {
    /// Show crash counts and run savings
    Status(StabilityStatusArgs),
    /// Forget a model's crash history
    Clear(StabilityClearArgs),
    /// Convert leftover running markers into crashes
    ClearRunning,
}

#[derive(Args, Debug)]
pub struct StabilityStatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct StabilityClearArgs {
    /// Model unique id
    pub model_id: String,
}

#[derive(Args, Debug)]
pub struct SyncHealthArgs {
    /// Look-back window in hours
    #[arg(long, default_value = "24")]
    pub hours: u32,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "floe.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

/// Load the config file if present, then apply env and CLI overrides.
pub fn load_config(path: &Path, log_level: Option<&str>) -> CliResult<FloeConfig> {
    let config = if path.exists() {
        FloeConfig::load(Some(path))?
    } else {
        FloeConfig::default()
    };
    let mut config = config.with_env_overrides();
    if let Some(level) = log_level {
        config.logging.level = level.to_string();
    }
    config.validate()?;
    Ok(config)
}

/// Read SQL from a file, or stdin for `-` / no argument.
pub fn read_input(input: Option<&Path>) -> CliResult<String> {
    match input {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e).into()),
        _ => {
            let mut sql = String::new();
            std::io::stdin().read_to_string(&mut sql)?;
            Ok(sql)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_parse_transpile_defaults() {
        let cli = Cli::try_parse_from(["floe", "transpile", "model.sql"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("floe.toml"));
        match cli.command {
            Commands::Transpile(args) => {
                assert_eq!(args.input, Some(PathBuf::from("model.sql")));
                assert!(args.dialect.is_none());
            }
            _ => panic!("Expected Transpile command"),
        }
    }

    #[test]
    fn test_cli_parse_global_config_after_subcommand() {
        let cli =
            Cli::try_parse_from(["floe", "sync-health", "-c", "custom.toml", "--hours", "6"])
                .unwrap();
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        match cli.command {
            Commands::SyncHealth(args) => assert_eq!(args.hours, 6),
            _ => panic!("Expected SyncHealth command"),
        }
    }

    #[test]
    fn test_cli_parse_route() {
        let cli = Cli::try_parse_from([
            "floe",
            "route",
            "--model",
            "orders",
            "--policy",
            "heuristic",
            "--depends-on",
            "model.p.raw.events",
            "--explain",
            "orders.sql",
        ])
        .unwrap();
        match cli.command {
            Commands::Route(args) => {
                assert_eq!(args.model, "orders");
                assert_eq!(args.policy, PolicyKind::Heuristic);
                assert_eq!(args.dependencies, vec!["model.p.raw.events"]);
                assert!(args.explain);
            }
            _ => panic!("Expected Route command"),
        }
    }

    #[test]
    fn test_cli_parse_route_rejects_unknown_policy() {
        let result = Cli::try_parse_from(["floe", "route", "--model", "m", "--policy", "smart"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_stability_clear() {
        let cli = Cli::try_parse_from(["floe", "stability", "clear", "model.orders"]).unwrap();
        match cli.command {
            Commands::Stability(StabilityCommands::Clear(args)) => {
                assert_eq!(args.model_id, "model.orders")
            }
            _ => panic!("Expected Stability Clear command"),
        }
    }

    #[test]
    fn test_cli_parse_config_init_force() {
        let cli = Cli::try_parse_from(["floe", "config", "init", "--force"]).unwrap();
        match cli.command {
            Commands::Config(ConfigCommands::Init(args)) => assert!(args.force),
            _ => panic!("Expected Config Init command"),
        }
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let config = load_config(Path::new("/nonexistent/floe.toml"), Some("warn")).unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.stability.max_crash_count, 3);
    }

    #[test]
    fn test_read_input_from_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "SELECT 1").unwrap();
        assert_eq!(read_input(Some(temp.path())).unwrap(), "SELECT 1");
        assert!(read_input(Some(Path::new("/nonexistent.sql"))).is_err());
    }
}
