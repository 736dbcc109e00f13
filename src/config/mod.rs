//! Configuration module for Floe
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`FLOE_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use floe::config::FloeConfig;
//!
//! let config = FloeConfig::default();
//! assert_eq!(config.routing.max_local_size_gb, 5.0);
//!
//! let toml = r#"
//! [stability]
//! max_crash_count = 5
//! "#;
//! let config: FloeConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.stability.max_crash_count, 5);
//! ```

pub mod error;
pub mod logging;
pub mod routing;
pub mod stability;
pub mod stats;
pub mod sync;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use routing::RoutingConfig;
pub use stability::StabilityConfig;
pub use stats::StatsConfig;
pub use sync::SyncConfig;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Unified configuration for routing, the crash ledger, telemetry caches,
/// sync, and logging.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FloeConfig {
    /// Gate thresholds and catalog namespaces
    pub routing: RoutingConfig,
    /// Crash ledger location and blacklist threshold
    pub stability: StabilityConfig,
    /// Telemetry cache lifetimes
    pub stats: StatsConfig,
    /// Cross-engine sync retries and verification
    pub sync: SyncConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl FloeConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Invalid values are silently ignored (the previous value is kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("FLOE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("FLOE_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(dir) = std::env::var("FLOE_STATE_DIR") {
            if !dir.trim().is_empty() {
                self.stability.state_dir = PathBuf::from(dir);
            }
        }
        if let Ok(count) = std::env::var("FLOE_MAX_CRASH_COUNT") {
            if let Ok(c) = count.parse() {
                self.stability.max_crash_count = c;
            }
        }

        if let Ok(dialect) = std::env::var("FLOE_SOURCE_DIALECT") {
            self.routing.source_dialect = dialect;
        }
        if let Ok(seconds) = std::env::var("FLOE_MAX_LOCAL_SECONDS") {
            if let Ok(s) = seconds.parse() {
                self.routing.max_local_seconds = s;
            }
        }
        if let Ok(size) = std::env::var("FLOE_MAX_LOCAL_SIZE_GB") {
            if let Ok(s) = size.parse() {
                self.routing.max_local_size_gb = s;
            }
        }

        if let Ok(retries) = std::env::var("FLOE_SYNC_MAX_RETRIES") {
            if let Ok(r) = retries.parse() {
                self.sync.max_retries = r;
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.routing.validate()?;

        if self.stability.max_crash_count == 0 {
            return Err(ConfigError::invalid(
                "stability.max_crash_count",
                "must be at least 1",
            ));
        }

        if self.sync.max_retries == 0 {
            return Err(ConfigError::invalid(
                "sync.max_retries",
                "must be at least 1",
            ));
        }
        if !(self.sync.retry_delay_seconds.is_finite() && self.sync.retry_delay_seconds >= 0.0) {
            return Err(ConfigError::invalid(
                "sync.retry_delay_seconds",
                "must be zero or positive",
            ));
        }

        Ok(())
    }

    pub fn state_dir(&self) -> &Path {
        &self.stability.state_dir
    }

    pub fn sync_ledger_path(&self) -> PathBuf {
        self.sync.ledger_path(&self.stability.state_dir)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.sync.staging_dir(&self.stability.state_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_floe_config_defaults() {
        let config = FloeConfig::default();
        assert_eq!(config.routing.max_local_seconds, 600.0);
        assert_eq!(config.stability.max_crash_count, 3);
        assert_eq!(config.stats.ttl_hours, 24);
        assert_eq!(config.sync.max_retries, 3);
        assert!(config.sync.verify_row_counts);
        assert_eq!(config.state_dir(), Path::new(".floe"));
    }

    #[test]
    fn test_config_parse_minimal_toml() {
        let toml = r#"
        [routing]
        max_local_size_gb = 20.0
        "#;

        let config: FloeConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.routing.max_local_size_gb, 20.0);
        assert_eq!(config.routing.source_dialect, "snowflake"); // Default
    }

    #[test]
    fn test_config_parse_full_toml() {
        let toml = include_str!("../../floe.example.toml");
        let config: FloeConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert!(!config.routing.catalog_namespaces.is_empty());
    }

    #[test]
    fn test_config_load_from_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[sync]\nmax_retries = 7").unwrap();

        let config = FloeConfig::load(Some(temp.path())).unwrap();
        assert_eq!(config.sync.max_retries, 7);
    }

    #[test]
    fn test_config_missing_file_error() {
        let result = FloeConfig::load(Some(Path::new("/nonexistent/floe.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_config_invalid_toml_is_parse_error() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[routing\nmax_local_seconds = ").unwrap();

        let result = FloeConfig::load(Some(temp.path()));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_load_none_returns_defaults() {
        let config = FloeConfig::load(None).unwrap();
        assert_eq!(config.routing.local_databases, vec!["memory", "main"]);
    }

    #[test]
    fn test_config_env_override_log_level() {
        std::env::set_var("FLOE_LOG_LEVEL", "debug");
        let config = FloeConfig::default().with_env_overrides();
        std::env::remove_var("FLOE_LOG_LEVEL");

        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_config_env_override_log_format() {
        std::env::set_var("FLOE_LOG_FORMAT", "json");
        let config = FloeConfig::default().with_env_overrides();
        assert_eq!(config.logging.format, LogFormat::Json);

        // Invalid format keeps default
        std::env::set_var("FLOE_LOG_FORMAT", "xml");
        let config = FloeConfig::default().with_env_overrides();
        std::env::remove_var("FLOE_LOG_FORMAT");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_config_env_override_state_dir() {
        std::env::set_var("FLOE_STATE_DIR", "/tmp/floe-state");
        let config = FloeConfig::default().with_env_overrides();
        std::env::remove_var("FLOE_STATE_DIR");

        assert_eq!(config.state_dir(), Path::new("/tmp/floe-state"));
        assert_eq!(
            config.sync_ledger_path(),
            Path::new("/tmp/floe-state/sync_ledger.db")
        );
    }

    #[test]
    fn test_config_env_override_thresholds() {
        std::env::set_var("FLOE_MAX_LOCAL_SECONDS", "120");
        std::env::set_var("FLOE_MAX_LOCAL_SIZE_GB", "2.5");
        let config = FloeConfig::default().with_env_overrides();
        std::env::remove_var("FLOE_MAX_LOCAL_SECONDS");
        std::env::remove_var("FLOE_MAX_LOCAL_SIZE_GB");

        assert_eq!(config.routing.max_local_seconds, 120.0);
        assert_eq!(config.routing.max_local_size_gb, 2.5);
    }

    #[test]
    fn test_config_env_invalid_value_ignored() {
        std::env::set_var("FLOE_MAX_CRASH_COUNT", "several");
        let config = FloeConfig::default().with_env_overrides();
        std::env::remove_var("FLOE_MAX_CRASH_COUNT");

        // Should keep default, not crash
        assert_eq!(config.stability.max_crash_count, 3);
    }

    #[test]
    fn test_config_validation_zero_crash_count() {
        let mut config = FloeConfig::default();
        config.stability.max_crash_count = 0;

        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::Validation { ref field, .. }) if field == "stability.max_crash_count"
        ));
    }

    #[test]
    fn test_config_validation_sync_retries() {
        let mut config = FloeConfig::default();
        config.sync.max_retries = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "sync.max_retries"
        ));

        let mut config = FloeConfig::default();
        config.sync.retry_delay_seconds = -1.0;
        assert!(config.validate().is_err());
    }
}
