//! Routing configuration

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::routing::CatalogNamespaces;

const GIB: u64 = 1024 * 1024 * 1024;

/// Thresholds and namespaces shared by both routing policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Historical average runtime above which a model goes to the cloud
    pub max_local_seconds: f64,
    /// Historical average spill above which a model goes to the cloud
    pub max_spill_bytes: u64,
    /// Input volume ceiling for local execution
    pub max_local_size_gb: f64,
    /// Warehouse dialect model SQL is written in
    pub source_dialect: String,
    /// Databases both engines can read (glob patterns, case-insensitive)
    pub catalog_namespaces: Vec<String>,
    /// Database names that always resolve to the local engine
    pub local_databases: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_local_seconds: 600.0,
            max_spill_bytes: GIB,
            max_local_size_gb: 5.0,
            source_dialect: "snowflake".to_string(),
            catalog_namespaces: vec!["iceberg_catalog".to_string()],
            local_databases: vec!["memory".to_string(), "main".to_string()],
        }
    }
}

impl RoutingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_local_seconds.is_finite() && self.max_local_seconds > 0.0) {
            return Err(ConfigError::invalid(
                "routing.max_local_seconds",
                "must be a positive number",
            ));
        }
        if self.max_spill_bytes == 0 {
            return Err(ConfigError::invalid(
                "routing.max_spill_bytes",
                "must be greater than zero",
            ));
        }
        if !(self.max_local_size_gb.is_finite() && self.max_local_size_gb > 0.0) {
            return Err(ConfigError::invalid(
                "routing.max_local_size_gb",
                "must be a positive number",
            ));
        }
        if sqlparser::dialect::dialect_from_str(self.source_dialect.trim().to_lowercase())
            .is_none()
        {
            return Err(ConfigError::invalid(
                "routing.source_dialect",
                format!("unknown SQL dialect '{}'", self.source_dialect),
            ));
        }
        CatalogNamespaces::new(&self.catalog_namespaces)
            .map_err(|e| ConfigError::invalid("routing.catalog_namespaces", e.to_string()))?;
        Ok(())
    }
}
