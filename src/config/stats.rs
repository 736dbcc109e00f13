//! Telemetry cache configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Age after which cached warehouse stats are considered stale
    pub ttl_hours: u64,
    /// Lifetime of catalog table-size lookups
    pub catalog_ttl_seconds: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 24,
            catalog_ttl_seconds: 3600,
        }
    }
}

impl StatsConfig {
    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_seconds)
    }
}
