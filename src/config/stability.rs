//! Crash ledger configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Directory holding the crash ledger, stats cache and sync ledger
    pub state_dir: PathBuf,
    /// Crashes after which a model is blacklisted from local execution
    pub max_crash_count: u32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".floe"),
            max_crash_count: 3,
        }
    }
}
