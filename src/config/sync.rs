//! Sync configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `n * retry_delay_seconds`
    pub retry_delay_seconds: f64,
    pub verify_row_counts: bool,
    /// Defaults to `<state_dir>/sync_ledger.db`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_path: Option<PathBuf>,
    /// Defaults to `<state_dir>/staging`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_seconds: 1.0,
            verify_row_counts: true,
            ledger_path: None,
            staging_dir: None,
        }
    }
}

impl SyncConfig {
    pub fn ledger_path(&self, state_dir: &Path) -> PathBuf {
        self.ledger_path
            .clone()
            .unwrap_or_else(|| state_dir.join("sync_ledger.db"))
    }

    pub fn staging_dir(&self, state_dir: &Path) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| state_dir.join("staging"))
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(self.retry_delay_seconds.max(0.0) * attempt as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_default_under_state_dir() {
        let config = SyncConfig::default();
        let dir = Path::new("/tmp/floe");
        assert_eq!(config.ledger_path(dir), dir.join("sync_ledger.db"));
        assert_eq!(config.staging_dir(dir), dir.join("staging"));
    }

    #[test]
    fn test_explicit_paths_win() {
        let config = SyncConfig {
            ledger_path: Some(PathBuf::from("/var/ledger.db")),
            ..Default::default()
        };
        assert_eq!(
            config.ledger_path(Path::new("/tmp")),
            PathBuf::from("/var/ledger.db")
        );
    }

    #[test]
    fn test_backoff_is_linear() {
        let config = SyncConfig {
            retry_delay_seconds: 0.5,
            ..Default::default()
        };
        assert_eq!(config.backoff(1), Duration::from_millis(500));
        assert_eq!(config.backoff(3), Duration::from_millis(1500));
    }
}
