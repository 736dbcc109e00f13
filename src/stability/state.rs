//! Persisted crash-ledger document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Crash history entries kept per model.
pub const CRASH_HISTORY_LIMIT: usize = 5;

/// Characters of an error message kept in a crash entry.
pub const CRASH_ERROR_LIMIT: usize = 200;

/// The whole `local_state.json` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateDocument {
    pub running: BTreeMap<String, RunningMarker>,
    pub crashes: BTreeMap<String, CrashRecord>,
    pub successes: BTreeMap<String, SuccessRecord>,
    pub local_runs: u64,
    pub cloud_runs: u64,
}

/// Written before a local execution starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningMarker {
    pub started_at: DateTime<Utc>,
    pub invocation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessRecord {
    pub last_success: DateTime<Utc>,
}

/// Cumulative crash count plus the most recent failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashRecord {
    pub count: u32,
    pub last_crash: Option<DateTime<Utc>>,
    pub history: Vec<CrashEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashEvent {
    pub timestamp: DateTime<Utc>,
    pub error: String,
}

impl StateDocument {
    /// Drop any running marker and append a crash for `model_id`.
    pub fn record_crash(&mut self, model_id: &str, error: &str, at: DateTime<Utc>) -> &CrashRecord {
        self.running.remove(model_id);

        let record = self.crashes.entry(model_id.to_string()).or_default();
        record.count += 1;
        record.last_crash = Some(at);
        record.history.push(CrashEvent {
            timestamp: at,
            error: error.chars().take(CRASH_ERROR_LIMIT).collect(),
        });
        if record.history.len() > CRASH_HISTORY_LIMIT {
            let excess = record.history.len() - CRASH_HISTORY_LIMIT;
            record.history.drain(..excess);
        }
        record
    }

    pub fn crash_count(&self, model_id: &str) -> u32 {
        self.crashes.get(model_id).map_or(0, |c| c.count)
    }
}
