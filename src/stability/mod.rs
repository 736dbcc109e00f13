//! Crash ledger (write-ahead log of local executions)
//!
//! A hard out-of-memory kill leaves no chance to run cleanup code, so the
//! only crash signal is a `running` marker that never got cleared. The
//! ledger writes that marker before each local run and inspects it on the
//! next invocation.
//!
//! Every mutation happens under one lock, and the document is persisted
//! (temp file + rename) before the lock is released.

mod error;
pub mod state;

pub use error::StabilityError;
pub use state::{CrashEvent, CrashRecord, RunningMarker, StateDocument, SuccessRecord};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// File name of the ledger document inside the state directory.
pub const STATE_FILE: &str = "local_state.json";

const INCOMPLETE_RUN_ERROR: &str = "Previous run didn't complete (OOM?)";
const CLEARED_RUN_ERROR: &str = "Cleared at run start";

/// What the ledger knows about a model's crashes.
#[derive(Debug, Clone, PartialEq)]
pub struct CrashSummary {
    pub count: u32,
    pub last_crash: Option<DateTime<Utc>>,
    /// True when this call converted a leftover running marker into a crash.
    pub interrupted: bool,
}

/// Local versus cloud execution counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsReport {
    pub local_runs: u64,
    pub cloud_runs: u64,
    pub total_runs: u64,
    pub local_percentage: f64,
    pub crashed_models: usize,
}

/// File-backed crash ledger shared by all worker threads.
#[derive(Debug)]
pub struct StabilityLedger {
    path: PathBuf,
    max_crash_count: u32,
    invocation: String,
    state: Mutex<StateDocument>,
}

impl StabilityLedger {
    /// Open the ledger in `state_dir`. A missing or corrupt file starts empty.
    pub fn open(state_dir: impl AsRef<Path>, max_crash_count: u32) -> Self {
        let path = state_dir.as_ref().join(STATE_FILE);
        let state = load_document(&path);
        Self {
            path,
            max_crash_count,
            invocation: uuid::Uuid::new_v4().to_string(),
            state: Mutex::new(state),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_crash_count(&self) -> u32 {
        self.max_crash_count
    }

    /// Identifier written into running markers by this process.
    pub fn invocation(&self) -> &str {
        &self.invocation
    }

    /// Record that `model_id` is about to run locally.
    pub fn mark_running(&self, model_id: &str) -> Result<(), StabilityError> {
        self.mutate(|doc| {
            doc.running.insert(
                model_id.to_string(),
                RunningMarker {
                    started_at: Utc::now(),
                    invocation: self.invocation.clone(),
                },
            );
        })?;
        debug!(model = model_id, "Marked running");
        Ok(())
    }

    /// Clear the running marker and count a completed local run.
    ///
    /// Crash history is left untouched.
    pub fn mark_success(&self, model_id: &str) -> Result<(), StabilityError> {
        self.mutate(|doc| {
            doc.running.remove(model_id);
            doc.successes.insert(
                model_id.to_string(),
                SuccessRecord {
                    last_success: Utc::now(),
                },
            );
            doc.local_runs += 1;
        })?;
        debug!(model = model_id, "Marked success");
        Ok(())
    }

    /// Record a crash. `error` defaults to `Unknown`.
    pub fn mark_crash(&self, model_id: &str, error: Option<&str>) -> Result<(), StabilityError> {
        let error = error.unwrap_or("Unknown");
        let count = self.mutate(|doc| doc.record_crash(model_id, error, Utc::now()).count)?;
        warn!(model = model_id, crash_count = count, error, "Recorded local crash");
        Ok(())
    }

    pub fn mark_cloud_run(&self) -> Result<(), StabilityError> {
        self.mutate(|doc| doc.cloud_runs += 1)
    }

    /// Crash state for `model_id`, converting a leftover running marker into
    /// a durable crash first. `None` when the model has never crashed.
    pub fn detect_crash(&self, model_id: &str) -> Result<Option<CrashSummary>, StabilityError> {
        let mut doc = self.lock()?;
        let interrupted = doc.running.contains_key(model_id);
        if interrupted {
            doc.record_crash(model_id, INCOMPLETE_RUN_ERROR, Utc::now());
            persist(&self.path, &doc)?;
            warn!(model = model_id, "Previous local run did not complete");
        }

        Ok(doc
            .crashes
            .get(model_id)
            .filter(|record| record.count > 0)
            .map(|record| CrashSummary {
                count: record.count,
                last_crash: record.last_crash,
                interrupted,
            }))
    }

    /// True if the model has crashed before or its last run never finished.
    pub fn was_crash(&self, model_id: &str) -> Result<bool, StabilityError> {
        Ok(self.detect_crash(model_id)?.is_some())
    }

    pub fn crash_count(&self, model_id: &str) -> u32 {
        self.lock().map_or(0, |doc| doc.crash_count(model_id))
    }

    /// True once the crash count reaches the configured threshold.
    pub fn is_blacklisted(&self, model_id: &str) -> bool {
        self.crash_count(model_id) >= self.max_crash_count
    }

    /// Forget every crash recorded for `model_id`.
    pub fn clear_crash_history(&self, model_id: &str) -> Result<bool, StabilityError> {
        let removed = self.mutate(|doc| doc.crashes.remove(model_id).is_some())?;
        if removed {
            info!(model = model_id, "Cleared crash history");
        }
        Ok(removed)
    }

    /// Turn every lingering running marker into a crash. Returns how many.
    pub fn clear_all_running(&self) -> Result<usize, StabilityError> {
        self.mutate(|doc| {
            let ids: Vec<String> = doc.running.keys().cloned().collect();
            let now = Utc::now();
            for id in &ids {
                doc.record_crash(id, CLEARED_RUN_ERROR, now);
            }
            ids.len()
        })
    }

    /// Copy of the current document.
    pub fn snapshot(&self) -> Result<StateDocument, StabilityError> {
        Ok(self.lock()?.clone())
    }

    pub fn savings_report(&self) -> Result<SavingsReport, StabilityError> {
        let doc = self.lock()?;
        let total_runs = doc.local_runs + doc.cloud_runs;
        let local_percentage = if total_runs > 0 {
            doc.local_runs as f64 / total_runs as f64 * 100.0
        } else {
            0.0
        };
        Ok(SavingsReport {
            local_runs: doc.local_runs,
            cloud_runs: doc.cloud_runs,
            total_runs,
            local_percentage,
            crashed_models: doc.crashes.len(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, StateDocument>, StabilityError> {
        self.state.lock().map_err(|_| StabilityError::Poisoned)
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut StateDocument) -> T) -> Result<T, StabilityError> {
        let mut doc = self.lock()?;
        let out = f(&mut doc);
        persist(&self.path, &doc)?;
        Ok(out)
    }
}

fn load_document(path: &Path) -> StateDocument {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StateDocument::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read state file, starting empty");
            return StateDocument::default();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Corrupt state file, starting empty");
        StateDocument::default()
    })
}

fn persist(path: &Path, doc: &StateDocument) -> Result<(), StabilityError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| StabilityError::io(dir, e))?;
    }
    let json = serde_json::to_string_pretty(doc)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| StabilityError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| StabilityError::io(path, e))
}
