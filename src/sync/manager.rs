//! Verified table copies with retry

use chrono::Utc;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::engine::{Engine, TableRef};
use super::error::SyncError;
use super::ledger::SyncLedger;
use super::result::{SyncErrorKind, SyncResult};
use crate::config::SyncConfig;
use crate::routing::Venue;

/// Copies tables between the local and cloud engines, verifying row counts
/// and retrying with linear backoff. Syncs of the same table are serialized.
pub struct SyncManager {
    local: Option<Arc<dyn Engine>>,
    cloud: Option<Arc<dyn Engine>>,
    ledger: Option<Arc<SyncLedger>>,
    config: SyncConfig,
    staging_dir: PathBuf,
    table_locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Row counts observed by the last attempt.
#[derive(Default)]
struct Observed {
    source: u64,
    target: u64,
    verified: bool,
}

impl SyncManager {
    pub fn new(
        local: Option<Arc<dyn Engine>>,
        cloud: Option<Arc<dyn Engine>>,
        config: SyncConfig,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            local,
            cloud,
            ledger: None,
            config,
            staging_dir: staging_dir.into(),
            table_locks: DashMap::new(),
        }
    }

    pub fn with_ledger(mut self, ledger: Arc<SyncLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn ledger(&self) -> Option<&Arc<SyncLedger>> {
        self.ledger.as_ref()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn engine(&self, venue: Venue) -> Option<&Arc<dyn Engine>> {
        match venue {
            Venue::Local => self.local.as_ref(),
            Venue::Cloud => self.cloud.as_ref(),
        }
    }

    fn table_lock(&self, table_id: &str) -> Arc<Mutex<()>> {
        self.table_locks
            .entry(table_id.to_string())
            .or_default()
            .clone()
    }

    /// Copy `schema.table` from `source` to `target`.
    ///
    /// Only a same-venue request is an `Err`; copy and verification failures
    /// come back as a `SyncResult` with `success == false`, already recorded
    /// in the ledger.
    pub fn sync_table(
        &self,
        schema: &str,
        table: &str,
        source: Venue,
        target: Venue,
    ) -> Result<SyncResult, SyncError> {
        if source == target {
            return Err(SyncError::InvalidDirection {
                source_venue: source,
                target_venue: target,
            });
        }

        let table = TableRef::new(schema, table);
        let table_id = table.id();
        let lock = self.table_lock(&table_id);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let started = Instant::now();
        let source_name = self
            .engine(source)
            .map(|e| e.name().to_string())
            .unwrap_or_else(|| source.as_str().to_lowercase());
        let target_name = self
            .engine(target)
            .map(|e| e.name().to_string())
            .unwrap_or_else(|| target.as_str().to_lowercase());

        let max_attempts = self.config.max_retries.max(1);
        let mut observed = Observed::default();
        let mut attempt = 1;
        let outcome = loop {
            let result = match (self.engine(source), self.engine(target)) {
                (Some(src), Some(dst)) => {
                    self.attempt(src.as_ref(), dst.as_ref(), &table, &mut observed)
                }
                (None, _) => Err(SyncError::engine(&source_name, "engine not configured")),
                (_, None) => Err(SyncError::engine(&target_name, "engine not configured")),
            };

            match result {
                Ok(()) => break Ok(()),
                Err(e) if attempt < max_attempts => {
                    let delay = self.config.backoff(attempt);
                    warn!(
                        table = %table_id,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Sync attempt failed, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => break Err(e),
            }
        };

        let duration = started.elapsed();
        let (success, error, error_kind) = match outcome {
            Ok(()) => (true, None, SyncErrorKind::None),
            Err(e) => {
                let kind = if e.is_verification() {
                    SyncErrorKind::Verification
                } else {
                    SyncErrorKind::Copy
                };
                error!(
                    table = %table_id,
                    attempts = attempt,
                    kind = kind.as_str(),
                    error = %e,
                    "Sync failed, target copy is stale"
                );
                (false, Some(e.to_string()), kind)
            }
        };

        let result = SyncResult {
            table_id,
            source_engine: source_name,
            target_engine: target_name,
            source_row_count: observed.source,
            target_row_count: observed.target,
            verified: success && observed.verified,
            success,
            duration_seconds: duration.as_secs_f64(),
            attempt,
            error,
            error_kind,
            synced_at: Utc::now(),
        };

        metrics::counter!(
            "floe_sync_attempts_total",
            "outcome" => if success { "success" } else { error_kind.as_str() },
        )
        .increment(attempt as u64);
        metrics::histogram!("floe_sync_duration_seconds").record(duration.as_secs_f64());

        if success {
            info!(
                table = %result.table_id,
                rows = result.source_row_count,
                verified = result.verified,
                attempt,
                "Table synced"
            );
        }

        if let Some(ledger) = &self.ledger {
            if let Err(e) = ledger.record(&result) {
                warn!(table = %result.table_id, error = %e, "Failed to record sync");
            }
        }

        Ok(result)
    }

    fn attempt(
        &self,
        source: &dyn Engine,
        target: &dyn Engine,
        table: &TableRef,
        observed: &mut Observed,
    ) -> Result<(), SyncError> {
        observed.source = source.row_count(table)?;
        self.copy(source, target, table)?;

        if !self.config.verify_row_counts {
            observed.target = observed.source;
            observed.verified = false;
            return Ok(());
        }

        observed.target = target.row_count(table)?;
        if observed.source != observed.target {
            return Err(SyncError::VerificationMismatch {
                table_id: table.id(),
                source_rows: observed.source,
                target_rows: observed.target,
            });
        }
        observed.verified = true;
        Ok(())
    }

    fn copy(&self, source: &dyn Engine, target: &dyn Engine, table: &TableRef) -> Result<(), SyncError> {
        match source.attach_location() {
            Some(location) => {
                debug!(table = %table, "Copying through attached database");
                target.copy_from_attached(&location, table)
            }
            None => self.copy_staged(source, target, table),
        }
    }

    fn copy_staged(
        &self,
        source: &dyn Engine,
        target: &dyn Engine,
        table: &TableRef,
    ) -> Result<(), SyncError> {
        std::fs::create_dir_all(&self.staging_dir)?;
        let staging = self.staging_dir.join(format!(
            "{}_{}_{}.db",
            table.schema,
            table.table,
            Uuid::new_v4().simple()
        ));
        debug!(table = %table, staging = %staging.display(), "Copying through staging file");

        let outcome = source
            .export_table(table, &staging)
            .and_then(|()| target.import_table(table, &staging));
        remove_staging(&staging);
        outcome
    }
}

fn remove_staging(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove staging file"),
    }
}
