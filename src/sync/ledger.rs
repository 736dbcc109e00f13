//! Append-only history of sync outcomes

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::error::SyncError;
use super::result::{SyncErrorKind, SyncResult};

/// Fixed-width UTC timestamps so text order is time order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sync_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    table_id TEXT NOT NULL,
    source_engine TEXT NOT NULL,
    target_engine TEXT NOT NULL,
    source_row_count INTEGER,
    target_row_count INTEGER,
    success BOOLEAN NOT NULL,
    verified BOOLEAN,
    duration_seconds REAL,
    error TEXT,
    error_kind TEXT NOT NULL DEFAULT 'none',
    attempt INTEGER,
    synced_at TEXT DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_sync_table_id ON sync_history(table_id);
CREATE INDEX IF NOT EXISTS idx_sync_time ON sync_history(synced_at);
";

const COLUMNS: &str = "table_id, source_engine, target_engine, source_row_count, \
    target_row_count, success, verified, duration_seconds, error, error_kind, attempt, synced_at";

/// Aggregate sync health over a time window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStats {
    pub period_hours: u32,
    pub total: u64,
    pub successful: u64,
    pub verified: u64,
    pub failed: u64,
    pub avg_duration_seconds: f64,
    pub total_rows: u64,
    /// Percentage of successful syncs (0 when there were none)
    pub success_rate: f64,
}

/// SQLite-backed sync history. Rows are only ever inserted.
pub struct SyncLedger {
    conn: Mutex<Connection>,
}

impl SyncLedger {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, SyncError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, SyncError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SyncError> {
        self.conn
            .lock()
            .map_err(|_| SyncError::engine("ledger", "connection lock poisoned"))
    }

    pub fn record(&self, result: &SyncResult) -> Result<(), SyncError> {
        self.lock()?.execute(
            "INSERT INTO sync_history (table_id, source_engine, target_engine, source_row_count, \
             target_row_count, success, verified, duration_seconds, error, error_kind, attempt, synced_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                result.table_id,
                result.source_engine,
                result.target_engine,
                result.source_row_count as i64,
                result.target_row_count as i64,
                result.success,
                result.verified,
                result.duration_seconds,
                result.error,
                result.error_kind.as_str(),
                result.attempt,
                format_timestamp(&result.synced_at),
            ],
        )?;
        Ok(())
    }

    /// Most recent entry for `table_id`.
    pub fn last_sync(&self, table_id: &str) -> Result<Option<SyncResult>, SyncError> {
        let sql = format!(
            "SELECT {} FROM sync_history WHERE table_id = ?1 \
             ORDER BY synced_at DESC, id DESC LIMIT 1",
            COLUMNS
        );
        Ok(self
            .lock()?
            .query_row(&sql, params![table_id], map_row)
            .optional()?)
    }

    /// Newest-first history for `table_id`.
    pub fn history(&self, table_id: &str, limit: usize) -> Result<Vec<SyncResult>, SyncError> {
        let sql = format!(
            "SELECT {} FROM sync_history WHERE table_id = ?1 \
             ORDER BY synced_at DESC, id DESC LIMIT ?2",
            COLUMNS
        );
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![table_id, limit as i64], map_row)?;
        let history = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(history)
    }

    /// Failures recorded in the last `since_hours` hours, newest first.
    pub fn failed_syncs(&self, since_hours: u32) -> Result<Vec<SyncResult>, SyncError> {
        let sql = format!(
            "SELECT {} FROM sync_history WHERE success = 0 AND synced_at > ?1 \
             ORDER BY synced_at DESC, id DESC",
            COLUMNS
        );
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![cutoff(since_hours)], map_row)?;
        let failed = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(failed)
    }

    pub fn stats(&self, since_hours: u32) -> Result<SyncStats, SyncError> {
        let (total, successful, verified, avg_duration, total_rows): (i64, i64, i64, f64, i64) =
            self.lock()?.query_row(
                "SELECT COUNT(*), \
                        COALESCE(SUM(CASE WHEN success THEN 1 ELSE 0 END), 0), \
                        COALESCE(SUM(CASE WHEN verified THEN 1 ELSE 0 END), 0), \
                        COALESCE(AVG(duration_seconds), 0.0), \
                        COALESCE(SUM(CASE WHEN success THEN source_row_count ELSE 0 END), 0) \
                 FROM sync_history WHERE synced_at > ?1",
                params![cutoff(since_hours)],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )?;

        let total = total.max(0) as u64;
        let successful = successful.max(0) as u64;
        Ok(SyncStats {
            period_hours: since_hours,
            total,
            successful,
            verified: verified.max(0) as u64,
            failed: total - successful,
            avg_duration_seconds: avg_duration,
            total_rows: total_rows.max(0) as u64,
            success_rate: successful as f64 / total.max(1) as f64 * 100.0,
        })
    }
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn cutoff(since_hours: u32) -> String {
    format_timestamp(&(Utc::now() - chrono::Duration::hours(since_hours as i64)))
}

/// Accepts our own format and SQLite's `CURRENT_TIMESTAMP` default.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<SyncResult> {
    let error_kind: String = row.get(9)?;
    let synced_at: Option<String> = row.get(11)?;
    Ok(SyncResult {
        table_id: row.get(0)?,
        source_engine: row.get(1)?,
        target_engine: row.get(2)?,
        source_row_count: row.get::<_, Option<i64>>(3)?.unwrap_or(0).max(0) as u64,
        target_row_count: row.get::<_, Option<i64>>(4)?.unwrap_or(0).max(0) as u64,
        success: row.get(5)?,
        verified: row.get::<_, Option<bool>>(6)?.unwrap_or(false),
        duration_seconds: row.get::<_, Option<f64>>(7)?.unwrap_or(0.0),
        error: row.get(8)?,
        error_kind: error_kind.parse().unwrap_or_default(),
        attempt: row.get::<_, Option<u32>>(10)?.unwrap_or(1),
        synced_at: synced_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(table_id: &str, success: bool, rows: u64, at: DateTime<Utc>) -> SyncResult {
        SyncResult {
            table_id: table_id.to_string(),
            source_engine: "local".to_string(),
            target_engine: "cloud".to_string(),
            source_row_count: rows,
            target_row_count: if success { rows } else { 0 },
            verified: success,
            success,
            duration_seconds: 2.0,
            attempt: if success { 1 } else { 3 },
            error: (!success).then(|| "copy failed".to_string()),
            error_kind: if success {
                SyncErrorKind::None
            } else {
                SyncErrorKind::Copy
            },
            synced_at: at,
        }
    }

    #[test]
    fn test_record_and_last_sync() {
        let ledger = SyncLedger::open_in_memory().unwrap();
        let now = Utc::now();
        ledger
            .record(&result("a.orders", false, 10, now - chrono::Duration::minutes(5)))
            .unwrap();
        ledger.record(&result("a.orders", true, 10, now)).unwrap();

        let last = ledger.last_sync("a.orders").unwrap().unwrap();
        assert!(last.success);
        assert_eq!(last.source_row_count, 10);
        assert!(ledger.last_sync("a.missing").unwrap().is_none());
    }

    #[test]
    fn test_history_is_newest_first_and_limited() {
        let ledger = SyncLedger::open_in_memory().unwrap();
        let now = Utc::now();
        for minutes in [30, 20, 10] {
            ledger
                .record(&result("a.t", true, minutes, now - chrono::Duration::minutes(minutes as i64)))
                .unwrap();
        }

        let history = ledger.history("a.t", 2).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].source_row_count, 10);
        assert_eq!(history[1].source_row_count, 20);
    }

    #[test]
    fn test_failed_syncs_window() {
        let ledger = SyncLedger::open_in_memory().unwrap();
        let now = Utc::now();
        ledger.record(&result("a.old", false, 1, now - chrono::Duration::hours(48))).unwrap();
        ledger.record(&result("a.new", false, 1, now)).unwrap();
        ledger.record(&result("a.ok", true, 1, now)).unwrap();

        let failed = ledger.failed_syncs(24).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].table_id, "a.new");
        assert_eq!(failed[0].error_kind, SyncErrorKind::Copy);
    }

    #[test]
    fn test_stats() {
        let ledger = SyncLedger::open_in_memory().unwrap();
        let now = Utc::now();
        ledger.record(&result("a.x", true, 100, now)).unwrap();
        ledger.record(&result("a.y", true, 50, now)).unwrap();
        ledger.record(&result("a.z", false, 7, now)).unwrap();
        ledger.record(&result("a.w", true, 1, now - chrono::Duration::hours(30))).unwrap();

        let stats = ledger.stats(24).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.verified, 2);
        assert_eq!(stats.total_rows, 150);
        assert!((stats.success_rate - 200.0 / 3.0).abs() < 1e-9);
        assert!((stats.avg_duration_seconds - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_stats() {
        let ledger = SyncLedger::open_in_memory().unwrap();
        let stats = ledger.stats(24).unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.success_rate, 0.0);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sync_ledger.db");
        SyncLedger::open(&path)
            .unwrap()
            .record(&result("a.t", true, 3, Utc::now()))
            .unwrap();

        let reopened = SyncLedger::open(&path).unwrap();
        assert_eq!(reopened.history("a.t", 10).unwrap().len(), 1);
    }
}
