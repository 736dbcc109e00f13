//! Sync outcome types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Why a sync failed, if it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    #[default]
    None,
    /// Copy ran but row counts kept disagreeing
    Verification,
    /// Copy itself failed
    Copy,
}

impl SyncErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncErrorKind::None => "none",
            SyncErrorKind::Verification => "verification",
            SyncErrorKind::Copy => "copy",
        }
    }
}

impl FromStr for SyncErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(SyncErrorKind::None),
            "verification" => Ok(SyncErrorKind::Verification),
            "copy" => Ok(SyncErrorKind::Copy),
            _ => Err(format!("Invalid sync error kind: {}", s)),
        }
    }
}

/// Final outcome of one `sync_table` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub table_id: String,
    pub source_engine: String,
    pub target_engine: String,
    pub source_row_count: u64,
    pub target_row_count: u64,
    pub verified: bool,
    pub success: bool,
    pub duration_seconds: f64,
    /// 1-based attempt that produced this result
    pub attempt: u32,
    pub error: Option<String>,
    pub error_kind: SyncErrorKind,
    pub synced_at: DateTime<Utc>,
}

impl SyncResult {
    /// True when the target copy is known not to match the source.
    pub fn is_stale(&self) -> bool {
        !self.success
    }
}

impl std::fmt::Display for SyncResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.success {
            let mark = if self.verified { "verified" } else { "unverified" };
            write!(
                f,
                "{}: {} rows synced ({})",
                self.table_id, self.source_row_count, mark
            )
        } else {
            write!(
                f,
                "{}: {}",
                self.table_id,
                self.error.as_deref().unwrap_or("unknown error")
            )
        }
    }
}
