//! Sync error types

use std::borrow::Borrow;
use thiserror::Error;

use crate::routing::Venue;

/// Errors raised while copying a table between engines
#[derive(Error, Debug)]
pub enum SyncError {
    /// Engine missing, table unreadable, or a copy statement failed
    #[error("Engine '{engine}' failed: {message}")]
    Engine { engine: String, message: String },

    /// Copy completed but row counts disagree
    #[error("{}", describe_mismatch(.table_id, .source_rows, .target_rows))]
    VerificationMismatch {
        table_id: String,
        source_rows: u64,
        target_rows: u64,
    },

    /// Source and target are the same venue
    #[error("Invalid sync direction: {source_venue} -> {target_venue}")]
    InvalidDirection {
        source_venue: Venue,
        target_venue: Venue,
    },

    /// Ledger storage failure
    #[error("Sync ledger error: {0}")]
    Ledger(#[from] rusqlite::Error),

    /// Staging file I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub(crate) fn engine(engine: &str, message: impl Into<String>) -> Self {
        SyncError::Engine {
            engine: engine.to_string(),
            message: message.into(),
        }
    }

    pub fn is_verification(&self) -> bool {
        matches!(self, SyncError::VerificationMismatch { .. })
    }
}

fn describe_mismatch(
    table_id: impl AsRef<str>,
    source: impl Borrow<u64>,
    target: impl Borrow<u64>,
) -> String {
    let (source, target) = (*source.borrow(), *target.borrow());
    let diff = source.abs_diff(target);
    format!(
        "Row count mismatch for {}: source={}, target={} (off by {}, {:.2}%)",
        table_id.as_ref(),
        source,
        target,
        diff,
        diff as f64 / source.max(1) as f64 * 100.0
    )
}
