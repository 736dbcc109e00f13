//! Error types for the crash ledger.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while persisting the crash ledger.
#[derive(Debug, Error)]
pub enum StabilityError {
    /// Reading or writing the state file failed
    #[error("state file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state document could not be serialized
    #[error("state serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Another thread panicked while holding the ledger lock
    #[error("stability ledger lock poisoned")]
    Poisoned,
}

impl StabilityError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
