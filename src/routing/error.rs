//! Error types for routing failures

use crate::stability::StabilityError;
use thiserror::Error;

/// Errors raised inside a gate.
///
/// The engine never returns these to callers: a failing gate is logged and
/// treated as "did not fire".
#[derive(Debug, Error)]
pub enum RoutingError {
    /// A gate could not evaluate its inputs
    #[error("Gate {gate} failed: {message}")]
    Gate { gate: &'static str, message: String },

    /// `route_override` holds something other than `local` or `cloud`
    #[error("Invalid route_override '{value}' for model '{model}' (expected 'local' or 'cloud')")]
    InvalidOverride { model: String, value: String },

    /// A declared size estimate is negative or not a finite number
    #[error("Invalid estimated_size_gb {value} for model '{model}'")]
    InvalidEstimate { model: String, value: f64 },

    /// The crash ledger could not be read or updated
    #[error("Stability ledger error: {0}")]
    Stability(#[from] StabilityError),
}
