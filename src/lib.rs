//! Floe - local-first execution router for warehouse models
//!
//! Decides per model whether to run on a free embedded engine or a paid
//! cloud warehouse, rewrites warehouse SQL into the local dialect, records
//! crashed local runs in a write-ahead ledger, and keeps tables in sync
//! between the two venues with verified, retried copies.

pub mod cli;
pub mod config;
pub mod logging;
pub mod routing;
pub mod stability;
pub mod sync;
pub mod transpiler;
