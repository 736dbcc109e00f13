//! Cross-engine table sync
//!
//! After a model runs on one venue its table is copied to the other so
//! downstream models on either side read current data. Every copy is
//! row-count verified, retried with linear backoff, and recorded in an
//! append-only [`SyncLedger`].

pub mod engine;
pub mod error;
pub mod ledger;
pub mod manager;
pub mod orchestrator;
pub mod result;

pub use engine::{Engine, SqliteEngine, TableRef};
pub use error::SyncError;
pub use ledger::{SyncLedger, SyncStats};
pub use manager::SyncManager;
pub use orchestrator::{topological_order, OrderedSyncReport, SyncOrchestrator};
pub use result::{SyncErrorKind, SyncResult};
