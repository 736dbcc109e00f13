//! Shared test utilities for Floe integration tests.

#![allow(dead_code)]

use floe::config::{FloeConfig, RoutingConfig, SyncConfig};
use floe::routing::{
    GateEngine, ModelDescriptor, ModelStats, SourceDescriptor, StatsProvider, VolumeEstimator,
};
use floe::stability::StabilityLedger;
use floe::sync::{Engine, SqliteEngine};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

// =============================================================================
// Config
// =============================================================================

/// Default config with all state under `dir`.
pub fn config_in(dir: &Path) -> FloeConfig {
    let mut config = FloeConfig::default();
    config.stability.state_dir = dir.to_path_buf();
    config
}

/// Sync config without backoff delays.
pub fn fast_sync() -> SyncConfig {
    SyncConfig {
        retry_delay_seconds: 0.0,
        ..Default::default()
    }
}

// =============================================================================
// Routing
// =============================================================================

/// A source tagged with a `format` metadata value.
pub fn source_with_format(name: &str, format: &str) -> SourceDescriptor {
    SourceDescriptor::new(name).with_meta("format", format)
}

/// Historical stats for one model.
pub fn stats_for(model: &str, avg_seconds: f64) -> Arc<dyn StatsProvider> {
    let mut stats = HashMap::new();
    stats.insert(
        model.to_string(),
        ModelStats {
            avg_seconds,
            run_count: 10,
            ..Default::default()
        },
    );
    Arc::new(stats)
}

/// Estimator that reports the same volume for every model.
pub struct FixedVolume(pub f64);

impl VolumeEstimator for FixedVolume {
    fn estimate_input_volume(&self, _: &ModelDescriptor) -> Option<f64> {
        Some(self.0)
    }
}

/// Gate engine over a fresh ledger in `dir`, without observers.
pub fn gate_engine(dir: &Path) -> GateEngine {
    let ledger = Arc::new(StabilityLedger::open(dir, 3));
    GateEngine::builder(RoutingConfig::default(), ledger)
        .quiet()
        .build()
        .unwrap()
}

// =============================================================================
// Sync
// =============================================================================

/// In-memory engine holding `schema.table` with `rows` rows.
pub fn engine_with_table(name: &str, schema: &str, table: &str, rows: usize) -> Arc<dyn Engine> {
    let engine = SqliteEngine::open_in_memory(name).unwrap();
    seed(&engine, schema, table, rows);
    Arc::new(engine)
}

/// Create `schema.table` in `engine` with `rows` rows.
pub fn seed(engine: &SqliteEngine, schema: &str, table: &str, rows: usize) {
    let name = SqliteEngine::storage_name(&floe::sync::TableRef::new(schema, table));
    let mut sql = format!("CREATE TABLE \"{}\" (id INTEGER, label TEXT);", name);
    for id in 0..rows {
        sql.push_str(&format!("INSERT INTO \"{}\" VALUES ({}, 'row-{}');", name, id, id));
    }
    engine.execute_batch(&sql).unwrap();
}

/// Empty in-memory engine.
pub fn empty_engine(name: &str) -> Arc<dyn Engine> {
    Arc::new(SqliteEngine::open_in_memory(name).unwrap())
}
