//! Estimate providers consumed by the complexity and physics gates
//!
//! The engine only sees the traits here. [`HistoricalStatsCache`] and
//! [`CatalogScanner`] are the bundled implementations: a JSON document of
//! past warehouse runs, and a TTL cache over any [`TableSizeSource`].

use super::model::ModelDescriptor;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, Instant};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// File name of the historical stats document inside the state directory.
pub const STATS_FILE: &str = "cloud_stats.json";

/// Historical warehouse execution numbers for one model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelStats {
    pub avg_seconds: f64,
    pub avg_spill_bytes: f64,
    pub avg_rows_produced: f64,
    pub run_count: u64,
    pub last_run: Option<String>,
}

/// Source of historical execution stats, by model name.
pub trait StatsProvider: Send + Sync {
    fn model_stats(&self, model_name: &str) -> Option<ModelStats>;
}

impl StatsProvider for HashMap<String, ModelStats> {
    fn model_stats(&self, model_name: &str) -> Option<ModelStats> {
        self.get(model_name).cloned()
    }
}

/// Estimated input size of a model, in gigabytes.
pub trait VolumeEstimator: Send + Sync {
    fn estimate_input_volume(&self, model: &ModelDescriptor) -> Option<f64>;
}

/// "Is this table already materialized on local disk?"
pub trait LocalTableCache: Send + Sync {
    fn exists_locally(&self, schema: &str, table: &str) -> bool;
}

/// A set of `schema.table` names, compared case-insensitively.
impl LocalTableCache for HashSet<String> {
    fn exists_locally(&self, schema: &str, table: &str) -> bool {
        let key = format!("{}.{}", schema, table).to_lowercase();
        self.iter().any(|entry| entry.to_lowercase() == key)
    }
}

/// On-disk layout of `cloud_stats.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsDocument {
    pub models: HashMap<String, ModelStats>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub source: String,
}

/// Lazily loaded, read-mostly cache of `cloud_stats.json`.
///
/// Staleness is acceptable: readers never block on a refresh.
#[derive(Debug)]
pub struct HistoricalStatsCache {
    path: PathBuf,
    ttl: chrono::Duration,
    document: RwLock<Option<StatsDocument>>,
}

impl HistoricalStatsCache {
    pub fn new(state_dir: impl AsRef<Path>, ttl_hours: u64) -> Self {
        Self {
            path: state_dir.as_ref().join(STATS_FILE),
            ttl: chrono::Duration::hours(ttl_hours as i64),
            document: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the file is missing or older than the TTL.
    pub fn is_stale(&self) -> bool {
        self.with_document(|doc| match doc.and_then(|d| d.fetched_at) {
            Some(fetched_at) => Utc::now() - fetched_at > self.ttl,
            None => true,
        })
    }

    /// Replace the document with `models` and persist it.
    pub fn update(
        &self,
        models: HashMap<String, ModelStats>,
        source: &str,
    ) -> std::io::Result<()> {
        let doc = StatsDocument {
            models,
            fetched_at: Some(Utc::now()),
            source: source.to_string(),
        };
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&doc).map_err(std::io::Error::other)?;
        std::fs::write(&self.path, json)?;

        tracing::info!(
            models = doc.models.len(),
            source,
            "Updated historical stats cache"
        );
        if let Ok(mut slot) = self.document.write() {
            *slot = Some(doc);
        }
        Ok(())
    }

    /// Drop the in-memory copy; the next read goes back to disk.
    pub fn reload(&self) {
        if let Ok(mut slot) = self.document.write() {
            *slot = None;
        }
    }

    /// Models whose average runtime exceeds `threshold_seconds`, slowest first.
    pub fn slow_models(&self, threshold_seconds: f64) -> Vec<(String, f64)> {
        let mut slow: Vec<(String, f64)> = self.with_document(|doc| {
            doc.map(|d| {
                d.models
                    .iter()
                    .filter(|(_, s)| s.avg_seconds > threshold_seconds)
                    .map(|(name, s)| (name.clone(), s.avg_seconds))
                    .collect()
            })
            .unwrap_or_default()
        });
        slow.sort_by(|a, b| b.1.total_cmp(&a.1));
        slow
    }

    fn with_document<T>(&self, f: impl FnOnce(Option<&StatsDocument>) -> T) -> T {
        let loaded = self
            .document
            .read()
            .map(|slot| slot.is_some())
            .unwrap_or(false);
        if !loaded {
            let doc = self.load_from_disk();
            if let Ok(mut slot) = self.document.write() {
                if slot.is_none() {
                    *slot = doc;
                }
            }
        }
        match self.document.read() {
            Ok(slot) => f(slot.as_ref()),
            Err(_) => f(None),
        }
    }

    fn load_from_disk(&self) -> Option<StatsDocument> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring corrupt stats cache");
                None
            }
        }
    }
}

impl StatsProvider for HistoricalStatsCache {
    fn model_stats(&self, model_name: &str) -> Option<ModelStats> {
        self.with_document(|doc| doc.and_then(|d| d.models.get(model_name).cloned()))
    }
}

/// Size and row count of one warehouse table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStats {
    pub schema: String,
    pub table: String,
    pub row_count: u64,
    pub size_bytes: u64,
}

impl TableStats {
    pub fn size_gb(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_GB
    }
}

/// Catalog metadata lookup, e.g. a warehouse's information schema.
pub trait TableSizeSource: Send + Sync {
    fn table_stats(&self, schema: &str, table: &str) -> Option<TableStats>;
}

/// Static sizes keyed by `schema.table` (case-insensitive).
impl TableSizeSource for HashMap<String, TableStats> {
    fn table_stats(&self, schema: &str, table: &str) -> Option<TableStats> {
        let key = format!("{}.{}", schema, table).to_lowercase();
        self.iter()
            .find(|(k, _)| k.to_lowercase() == key)
            .map(|(_, stats)| stats.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CatalogCacheStats {
    pub entries: usize,
    pub total_gb: f64,
}

/// Sums upstream table sizes through a TTL cache.
pub struct CatalogScanner<S: TableSizeSource> {
    source: S,
    ttl: Duration,
    cache: DashMap<String, (TableStats, Instant)>,
}

impl<S: TableSizeSource> CatalogScanner<S> {
    pub fn new(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cache: DashMap::new(),
        }
    }

    /// Stats for a node id such as `model.project.schema.table`.
    ///
    /// The last segment is the table, the one before it the schema; two-part
    /// ids use `main`.
    pub fn table_stats(&self, node_id: &str) -> Option<TableStats> {
        if let Some(entry) = self.cache.get(node_id) {
            let (stats, cached_at) = entry.value();
            if cached_at.elapsed() < self.ttl {
                return Some(stats.clone());
            }
        }

        let parts: Vec<&str> = node_id.split('.').collect();
        if parts.len() < 2 {
            return None;
        }
        let table = parts[parts.len() - 1];
        let schema = if parts.len() > 2 {
            parts[parts.len() - 2]
        } else {
            "main"
        };

        let stats = self.source.table_stats(schema, table)?;
        self.cache
            .insert(node_id.to_string(), (stats.clone(), Instant::now()));
        Some(stats)
    }

    /// Forget every cached entry.
    pub fn refresh(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CatalogCacheStats {
        let total_bytes: u64 = self.cache.iter().map(|e| e.value().0.size_bytes).sum();
        CatalogCacheStats {
            entries: self.cache.len(),
            total_gb: total_bytes as f64 / BYTES_PER_GB,
        }
    }
}

impl<S: TableSizeSource> VolumeEstimator for CatalogScanner<S> {
    /// `None` when no dependency has known stats.
    fn estimate_input_volume(&self, model: &ModelDescriptor) -> Option<f64> {
        let sizes: Vec<u64> = model
            .dependencies
            .iter()
            .filter_map(|node_id| self.table_stats(node_id))
            .map(|stats| stats.size_bytes)
            .collect();
        if sizes.is_empty() {
            return None;
        }
        Some(sizes.iter().sum::<u64>() as f64 / BYTES_PER_GB)
    }
}
