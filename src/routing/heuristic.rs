//! Heuristic router
//!
//! A lighter policy than the gate chain: pattern matching over the SQL text
//! plus routing history. It shares the gate chain's override-first
//! precedence and its catalog carve-out, but the gate chain is the
//! authoritative policy when both are available.
//!
//! Comments are stripped before any pattern runs.

use super::decision::{RoutingDecision, RoutingReason, Venue};
use super::error::RoutingError;
use super::model::{ModelDescriptor, SourceDescriptor};
use super::namespace::CatalogNamespaces;
use super::observer::{notify, RoutingObserver, TracingObserver};
use super::providers::{StatsProvider, VolumeEstimator};
use super::RoutingPolicy;
use crate::config::RoutingConfig;
use crate::transpiler::Transpiler;
use dashmap::DashMap;
use regex::Regex;
use std::sync::Arc;

/// Lower-case substrings of calls only the warehouse can run.
pub const CLOUD_ONLY_FUNCTIONS: &[&str] = &[
    // ML / AI
    "snowflake.ml",
    "snowflake.cortex",
    "cortex.complete",
    "cortex.sentiment",
    "cortex.summarize",
    "cortex.translate",
    "cortex.extract_answer",
    // Semi-structured
    "get_path",
    "xmlget",
    "parse_xml",
    // Streams and tasks
    "system$stream_has_data",
    "create stream",
    "create task",
    // Geospatial
    "st_asgeojson",
    "st_geogfromtext",
    "st_makepolygon",
    "geography",
    // External functions
    "external_function",
    "invoke ",
];

/// Patterns that indicate data the local engine cannot reach.
const EXTERNAL_SOURCE_PATTERNS: &[&str] = &[
    // Stages
    r"@[\w\.]+/",
    r"from\s+@",
    // db.schema.table
    r"(\w+)\.(\w+)\.(\w+)",
    // Object stores and HTTP
    r"s3://[\w\-\.]+/",
    r"gs://[\w\-\.]+/",
    r"azure://[\w\-\.]+/",
    r"abfss?://[\w\-\.]+/",
    r"https?://[\w\-\.]+/",
    // Data sharing and account views
    r"share\.",
    r"snowflake\.account_usage",
    r"snowflake\.organization_usage",
    // External tables and loads
    r"external_table",
    r"copy\s+into",
];

const SEMI_STRUCTURED_CAST: &str = r"\w+:\w+::\w+";
const VARIANT_INDEX: &str = r"\w+\['\w+'\]";

const MATCH_DISPLAY_LIMIT: usize = 50;

/// What earlier routing calls decided, keyed by node id or model name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryEntry {
    pub venue: Option<Venue>,
    pub reason: Option<RoutingReason>,
    pub local_failures: u32,
}

/// Shared routing history for one run.
#[derive(Debug, Default)]
pub struct RoutingHistory {
    entries: DashMap<String, HistoryEntry>,
}

impl RoutingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_decision(&self, key: &str, decision: &RoutingDecision) {
        let mut entry = self.entries.entry(key.to_string()).or_default();
        entry.venue = Some(decision.venue);
        entry.reason = Some(decision.reason);
    }

    pub fn record_local_failure(&self, key: &str) {
        self.entries.entry(key.to_string()).or_default().local_failures += 1;
    }

    pub fn get(&self, key: &str) -> Option<HistoryEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    pub fn local_failures(&self, key: &str) -> u32 {
        self.entries.get(key).map_or(0, |e| e.local_failures)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Pattern-matching routing policy.
pub struct HeuristicRouter {
    max_local_seconds: f64,
    max_local_size_gb: f64,
    namespaces: CatalogNamespaces,
    local_databases: Vec<String>,
    transpiler: Transpiler,
    external_patterns: Vec<Regex>,
    semi_structured_cast: Regex,
    variant_index: Regex,
    stats: Option<Arc<dyn StatsProvider>>,
    volume: Option<Arc<dyn VolumeEstimator>>,
    history: Arc<RoutingHistory>,
    observers: Vec<Box<dyn RoutingObserver>>,
}

impl HeuristicRouter {
    pub fn new(config: &RoutingConfig) -> Result<Self, RoutingError> {
        let heuristic_error = |message: String| RoutingError::Gate {
            gate: "heuristic",
            message,
        };
        let compile = |pattern: &str| {
            Regex::new(&format!("(?i){}", pattern)).map_err(|e| heuristic_error(e.to_string()))
        };

        let external_patterns = EXTERNAL_SOURCE_PATTERNS
            .iter()
            .map(|p| compile(*p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            max_local_seconds: config.max_local_seconds,
            max_local_size_gb: config.max_local_size_gb,
            namespaces: CatalogNamespaces::new(&config.catalog_namespaces)
                .map_err(|e| heuristic_error(e.to_string()))?,
            local_databases: config
                .local_databases
                .iter()
                .map(|db| db.to_lowercase())
                .collect(),
            transpiler: Transpiler::new(&config.source_dialect)
                .map_err(|e| heuristic_error(e.to_string()))?,
            external_patterns,
            semi_structured_cast: compile(SEMI_STRUCTURED_CAST)?,
            variant_index: compile(VARIANT_INDEX)?,
            stats: None,
            volume: None,
            history: Arc::new(RoutingHistory::new()),
            observers: vec![Box::new(TracingObserver)],
        })
    }

    pub fn with_stats(mut self, stats: Arc<dyn StatsProvider>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_volume_estimator(mut self, estimator: Arc<dyn VolumeEstimator>) -> Self {
        self.volume = Some(estimator);
        self
    }

    /// Share a history with other routers or the caller.
    pub fn with_history(mut self, history: Arc<RoutingHistory>) -> Self {
        self.history = history;
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn RoutingObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn without_observers(mut self) -> Self {
        self.observers.clear();
        self
    }

    pub fn history(&self) -> &Arc<RoutingHistory> {
        &self.history
    }

    fn evaluate(
        &self,
        model: &ModelDescriptor,
        sql: &str,
        sources: &[SourceDescriptor],
    ) -> RoutingDecision {
        if let Some(raw) = model.config.route_override.as_deref() {
            match raw.parse::<Venue>() {
                Ok(venue) => {
                    return RoutingDecision::new(venue, RoutingReason::UserOverride)
                        .with_details(format!("route_override='{}'", venue.as_str().to_lowercase()))
                }
                Err(_) if raw.trim().is_empty() => {}
                Err(e) => tracing::warn!(model = %model.name, error = %e, "Ignoring route_override"),
            }
        }

        if self.history.local_failures(&model.name) > 0 {
            return RoutingDecision::cloud(RoutingReason::PreviousFailure)
                .with_details("Local execution failed previously")
                .with_confidence(0.9);
        }

        let sql = self.transpiler.strip_comments(sql);

        if let Some(external) = self.detect_external_sources(&sql, sources) {
            return RoutingDecision::cloud(RoutingReason::ExternalSource).with_details(external);
        }

        if let Some(function) = self.detect_cloud_functions(&sql) {
            return RoutingDecision::cloud(RoutingReason::CloudFunction).with_details(function);
        }

        if let Some(dependency) = self.check_cloud_dependencies(model) {
            return RoutingDecision::cloud(RoutingReason::CloudDependency)
                .with_details(dependency)
                .with_confidence(0.8);
        }

        if let Some(stats) = self.stats.as_ref().and_then(|s| s.model_stats(&model.name)) {
            if stats.avg_seconds > self.max_local_seconds {
                return RoutingDecision::cloud(RoutingReason::HighComplexity)
                    .with_details(format!("Avg runtime: {:.1}m", stats.avg_seconds / 60.0))
                    .with_confidence(0.8);
            }
        }

        if let Some(gb) = self.estimate_volume(model) {
            if gb > self.max_local_size_gb {
                return RoutingDecision::cloud(RoutingReason::VolumeExceedsLimit)
                    .with_details(format!("{:.1}GB > {}GB limit", gb, self.max_local_size_gb));
            }
        }

        RoutingDecision::local(RoutingReason::AutoLocal).with_details("Passed all routing checks")
    }

    /// First external reference in `sql` or `sources`, described.
    pub fn detect_external_sources(
        &self,
        sql: &str,
        sources: &[SourceDescriptor],
    ) -> Option<String> {
        for pattern in &self.external_patterns {
            for found in pattern.find_iter(sql) {
                let text = found.as_str();
                if self.namespaces.qualifies(text) || self.is_local_qualified(text) {
                    continue;
                }
                // A dotted name followed by `(` is a call, not a relation
                if text.contains('.') && sql[found.end()..].trim_start().starts_with('(') {
                    continue;
                }
                let shown: String = text.chars().take(MATCH_DISPLAY_LIMIT).collect();
                return Some(format!("Pattern: {}", shown));
            }
        }

        for source in sources {
            if source.meta_flag("iceberg") || source.meta_flag("is_iceberg") {
                continue;
            }
            if source.meta_flag("external") || source.meta_flag("is_external") {
                return Some(format!("Source '{}' is external", source.name));
            }
            if let Some(db) = source.database.as_deref() {
                let lower = db.to_lowercase();
                if !db.is_empty()
                    && !self.local_databases.contains(&lower)
                    && !self.namespaces.is_catalog(db)
                {
                    return Some(format!("Source '{}' is cross-database", source.name));
                }
            }
            if let Some(format) = source.meta_str("format") {
                if matches!(format.as_str(), "external" | "stage" | "s3" | "gcs") {
                    return Some(format!("Source '{}' format is {}", source.name, format));
                }
            }
        }

        None
    }

    /// First cloud-only function or accessor syntax in `sql`, described.
    pub fn detect_cloud_functions(&self, sql: &str) -> Option<String> {
        let lower = sql.to_lowercase();
        if let Some(function) = CLOUD_ONLY_FUNCTIONS.iter().find(|f| lower.contains(*f)) {
            return Some(format!("Function: {}", function));
        }
        if self.semi_structured_cast.is_match(sql) {
            return Some("Semi-structured syntax (col:field::type)".to_string());
        }
        if self.variant_index.is_match(sql) {
            return Some("Variant access (col['field'])".to_string());
        }
        None
    }

    /// First upstream node history routed to CLOUD for an external source
    /// or cloud-only function.
    pub fn check_cloud_dependencies(&self, model: &ModelDescriptor) -> Option<String> {
        model.dependencies.iter().find_map(|node_id| {
            let entry = self.history.get(node_id)?;
            let cloud_only = entry.venue == Some(Venue::Cloud)
                && matches!(
                    entry.reason,
                    Some(RoutingReason::ExternalSource | RoutingReason::CloudFunction)
                );
            cloud_only.then(|| {
                let short = node_id.rsplit('.').next().unwrap_or(node_id);
                format!("Depends on cloud-only: {}", short)
            })
        })
    }

    fn estimate_volume(&self, model: &ModelDescriptor) -> Option<f64> {
        self.volume
            .as_ref()
            .and_then(|v| v.estimate_input_volume(model))
    }

    fn is_local_qualified(&self, reference: &str) -> bool {
        reference
            .split('.')
            .next()
            .is_some_and(|first| self.local_databases.contains(&first.to_lowercase()))
    }

    /// Multi-line analysis of how `model` would be routed.
    pub fn explain(&self, model: &ModelDescriptor, sql: &str) -> String {
        let decision = self.evaluate(model, sql, &model.sources);
        let stripped = self.transpiler.strip_comments(sql);

        let check = |finding: Option<String>, clean: &str| match finding {
            Some(found) => format!("✗ {}", found),
            None => format!("✓ {}", clean),
        };

        let volume = match self.estimate_volume(model) {
            Some(gb) => {
                let status = if gb > self.max_local_size_gb { "✗" } else { "✓" };
                format!(
                    "{} {:.2}GB (limit: {}GB)",
                    status, gb, self.max_local_size_gb
                )
            }
            None => "? (no catalog available)".to_string(),
        };

        [
            format!("Model: {}", model.name),
            format!("Decision: {}", decision),
            String::new(),
            "Analysis:".to_string(),
            format!(
                "  External sources: {}",
                check(
                    self.detect_external_sources(&stripped, &model.sources),
                    "None detected"
                )
            ),
            format!(
                "  Cloud functions: {}",
                check(self.detect_cloud_functions(&stripped), "None detected")
            ),
            format!(
                "  Cloud dependencies: {}",
                check(self.check_cloud_dependencies(model), "All local-compatible")
            ),
            format!("  Estimated volume: {}", volume),
        ]
        .join("\n")
    }
}

impl RoutingPolicy for HeuristicRouter {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn decide(
        &self,
        model: &ModelDescriptor,
        sql: &str,
        sources: Option<&[SourceDescriptor]>,
    ) -> RoutingDecision {
        let decision = self.evaluate(model, sql, sources.unwrap_or(&model.sources));
        self.history.record_decision(&model.unique_id, &decision);

        metrics::counter!(
            "floe_routing_decisions_total",
            "venue" => decision.venue.as_str(),
            "reason" => decision.reason.as_str(),
        )
        .increment(1);
        notify(&self.observers, model, &decision);
        decision
    }
}
