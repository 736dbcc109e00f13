//! Route command implementation

use crate::cli::output::{format_decision, format_decision_json};
use crate::cli::{CliResult, RouteArgs};
use crate::config::FloeConfig;
use crate::routing::{
    CatalogScanner, GateEngine, HeuristicRouter, HistoricalStatsCache, ModelConfig,
    ModelDescriptor, PolicyKind, RoutingPolicy, SourceDescriptor, StatsProvider, TableStats,
    VolumeEstimator,
};
use crate::stability::StabilityLedger;
use std::collections::HashMap;
use std::sync::Arc;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Build the model descriptor from CLI flags.
fn model_from_args(args: &RouteArgs) -> CliResult<ModelDescriptor> {
    let mut model = ModelDescriptor::new(&args.model);
    if let Some(id) = &args.unique_id {
        model = model.with_unique_id(id);
    }
    if let Some(raw) = &args.config_json {
        let config: ModelConfig = serde_json::from_str(raw)
            .map_err(|e| format!("Invalid --config-json: {}", e))?;
        model = model.with_config(config);
    }
    if let Some(raw) = &args.sources_json {
        let sources: Vec<SourceDescriptor> = serde_json::from_str(raw)
            .map_err(|e| format!("Invalid --sources-json: {}", e))?;
        model.sources = sources;
    }
    Ok(model.with_dependencies(args.dependencies.iter().cloned()))
}

/// Parse `{"schema.table": gb}` into catalog stats keyed by `schema.table`.
fn table_sizes(raw: &str) -> CliResult<HashMap<String, TableStats>> {
    let sizes: HashMap<String, f64> =
        serde_json::from_str(raw).map_err(|e| format!("Invalid --table-sizes-json: {}", e))?;

    let mut stats = HashMap::with_capacity(sizes.len());
    for (key, gb) in sizes {
        let (schema, table) = key
            .rsplit_once('.')
            .ok_or_else(|| format!("Table size key must be schema.table: {}", key))?;
        stats.insert(
            key.clone(),
            TableStats {
                schema: schema.to_string(),
                table: table.to_string(),
                row_count: 0,
                size_bytes: (gb.max(0.0) * BYTES_PER_GB) as u64,
            },
        );
    }
    Ok(stats)
}

fn build_policy(args: &RouteArgs, config: &FloeConfig) -> CliResult<Box<dyn RoutingPolicyExt>> {
    let state_dir = config.state_dir();
    let stats: Arc<dyn StatsProvider> =
        Arc::new(HistoricalStatsCache::new(state_dir, config.stats.ttl_hours));
    let volume: Option<Arc<dyn VolumeEstimator>> = match &args.table_sizes_json {
        Some(raw) => Some(Arc::new(CatalogScanner::new(
            table_sizes(raw)?,
            config.stats.catalog_ttl(),
        ))),
        None => None,
    };

    match args.policy {
        PolicyKind::Gates => {
            let ledger = Arc::new(StabilityLedger::open(
                state_dir,
                config.stability.max_crash_count,
            ));
            let mut builder = GateEngine::builder(config.routing.clone(), ledger).stats(stats);
            if let Some(volume) = volume {
                builder = builder.volume_estimator(volume);
            }
            Ok(Box::new(builder.build()?))
        }
        PolicyKind::Heuristic => {
            let mut router = HeuristicRouter::new(&config.routing)?.with_stats(stats);
            if let Some(volume) = volume {
                router = router.with_volume_estimator(volume);
            }
            Ok(Box::new(router))
        }
    }
}

/// A routing policy that can also explain itself.
trait RoutingPolicyExt: RoutingPolicy {
    fn explain(&self, model: &ModelDescriptor, sql: &str) -> String;
}

impl RoutingPolicyExt for GateEngine {
    fn explain(&self, model: &ModelDescriptor, sql: &str) -> String {
        GateEngine::explain(self, model, sql, None)
    }
}

impl RoutingPolicyExt for HeuristicRouter {
    fn explain(&self, model: &ModelDescriptor, sql: &str) -> String {
        HeuristicRouter::explain(self, model, sql)
    }
}

/// Handle `floe route`
pub fn handle_route(args: &RouteArgs, config: &FloeConfig, sql: &str) -> CliResult<String> {
    let model = model_from_args(args)?;
    let policy = build_policy(args, config)?;

    if args.explain && !args.json {
        return Ok(policy.explain(&model, sql));
    }

    let decision = policy.decide(&model, sql, None);
    if args.json {
        Ok(format_decision_json(&model.name, policy.name(), &decision)?)
    } else {
        Ok(format_decision(&model.name, &decision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(model: &str) -> RouteArgs {
        RouteArgs {
            model: model.to_string(),
            unique_id: None,
            config_json: None,
            sources_json: None,
            dependencies: vec![],
            table_sizes_json: None,
            policy: PolicyKind::Gates,
            explain: false,
            json: true,
            input: None,
        }
    }

    fn config(dir: &std::path::Path) -> FloeConfig {
        let mut config = FloeConfig::default();
        config.stability.state_dir = dir.to_path_buf();
        config
    }

    fn decision(output: &str) -> serde_json::Value {
        let parsed: serde_json::Value = serde_json::from_str(output).unwrap();
        parsed["decision"].clone()
    }

    #[test]
    fn test_route_default_local() {
        let dir = tempfile::tempdir().unwrap();
        let output = handle_route(&args("orders"), &config(dir.path()), "SELECT 1 AS x").unwrap();
        assert_eq!(decision(&output)["venue"], "LOCAL");
        assert_eq!(decision(&output)["reason"], "DEFAULT_LOCAL");
    }

    #[test]
    fn test_route_override_from_config_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args("orders");
        a.config_json = Some(r#"{"route_override": "cloud"}"#.to_string());
        let output = handle_route(&a, &config(dir.path()), "SELECT 1").unwrap();
        assert_eq!(decision(&output)["venue"], "CLOUD");
        assert_eq!(decision(&output)["gate"], 1);
    }

    #[test]
    fn test_route_internal_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args("orders");
        a.sources_json =
            Some(r#"[{"name": "ledger", "meta": {"format": "internal"}}]"#.to_string());
        let output = handle_route(&a, &config(dir.path()), "SELECT 1").unwrap();
        assert_eq!(decision(&output)["reason"], "INTERNAL_SOURCE");
    }

    #[test]
    fn test_route_table_sizes_drive_physics_gate() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args("orders");
        a.dependencies = vec!["model.shop.raw.events".to_string()];
        a.table_sizes_json = Some(r#"{"raw.events": 40.0}"#.to_string());
        let output = handle_route(&a, &config(dir.path()), "SELECT 1").unwrap();
        assert_eq!(decision(&output)["reason"], "VOLUME_EXCEEDS_LIMIT");
    }

    #[test]
    fn test_route_heuristic_explain() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args("orders");
        a.policy = PolicyKind::Heuristic;
        a.explain = true;
        a.json = false;
        let output = handle_route(&a, &config(dir.path()), "SELECT 1").unwrap();
        assert!(output.contains("Model: orders"));
        assert!(output.contains("Cloud functions"));
    }

    #[test]
    fn test_route_invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args("orders");
        a.sources_json = Some("not json".to_string());
        assert!(handle_route(&a, &config(dir.path()), "SELECT 1").is_err());
    }

    #[test]
    fn test_table_sizes_parse() {
        let stats = table_sizes(r#"{"raw.events": 1.0}"#).unwrap();
        let entry = &stats["raw.events"];
        assert_eq!(entry.schema, "raw");
        assert_eq!(entry.size_bytes, 1024 * 1024 * 1024);
        assert!(table_sizes(r#"{"events": 1.0}"#).is_err());
    }
}
