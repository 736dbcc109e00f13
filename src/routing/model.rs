//! Routing inputs: the model being routed and its declared sources.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-model routing configuration. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// `local` or `cloud`; any other value is reported by the intent gate
    #[serde(alias = "route", skip_serializing_if = "Option::is_none")]
    pub route_override: Option<String>,

    /// Declared input size in gigabytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_size_gb: Option<f64>,

    /// Column types the local engine cannot represent
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub toxic_types: Vec<String>,
}

/// A declared upstream source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceDescriptor {
    pub name: String,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub meta: HashMap<String, serde_json::Value>,
}

impl SourceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// String metadata value, lower-cased.
    pub fn meta_str(&self, key: &str) -> Option<String> {
        self.meta
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_lowercase())
    }

    /// Boolean metadata flag; `"true"` strings count.
    pub fn meta_flag(&self, key: &str) -> bool {
        match self.meta.get(key) {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

/// A unit of work to route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDescriptor {
    pub name: String,
    pub unique_id: String,
    pub config: ModelConfig,
    /// Upstream node ids, in declaration order
    pub dependencies: Vec<String>,
    pub sources: Vec<SourceDescriptor>,
}

impl ModelDescriptor {
    /// A model whose unique id is `model.<name>`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            unique_id: format!("model.{}", name),
            name,
            ..Default::default()
        }
    }

    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = unique_id.into();
        self
    }

    pub fn with_config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_override(mut self, route: impl Into<String>) -> Self {
        self.config.route_override = Some(route.into());
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_source(mut self, source: SourceDescriptor) -> Self {
        self.sources.push(source);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_ignores_unknown_keys() {
        let config: ModelConfig = serde_json::from_str(
            r#"{"route_override": "cloud", "materialized": "table", "tags": ["x"]}"#,
        )
        .unwrap();
        assert_eq!(config.route_override.as_deref(), Some("cloud"));
        assert!(config.toxic_types.is_empty());
    }

    #[test]
    fn test_config_accepts_route_alias() {
        let config: ModelConfig = serde_json::from_str(r#"{"route": "local"}"#).unwrap();
        assert_eq!(config.route_override.as_deref(), Some("local"));
    }

    #[test]
    fn test_meta_helpers() {
        let source = SourceDescriptor::new("events")
            .with_meta("format", "Internal")
            .with_meta("is_external", "true")
            .with_meta("iceberg", true);
        assert_eq!(source.meta_str("format").as_deref(), Some("internal"));
        assert!(source.meta_flag("is_external"));
        assert!(source.meta_flag("iceberg"));
        assert!(!source.meta_flag("missing"));
    }

    #[test]
    fn test_default_unique_id() {
        assert_eq!(ModelDescriptor::new("orders").unique_id, "model.orders");
    }
}
