//! Gate 2: Gravity (data accessibility)
//!
//! Fires when the local engine cannot read the model's inputs: a source
//! tagged `format: internal`, a source in a foreign database, or a
//! three-part relation in the SQL outside the local and catalog namespaces.

use super::{Gate, GateContext};
use crate::routing::decision::{RoutingDecision, RoutingReason};
use crate::routing::error::RoutingError;
use crate::routing::model::SourceDescriptor;
use crate::routing::namespace::CatalogNamespaces;
use crate::routing::providers::LocalTableCache;
use crate::transpiler::Transpiler;
use std::sync::Arc;

pub struct GravityGate {
    namespaces: CatalogNamespaces,
    local_databases: Vec<String>,
    transpiler: Transpiler,
    local_cache: Option<Arc<dyn LocalTableCache>>,
}

impl GravityGate {
    pub fn new(
        namespaces: CatalogNamespaces,
        local_databases: Vec<String>,
        transpiler: Transpiler,
        local_cache: Option<Arc<dyn LocalTableCache>>,
    ) -> Self {
        Self {
            namespaces,
            local_databases: local_databases
                .into_iter()
                .map(|db| db.to_lowercase())
                .collect(),
            transpiler,
            local_cache,
        }
    }

    fn is_local_database(&self, database: &str) -> bool {
        let database = database.trim_matches('"').to_lowercase();
        self.local_databases.contains(&database)
    }

    fn is_reachable(&self, database: &str) -> bool {
        database.is_empty() || self.is_local_database(database) || self.namespaces.is_catalog(database)
    }

    fn is_cached(&self, source: &SourceDescriptor) -> bool {
        let Some(cache) = &self.local_cache else {
            return false;
        };
        let schema = source.schema.as_deref().unwrap_or("main");
        cache.exists_locally(schema, &source.name)
    }

    fn foreign_source<'a>(&self, sources: &'a [SourceDescriptor]) -> Option<&'a SourceDescriptor> {
        sources.iter().find(|source| match source.database.as_deref() {
            Some(db) => !self.is_reachable(db) && !self.is_cached(source),
            None => false,
        })
    }

    fn foreign_relation(&self, sql: &str) -> Option<String> {
        self.transpiler
            .referenced_relations(sql)
            .into_iter()
            .find(|relation| {
                let parts: Vec<&str> = relation.split('.').collect();
                parts.len() == 3 && !self.is_reachable(parts[0])
            })
    }
}

impl Gate for GravityGate {
    fn name(&self) -> &'static str {
        "gravity"
    }

    fn number(&self) -> u8 {
        2
    }

    fn evaluate(&self, ctx: &GateContext<'_>) -> Result<Option<RoutingDecision>, RoutingError> {
        if let Some(source) = ctx
            .sources
            .iter()
            .find(|s| s.meta_str("format").as_deref() == Some("internal"))
        {
            return Ok(Some(
                RoutingDecision::cloud(RoutingReason::InternalSource).with_details(&source.name),
            ));
        }

        if let Some(source) = self.foreign_source(ctx.sources) {
            let database = source.database.as_deref().unwrap_or_default();
            return Ok(Some(
                RoutingDecision::cloud(RoutingReason::CrossDatabase)
                    .with_details(format!("Source '{}' in database '{}'", source.name, database)),
            ));
        }

        if let Some(relation) = self.foreign_relation(ctx.sql) {
            return Ok(Some(
                RoutingDecision::cloud(RoutingReason::CrossDatabase)
                    .with_details(format!("Relation {}", relation)),
            ));
        }

        Ok(None)
    }
}
