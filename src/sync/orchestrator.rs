//! Dependency-ordered sync of a batch of tables

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::SyncError;
use super::manager::SyncManager;
use super::result::SyncResult;
use crate::routing::Venue;

/// Outcome of [`SyncOrchestrator::sync_in_order`].
#[derive(Debug, Clone, Default)]
pub struct OrderedSyncReport {
    /// Results in execution order; the last one is the failure, if any
    pub results: Vec<SyncResult>,
    /// Tables never attempted because an upstream sync failed
    pub skipped: Vec<String>,
}

impl OrderedSyncReport {
    pub fn all_succeeded(&self) -> bool {
        self.skipped.is_empty() && self.results.iter().all(|r| r.success)
    }
}

/// Syncs local tables to the cloud so that upstream tables land first.
pub struct SyncOrchestrator {
    manager: Arc<SyncManager>,
}

impl SyncOrchestrator {
    pub fn new(manager: Arc<SyncManager>) -> Self {
        Self { manager }
    }

    /// Sync `tables` (schema, table) local to cloud.
    ///
    /// `graph` maps `schema.table` to the tables it depends on. Without a
    /// graph the given order is kept. Stops at the first failure.
    pub fn sync_in_order(
        &self,
        tables: &[(String, String)],
        graph: Option<&HashMap<String, Vec<String>>>,
    ) -> Result<OrderedSyncReport, SyncError> {
        let ids: Vec<String> = tables.iter().map(|(s, t)| format!("{}.{}", s, t)).collect();
        let order = match graph {
            Some(graph) => topological_order(&ids, graph),
            None => (0..ids.len()).collect(),
        };

        let mut report = OrderedSyncReport::default();
        for (position, &index) in order.iter().enumerate() {
            let (schema, table) = &tables[index];
            let result = self
                .manager
                .sync_table(schema, table, Venue::Local, Venue::Cloud)?;
            let failed = !result.success;
            report.results.push(result);

            if failed {
                report.skipped = order[position + 1..]
                    .iter()
                    .map(|&i| ids[i].clone())
                    .collect();
                warn!(
                    table = %ids[index],
                    skipped = report.skipped.len(),
                    "Sync failed, halting downstream syncs"
                );
                return Ok(report);
            }
        }

        info!(tables = report.results.len(), "Ordered sync complete");
        Ok(report)
    }
}

/// Kahn's algorithm over the listed tables. Dependencies outside the list are
/// ignored; nodes left on a cycle are appended in their original order.
pub fn topological_order(ids: &[String], graph: &HashMap<String, Vec<String>>) -> Vec<usize> {
    let position: HashMap<&str, usize> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; ids.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
    for (i, id) in ids.iter().enumerate() {
        let mut seen = HashSet::new();
        for upstream in graph.get(id).into_iter().flatten() {
            if let Some(&j) = position.get(upstream.as_str()) {
                if j != i && seen.insert(j) {
                    in_degree[i] += 1;
                    dependents[j].push(i);
                }
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..ids.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(ids.len());
    let mut placed = vec![false; ids.len()];
    while let Some(i) = ready.pop_front() {
        order.push(i);
        placed[i] = true;
        for &d in &dependents[i] {
            in_degree[d] -= 1;
            if in_degree[d] == 0 {
                ready.push_back(d);
            }
        }
    }

    order.extend((0..ids.len()).filter(|&i| !placed[i]));
    order
}
