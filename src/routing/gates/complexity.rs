//! Gate 5: Complexity (historical telemetry)

use super::{Gate, GateContext};
use crate::routing::decision::{RoutingDecision, RoutingReason};
use crate::routing::error::RoutingError;
use crate::routing::providers::StatsProvider;
use std::sync::Arc;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Fires when past warehouse runs were too slow or spilled too much.
/// No stats means no opinion.
pub struct ComplexityGate {
    stats: Option<Arc<dyn StatsProvider>>,
    max_local_seconds: f64,
    max_spill_bytes: u64,
}

impl ComplexityGate {
    pub fn new(
        stats: Option<Arc<dyn StatsProvider>>,
        max_local_seconds: f64,
        max_spill_bytes: u64,
    ) -> Self {
        Self {
            stats,
            max_local_seconds,
            max_spill_bytes,
        }
    }
}

impl Gate for ComplexityGate {
    fn name(&self) -> &'static str {
        "complexity"
    }

    fn number(&self) -> u8 {
        5
    }

    fn evaluate(&self, ctx: &GateContext<'_>) -> Result<Option<RoutingDecision>, RoutingError> {
        let Some(stats) = self
            .stats
            .as_ref()
            .and_then(|provider| provider.model_stats(&ctx.model.name))
        else {
            return Ok(None);
        };

        if stats.avg_seconds > self.max_local_seconds {
            return Ok(Some(
                RoutingDecision::cloud(RoutingReason::HighComplexity)
                    .with_details(format!("Avg runtime: {:.1}m", stats.avg_seconds / 60.0)),
            ));
        }

        if stats.avg_spill_bytes > self.max_spill_bytes as f64 {
            return Ok(Some(
                RoutingDecision::cloud(RoutingReason::HighComplexity).with_details(format!(
                    "Avg spill: {:.1}GB",
                    stats.avg_spill_bytes / BYTES_PER_GB
                )),
            ));
        }

        Ok(None)
    }
}
