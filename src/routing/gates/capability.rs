//! Gate 3: Capability (syntax and types)

use super::{Gate, GateContext};
use crate::routing::decision::{RoutingDecision, RoutingReason};
use crate::routing::error::RoutingError;
use crate::transpiler::Transpiler;

/// Blacklisted names shown in the decision details.
const SHOWN_CALLS: usize = 3;

/// Fires on cloud-only calls, SQL the transpiler rejects, or declared
/// toxic column types.
pub struct CapabilityGate {
    transpiler: Transpiler,
}

impl CapabilityGate {
    pub fn new(transpiler: Transpiler) -> Self {
        Self { transpiler }
    }
}

impl Gate for CapabilityGate {
    fn name(&self) -> &'static str {
        "capability"
    }

    fn number(&self) -> u8 {
        3
    }

    fn evaluate(&self, ctx: &GateContext<'_>) -> Result<Option<RoutingDecision>, RoutingError> {
        let blacklisted = self.transpiler.detect_blacklisted_functions(ctx.sql);
        if !blacklisted.is_empty() {
            let shown: Vec<&str> = blacklisted
                .iter()
                .take(SHOWN_CALLS)
                .map(String::as_str)
                .collect();
            return Ok(Some(
                RoutingDecision::cloud(RoutingReason::Untranspilable)
                    .with_details(format!("Found: {}", shown.join(", "))),
            ));
        }

        if let Err(error) = self.transpiler.can_transpile(ctx.sql) {
            return Ok(Some(
                RoutingDecision::cloud(RoutingReason::Untranspilable).with_details(error),
            ));
        }

        let toxic = &ctx.model.config.toxic_types;
        if !toxic.is_empty() {
            return Ok(Some(
                RoutingDecision::cloud(RoutingReason::ToxicTypes)
                    .with_details(format!("Types: {}", toxic.join(", "))),
            ));
        }

        Ok(None)
    }
}
