//! Gate 1: Intent (user override)
//!
//! The only gate that can force LOCAL against later gates.

use super::{Gate, GateContext};
use crate::routing::decision::{RoutingDecision, RoutingReason, Venue};
use crate::routing::error::RoutingError;

pub struct IntentGate;

impl Gate for IntentGate {
    fn name(&self) -> &'static str {
        "intent"
    }

    fn number(&self) -> u8 {
        1
    }

    fn evaluate(&self, ctx: &GateContext<'_>) -> Result<Option<RoutingDecision>, RoutingError> {
        let Some(raw) = ctx.model.config.route_override.as_deref() else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let venue: Venue = raw.parse().map_err(|_| RoutingError::InvalidOverride {
            model: ctx.model.name.clone(),
            value: raw.to_string(),
        })?;

        Ok(Some(
            RoutingDecision::new(venue, RoutingReason::UserOverride)
                .with_details(format!("route_override='{}'", venue.as_str().to_lowercase())),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::model::ModelDescriptor;

    fn run(model: &ModelDescriptor) -> Result<Option<RoutingDecision>, RoutingError> {
        IntentGate.evaluate(&GateContext {
            model,
            sql: "SELECT 1",
            sources: &[],
        })
    }

    #[test]
    fn test_no_override_passes() {
        assert!(run(&ModelDescriptor::new("m")).unwrap().is_none());
    }

    #[test]
    fn test_override_is_case_insensitive() {
        let decision = run(&ModelDescriptor::new("m").with_override("LOCAL"))
            .unwrap()
            .unwrap();
        assert_eq!(decision.venue, Venue::Local);
        assert_eq!(decision.details.as_deref(), Some("route_override='local'"));
        assert_eq!(decision.confidence, 1.0);
    }

    #[test]
    fn test_unknown_override_is_an_error() {
        let err = run(&ModelDescriptor::new("m").with_override("gpu")).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidOverride { ref value, .. } if value == "gpu"));
    }
}
