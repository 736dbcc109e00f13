//! Gate 4: Stability (crash history)
//!
//! Looking at the ledger converts a leftover running marker into a durable
//! crash, so a process that died mid-run is detected exactly once.

use super::{Gate, GateContext};
use crate::routing::decision::{RoutingDecision, RoutingReason};
use crate::routing::error::RoutingError;
use crate::stability::StabilityLedger;
use std::sync::Arc;

pub struct StabilityGate {
    ledger: Arc<StabilityLedger>,
}

impl StabilityGate {
    pub fn new(ledger: Arc<StabilityLedger>) -> Self {
        Self { ledger }
    }
}

impl Gate for StabilityGate {
    fn name(&self) -> &'static str {
        "stability"
    }

    fn number(&self) -> u8 {
        4
    }

    fn evaluate(&self, ctx: &GateContext<'_>) -> Result<Option<RoutingDecision>, RoutingError> {
        let Some(summary) = self.ledger.detect_crash(&ctx.model.unique_id)? else {
            return Ok(None);
        };

        let mut details = if summary.interrupted {
            "Previous run didn't complete".to_string()
        } else {
            match summary.last_crash {
                Some(at) => format!("Last crash: {}", at.to_rfc3339()),
                None => "Last crash: unknown".to_string(),
            }
        };
        if summary.count >= self.ledger.max_crash_count() {
            details.push_str(&format!("; blacklisted after {} crashes", summary.count));
        }

        Ok(Some(
            RoutingDecision::cloud(RoutingReason::CrashHistory).with_details(details),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::model::ModelDescriptor;
    use tempfile::tempdir;

    fn run(ledger: &Arc<StabilityLedger>, model: &ModelDescriptor) -> Option<RoutingDecision> {
        StabilityGate::new(ledger.clone())
            .evaluate(&GateContext {
                model,
                sql: "SELECT 1",
                sources: &[],
            })
            .unwrap()
    }

    #[test]
    fn test_clean_model_passes() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(StabilityLedger::open(dir.path(), 3));
        assert!(run(&ledger, &ModelDescriptor::new("orders")).is_none());
    }

    #[test]
    fn test_leftover_running_marker_fires_and_records() {
        let dir = tempdir().unwrap();
        let model = ModelDescriptor::new("orders");
        StabilityLedger::open(dir.path(), 3)
            .mark_running(&model.unique_id)
            .unwrap();

        let ledger = Arc::new(StabilityLedger::open(dir.path(), 3));
        let decision = run(&ledger, &model).unwrap();
        assert_eq!(decision.reason, RoutingReason::CrashHistory);
        assert_eq!(decision.details.as_deref(), Some("Previous run didn't complete"));
        assert_eq!(ledger.crash_count(&model.unique_id), 1);

        let again = run(&ledger, &model).unwrap();
        assert!(again.details.unwrap().starts_with("Last crash: "));
        assert_eq!(ledger.crash_count(&model.unique_id), 1);
    }

    #[test]
    fn test_blacklist_note_at_threshold() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(StabilityLedger::open(dir.path(), 2));
        let model = ModelDescriptor::new("orders");
        ledger.mark_crash(&model.unique_id, Some("oom")).unwrap();
        assert!(!run(&ledger, &model).unwrap().details.unwrap().contains("blacklisted"));

        ledger.mark_crash(&model.unique_id, Some("oom")).unwrap();
        assert!(run(&ledger, &model)
            .unwrap()
            .details
            .unwrap()
            .ends_with("; blacklisted after 2 crashes"));
    }
}
