//! Routing visibility hook
//!
//! Observers are fire-and-forget: an observer error is logged and never
//! changes the decision.

use super::decision::RoutingDecision;
use super::model::ModelDescriptor;
use std::sync::Mutex;

/// Receives every decision a policy makes.
pub trait RoutingObserver: Send + Sync {
    fn on_decision(&self, model: &ModelDescriptor, decision: &RoutingDecision)
        -> Result<(), String>;
}

impl<T: RoutingObserver + ?Sized> RoutingObserver for std::sync::Arc<T> {
    fn on_decision(
        &self,
        model: &ModelDescriptor,
        decision: &RoutingDecision,
    ) -> Result<(), String> {
        (**self).on_decision(model, decision)
    }
}

/// Logs each decision at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RoutingObserver for TracingObserver {
    fn on_decision(
        &self,
        model: &ModelDescriptor,
        decision: &RoutingDecision,
    ) -> Result<(), String> {
        tracing::info!(
            model = %model.name,
            unique_id = %model.unique_id,
            venue = %decision.venue,
            reason = decision.reason.as_str(),
            gate = decision.gate,
            details = decision.details.as_deref().unwrap_or(""),
            confidence = decision.confidence,
            "Routing decision"
        );
        Ok(())
    }
}

/// Keeps every decision in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    decisions: Mutex<Vec<(String, RoutingDecision)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(unique_id, decision)` pairs seen so far.
    pub fn decisions(&self) -> Vec<(String, RoutingDecision)> {
        self.decisions
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

impl RoutingObserver for RecordingObserver {
    fn on_decision(
        &self,
        model: &ModelDescriptor,
        decision: &RoutingDecision,
    ) -> Result<(), String> {
        self.decisions
            .lock()
            .map_err(|_| "recording observer lock poisoned".to_string())?
            .push((model.unique_id.clone(), decision.clone()));
        Ok(())
    }
}

/// Deliver `decision` to every observer, logging failures.
pub(crate) fn notify(
    observers: &[Box<dyn RoutingObserver>],
    model: &ModelDescriptor,
    decision: &RoutingDecision,
) {
    for observer in observers {
        if let Err(e) = observer.on_decision(model, decision) {
            tracing::warn!(model = %model.name, error = %e, "Routing observer failed");
        }
    }
}
