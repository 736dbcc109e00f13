//! Gate chain
//!
//! Six ordered gates decide a model's venue. Each gate either fires a
//! decision or passes (`Ok(None)`); the first gate to fire wins and the
//! default is LOCAL. A gate that errors is logged and treated as passing.
//!
//! Order: Intent → Gravity → Capability → Stability → Complexity → Physics

pub mod capability;
pub mod complexity;
pub mod gravity;
pub mod intent;
pub mod physics;
pub mod stability;

pub use capability::CapabilityGate;
pub use complexity::ComplexityGate;
pub use gravity::GravityGate;
pub use intent::IntentGate;
pub use physics::PhysicsGate;
pub use stability::StabilityGate;

use super::decision::{RoutingDecision, RoutingReason};
use super::error::RoutingError;
use super::model::{ModelDescriptor, SourceDescriptor};
use super::namespace::CatalogNamespaces;
use super::observer::{notify, RoutingObserver, TracingObserver};
use super::providers::{LocalTableCache, StatsProvider, VolumeEstimator};
use super::RoutingPolicy;
use crate::config::RoutingConfig;
use crate::stability::StabilityLedger;
use crate::transpiler::Transpiler;
use std::sync::Arc;
use std::time::Instant;

/// Everything a gate may look at.
#[derive(Debug, Clone, Copy)]
pub struct GateContext<'a> {
    pub model: &'a ModelDescriptor,
    pub sql: &'a str,
    pub sources: &'a [SourceDescriptor],
}

/// One step of the chain.
pub trait Gate: Send + Sync {
    /// Identifier for logs and metrics.
    fn name(&self) -> &'static str;

    /// Ordinal reported in the decision (1-based).
    fn number(&self) -> u8;

    /// `Ok(Some(_))` fires, `Ok(None)` passes to the next gate.
    fn evaluate(&self, ctx: &GateContext<'_>) -> Result<Option<RoutingDecision>, RoutingError>;
}

/// The authoritative routing policy: an ordered gate chain.
pub struct GateEngine {
    gates: Vec<Box<dyn Gate>>,
    observers: Vec<Box<dyn RoutingObserver>>,
}

impl GateEngine {
    /// Chain over custom gates, evaluated in the order given.
    pub fn from_gates(gates: Vec<Box<dyn Gate>>) -> Self {
        Self {
            gates,
            observers: vec![Box::new(TracingObserver)],
        }
    }

    pub fn builder(config: RoutingConfig, ledger: Arc<StabilityLedger>) -> GateEngineBuilder {
        GateEngineBuilder {
            config,
            ledger,
            stats: None,
            volume: None,
            local_cache: None,
            observers: vec![Box::new(TracingObserver)],
        }
    }

    /// Add an observer that sees every decision.
    pub fn with_observer(mut self, observer: Box<dyn RoutingObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Remove all observers, including the default tracing one.
    pub fn without_observers(mut self) -> Self {
        self.observers.clear();
        self
    }

    /// Gate names in evaluation order.
    pub fn gate_names(&self) -> Vec<&'static str> {
        self.gates.iter().map(|g| g.name()).collect()
    }

    /// Run the chain. Never fails: gate errors fall through.
    pub fn evaluate(&self, ctx: &GateContext<'_>) -> RoutingDecision {
        for gate in &self.gates {
            let started = Instant::now();
            let outcome = gate.evaluate(ctx);
            let elapsed = started.elapsed();

            metrics::histogram!(
                "floe_gate_duration_seconds",
                "gate" => gate.name(),
            )
            .record(elapsed.as_secs_f64());

            match outcome {
                Ok(Some(mut decision)) => {
                    decision.gate = Some(gate.number());
                    tracing::trace!(
                        model = %ctx.model.name,
                        gate = gate.name(),
                        elapsed_us = elapsed.as_micros() as u64,
                        reason = decision.reason.as_str(),
                        "Gate fired"
                    );
                    return decision;
                }
                Ok(None) => {
                    tracing::trace!(
                        model = %ctx.model.name,
                        gate = gate.name(),
                        elapsed_us = elapsed.as_micros() as u64,
                        "Gate passed"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        model = %ctx.model.name,
                        gate = gate.name(),
                        error = %e,
                        "Gate failed, treating as passed"
                    );
                }
            }
        }

        RoutingDecision::local(RoutingReason::DefaultLocal)
    }

    /// Evaluate every gate, without stopping at the first that fires, and
    /// render one line per gate plus the resulting decision.
    pub fn explain(
        &self,
        model: &ModelDescriptor,
        sql: &str,
        sources: Option<&[SourceDescriptor]>,
    ) -> String {
        let ctx = GateContext {
            model,
            sql,
            sources: sources.unwrap_or(&model.sources),
        };

        let mut lines = vec![
            format!("Model: {}", model.name),
            format!("Decision: {}", self.evaluate(&ctx)),
            String::new(),
            "Gates:".to_string(),
        ];
        for gate in &self.gates {
            let outcome = match gate.evaluate(&ctx) {
                Ok(Some(decision)) => format!(
                    "✗ {} {}",
                    decision.venue,
                    decision.details.as_deref().unwrap_or(decision.reason.description())
                ),
                Ok(None) => "✓ passed".to_string(),
                Err(e) => format!("? error: {}", e),
            };
            lines.push(format!("  {}. {:<11} {}", gate.number(), gate.name(), outcome));
        }
        lines.join("\n")
    }
}

impl RoutingPolicy for GateEngine {
    fn name(&self) -> &'static str {
        "gates"
    }

    fn decide(
        &self,
        model: &ModelDescriptor,
        sql: &str,
        sources: Option<&[SourceDescriptor]>,
    ) -> RoutingDecision {
        let ctx = GateContext {
            model,
            sql,
            sources: sources.unwrap_or(&model.sources),
        };
        let decision = self.evaluate(&ctx);

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

/// Assembles the standard six-gate chain.
pub struct GateEngineBuilder {
    config: RoutingConfig,
    ledger: Arc<StabilityLedger>,
    stats: Option<Arc<dyn StatsProvider>>,
    volume: Option<Arc<dyn VolumeEstimator>>,
    local_cache: Option<Arc<dyn LocalTableCache>>,
    observers: Vec<Box<dyn RoutingObserver>>,
}

impl GateEngineBuilder {
    pub fn stats(mut self, stats: Arc<dyn StatsProvider>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn volume_estimator(mut self, estimator: Arc<dyn VolumeEstimator>) -> Self {
        self.volume = Some(estimator);
        self
    }

    pub fn local_cache(mut self, cache: Arc<dyn LocalTableCache>) -> Self {
        self.local_cache = Some(cache);
        self
    }

    pub fn observer(mut self, observer: Box<dyn RoutingObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Drop the default tracing observer.
    pub fn quiet(mut self) -> Self {
        self.observers.clear();
        self
    }

    /// Fails if the source dialect is unknown or a namespace glob is invalid.
    pub fn build(self) -> Result<GateEngine, RoutingError> {
        let transpiler = Transpiler::new(&self.config.source_dialect).map_err(|e| {
            RoutingError::Gate {
                gate: "capability",
                message: e.to_string(),
            }
        })?;
        let namespaces =
            CatalogNamespaces::new(&self.config.catalog_namespaces).map_err(|e| {
                RoutingError::Gate {
                    gate: "gravity",
                    message: e.to_string(),
                }
            })?;

        let gates: Vec<Box<dyn Gate>> = vec![
            Box::new(IntentGate),
            Box::new(GravityGate::new(
                namespaces,
                self.config.local_databases.clone(),
                transpiler.clone(),
                self.local_cache,
            )),
            Box::new(CapabilityGate::new(transpiler)),
            Box::new(StabilityGate::new(self.ledger)),
            Box::new(ComplexityGate::new(
                self.stats,
                self.config.max_local_seconds,
                self.config.max_spill_bytes,
            )),
            Box::new(PhysicsGate::new(self.volume, self.config.max_local_size_gb)),
        ];

        Ok(GateEngine {
            gates,
            observers: self.observers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::decision::Venue;

    struct Fixed {
        name: &'static str,
        number: u8,
        outcome: fn() -> Result<Option<RoutingDecision>, RoutingError>,
    }

    impl Gate for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }
        fn number(&self) -> u8 {
            self.number
        }
        fn evaluate(&self, _: &GateContext<'_>) -> Result<Option<RoutingDecision>, RoutingError> {
            (self.outcome)()
        }
    }

    fn pass() -> Result<Option<RoutingDecision>, RoutingError> {
        Ok(None)
    }

    fn fire() -> Result<Option<RoutingDecision>, RoutingError> {
        Ok(Some(RoutingDecision::cloud(RoutingReason::HighComplexity)))
    }

    fn fail() -> Result<Option<RoutingDecision>, RoutingError> {
        Err(RoutingError::Gate {
            gate: "broken",
            message: "malformed config".to_string(),
        })
    }

    fn ctx(model: &ModelDescriptor) -> GateContext<'_> {
        GateContext {
            model,
            sql: "SELECT 1",
            sources: &[],
        }
    }

    #[test]
    fn test_empty_chain_defaults_local() {
        let engine = GateEngine::from_gates(vec![]);
        let model = ModelDescriptor::new("m");
        let decision = engine.evaluate(&ctx(&model));
        assert_eq!(decision.venue, Venue::Local);
        assert_eq!(decision.reason, RoutingReason::DefaultLocal);
        assert_eq!(decision.gate, None);
        assert_eq!(decision.confidence, 1.0);
    }

    #[test]
    fn test_first_firing_gate_wins_and_is_stamped() {
        let engine = GateEngine::from_gates(vec![
            Box::new(Fixed { name: "a", number: 1, outcome: pass }),
            Box::new(Fixed { name: "b", number: 2, outcome: fire }),
            Box::new(Fixed { name: "c", number: 3, outcome: fail }),
        ]);
        let model = ModelDescriptor::new("m");
        let decision = engine.evaluate(&ctx(&model));
        assert_eq!(decision.gate, Some(2));
        assert_eq!(decision.reason, RoutingReason::HighComplexity);
    }

    #[test]
    fn test_failing_gate_falls_through() {
        let engine = GateEngine::from_gates(vec![
            Box::new(Fixed { name: "broken", number: 1, outcome: fail }),
            Box::new(Fixed { name: "b", number: 2, outcome: fire }),
        ]);
        let model = ModelDescriptor::new("m");
        assert_eq!(engine.evaluate(&ctx(&model)).gate, Some(2));
    }

    #[test]
    fn test_explain_lists_every_gate() {
        let engine = GateEngine::from_gates(vec![
            Box::new(Fixed { name: "a", number: 1, outcome: pass }),
            Box::new(Fixed { name: "b", number: 2, outcome: fire }),
            Box::new(Fixed { name: "c", number: 3, outcome: fail }),
        ]);
        let model = ModelDescriptor::new("m");
        let text = engine.explain(&model, "SELECT 1", None);
        assert!(text.contains("1. a"));
        assert!(text.contains("2. b"));
        assert!(text.contains("3. c"));
        assert!(text.contains("? error"));
        assert!(text.contains("Decision: CLOUD - Gate 2"));
    }

    #[test]
    fn test_decide_uses_model_sources_by_default() {
        struct SourceCount;
        impl Gate for SourceCount {
            fn name(&self) -> &'static str {
                "count"
            }
            fn number(&self) -> u8 {
                9
            }
            fn evaluate(
                &self,
                ctx: &GateContext<'_>,
            ) -> Result<Option<RoutingDecision>, RoutingError> {
                Ok(Some(
                    RoutingDecision::cloud(RoutingReason::InternalSource)
                        .with_details(ctx.sources.len().to_string()),
                ))
            }
        }

        let engine = GateEngine::from_gates(vec![Box::new(SourceCount)]).without_observers();
        let model = ModelDescriptor::new("m").with_source(SourceDescriptor::new("s"));
        assert_eq!(engine.decide(&model, "", None).details.as_deref(), Some("1"));
        assert_eq!(engine.decide(&model, "", Some(&[])).details.as_deref(), Some("0"));
    }
}
