//! Gate 6: Physics (data volume)

use super::{Gate, GateContext};
use crate::routing::decision::{RoutingDecision, RoutingReason};
use crate::routing::error::RoutingError;
use crate::routing::providers::VolumeEstimator;
use std::sync::Arc;

/// Fires when the declared size estimate, or failing that the estimator's
/// catalog scan, exceeds the local ceiling.
pub struct PhysicsGate {
    estimator: Option<Arc<dyn VolumeEstimator>>,
    max_local_size_gb: f64,
}

impl PhysicsGate {
    pub fn new(estimator: Option<Arc<dyn VolumeEstimator>>, max_local_size_gb: f64) -> Self {
        Self {
            estimator,
            max_local_size_gb,
        }
    }
}

impl Gate for PhysicsGate {
    fn name(&self) -> &'static str {
        "physics"
    }

    fn number(&self) -> u8 {
        6
    }

    fn evaluate(&self, ctx: &GateContext<'_>) -> Result<Option<RoutingDecision>, RoutingError> {
        if let Some(declared) = ctx.model.config.estimated_size_gb {
            if !declared.is_finite() || declared < 0.0 {
                return Err(RoutingError::InvalidEstimate {
                    model: ctx.model.name.clone(),
                    value: declared,
                });
            }
            if declared > self.max_local_size_gb {
                return Ok(Some(
                    RoutingDecision::cloud(RoutingReason::LargeVolume).with_details(format!(
                        "Estimated: {:.1}GB > {}GB",
                        declared, self.max_local_size_gb
                    )),
                ));
            }
        }

        let scanned = self
            .estimator
            .as_ref()
            .and_then(|estimator| estimator.estimate_input_volume(ctx.model));
        if let Some(gb) = scanned {
            if gb > self.max_local_size_gb {
                return Ok(Some(
                    RoutingDecision::cloud(RoutingReason::VolumeExceedsLimit).with_details(
                        format!("Catalog scan: {:.1}GB > {}GB", gb, self.max_local_size_gb),
                    ),
                ));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::model::{ModelConfig, ModelDescriptor};

    struct Fixed(f64);

    impl VolumeEstimator for Fixed {
        fn estimate_input_volume(&self, _: &ModelDescriptor) -> Option<f64> {
            Some(self.0)
        }
    }

    fn with_estimate(gb: f64) -> ModelDescriptor {
        ModelDescriptor::new("m").with_config(ModelConfig {
            estimated_size_gb: Some(gb),
            ..Default::default()
        })
    }

    fn run(gate: &PhysicsGate, model: &ModelDescriptor) -> Result<Option<RoutingDecision>, RoutingError> {
        gate.evaluate(&GateContext {
            model,
            sql: "SELECT 1",
            sources: &[],
        })
    }

    #[test]
    fn test_declared_estimate_fires() {
        let gate = PhysicsGate::new(None, 5.0);
        let decision = run(&gate, &with_estimate(12.0)).unwrap().unwrap();
        assert_eq!(decision.reason, RoutingReason::LargeVolume);
        assert_eq!(decision.details.as_deref(), Some("Estimated: 12.0GB > 5GB"));
    }

    #[test]
    fn test_estimator_fires() {
        let gate = PhysicsGate::new(Some(Arc::new(Fixed(7.3))), 5.0);
        let decision = run(&gate, &ModelDescriptor::new("m")).unwrap().unwrap();
        assert_eq!(decision.reason, RoutingReason::VolumeExceedsLimit);
        assert_eq!(decision.details.as_deref(), Some("Catalog scan: 7.3GB > 5GB"));
    }

    #[test]
    fn test_small_inputs_pass() {
        let gate = PhysicsGate::new(Some(Arc::new(Fixed(1.0))), 5.0);
        assert!(run(&gate, &with_estimate(2.0)).unwrap().is_none());
        assert!(run(&PhysicsGate::new(None, 5.0), &ModelDescriptor::new("m"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_negative_estimate_is_an_error() {
        let gate = PhysicsGate::new(None, 5.0);
        assert!(matches!(
            run(&gate, &with_estimate(-1.0)),
            Err(RoutingError::InvalidEstimate { .. })
        ));
        assert!(run(&gate, &with_estimate(f64::NAN)).is_err());
    }
}
