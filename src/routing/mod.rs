//! Venue routing for warehouse models
//!
//! Decides, per model, whether to execute on the local engine or the cloud
//! warehouse. Two policies implement [`RoutingPolicy`]: the authoritative
//! [`GateEngine`] and the lighter [`HeuristicRouter`]. Both always return a
//! decision; internal failures degrade to "did not fire", never to an error.

pub mod decision;
pub mod error;
pub mod gates;
pub mod heuristic;
pub mod model;
pub mod namespace;
pub mod observer;
pub mod providers;
pub mod strategies;

pub use decision::{RoutingDecision, RoutingReason, Venue};
pub use error::RoutingError;
pub use gates::{Gate, GateContext, GateEngine, GateEngineBuilder};
pub use heuristic::{HeuristicRouter, RoutingHistory};
pub use model::{ModelConfig, ModelDescriptor, SourceDescriptor};
pub use namespace::CatalogNamespaces;
pub use observer::{RecordingObserver, RoutingObserver, TracingObserver};
pub use providers::{
    CatalogScanner, HistoricalStatsCache, LocalTableCache, ModelStats, StatsProvider,
    TableSizeSource, TableStats, VolumeEstimator,
};
pub use strategies::PolicyKind;

/// A routing policy: model + compiled SQL in, venue decision out.
pub trait RoutingPolicy: Send + Sync {
    /// Identifier for logs and CLI output.
    fn name(&self) -> &'static str;

    /// Decide where `model` runs. `sources` overrides `model.sources` when given.
    fn decide(
        &self,
        model: &ModelDescriptor,
        sql: &str,
        sources: Option<&[SourceDescriptor]>,
    ) -> RoutingDecision;
}
