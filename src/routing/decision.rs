//! Routing decision types
//!
//! Final output from the gate chain or the heuristic router.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a model executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Venue {
    /// Embedded local engine (free)
    Local,
    /// Remote warehouse (paid)
    Cloud,
}

impl Venue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::Local => "LOCAL",
            Venue::Cloud => "CLOUD",
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Venue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Venue::Local),
            "cloud" => Ok(Venue::Cloud),
            _ => Err(format!("Invalid venue: {}", s)),
        }
    }
}

/// Why a venue was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingReason {
    UserOverride,
    InternalSource,
    CrossDatabase,
    Untranspilable,
    ToxicTypes,
    CrashHistory,
    HighComplexity,
    LargeVolume,
    VolumeExceedsLimit,
    DefaultLocal,
    // Heuristic router reasons
    ExternalSource,
    CloudFunction,
    CloudDependency,
    PreviousFailure,
    AutoLocal,
}

impl RoutingReason {
    /// Stable identifier used in logs, metrics and JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserOverride => "USER_OVERRIDE",
            Self::InternalSource => "INTERNAL_SOURCE",
            Self::CrossDatabase => "CROSS_DATABASE",
            Self::Untranspilable => "UNTRANSPILABLE",
            Self::ToxicTypes => "TOXIC_TYPES",
            Self::CrashHistory => "CRASH_HISTORY",
            Self::HighComplexity => "HIGH_COMPLEXITY",
            Self::LargeVolume => "LARGE_VOLUME",
            Self::VolumeExceedsLimit => "VOLUME_EXCEEDS_LIMIT",
            Self::DefaultLocal => "DEFAULT_LOCAL",
            Self::ExternalSource => "EXTERNAL_SOURCE",
            Self::CloudFunction => "CLOUD_FUNCTION",
            Self::CloudDependency => "CLOUD_DEPENDENCY",
            Self::PreviousFailure => "PREVIOUS_FAILURE",
            Self::AutoLocal => "AUTO_LOCAL",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::UserOverride => "User configured route_override",
            Self::InternalSource => "Uses internal/proprietary sources",
            Self::CrossDatabase => "Reads from a database the local engine cannot reach",
            Self::Untranspilable => "SQL contains untranspilable syntax",
            Self::ToxicTypes => "Contains incompatible data types",
            Self::CrashHistory => "Previously crashed local execution",
            Self::HighComplexity => "Historical runtime exceeds threshold",
            Self::LargeVolume => "Data volume exceeds local threshold",
            Self::VolumeExceedsLimit => "Estimated input volume exceeds local threshold",
            Self::DefaultLocal => "Passed all gates, running locally",
            Self::ExternalSource => "External data source detected",
            Self::CloudFunction => "Cloud-only SQL function",
            Self::CloudDependency => "Upstream dependency requires cloud",
            Self::PreviousFailure => "Previously failed on local execution",
            Self::AutoLocal => "Automatic routing (free compute)",
        }
    }
}

impl fmt::Display for RoutingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable result of one routing call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub venue: Venue,
    pub reason: RoutingReason,
    /// Free-text diagnostic
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Ordinal of the gate that fired, `None` for defaults and heuristics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<u8>,
    /// In `[0, 1]`
    pub confidence: f64,
}

impl RoutingDecision {
    pub fn new(venue: Venue, reason: RoutingReason) -> Self {
        Self {
            venue,
            reason,
            details: None,
            gate: None,
            confidence: 1.0,
        }
    }

    pub fn cloud(reason: RoutingReason) -> Self {
        Self::new(Venue::Cloud, reason)
    }

    pub fn local(reason: RoutingReason) -> Self {
        Self::new(Venue::Local, reason)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_gate(mut self, gate: u8) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Clamped into `[0, 1]`.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn is_local(&self) -> bool {
        self.venue == Venue::Local
    }
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - ", self.venue)?;
        if let Some(gate) = self.gate {
            write!(f, "Gate {}: ", gate)?;
        }
        f.write_str(self.reason.description())?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}
