//! Routing policy selection

use std::str::FromStr;

/// Which routing policy a caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyKind {
    /// Ordered six-gate chain (authoritative)
    #[default]
    Gates,

    /// Pattern matching over SQL text plus routing history
    Heuristic,
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gates" | "gate" => Ok(PolicyKind::Gates),
            "heuristic" => Ok(PolicyKind::Heuristic),
            _ => Err(format!("Unknown routing policy: {}", s)),
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyKind::Gates => write!(f, "gates"),
            PolicyKind::Heuristic => write!(f, "heuristic"),
        }
    }
}
