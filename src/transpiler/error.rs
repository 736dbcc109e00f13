//! Error types for dialect transpilation

use thiserror::Error;

/// Maximum number of characters of offending SQL carried in an error.
pub const SNIPPET_LIMIT: usize = 100;

/// Errors raised while rewriting warehouse SQL for the local engine.
///
/// Both parse failures and unsupported constructs mean the same thing to a
/// caller: the model cannot run locally and falls back to the cloud venue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranspilationError {
    /// The SQL text could not be parsed in the source dialect
    #[error("Cannot parse SQL '{snippet}': {cause}")]
    Parse { snippet: String, cause: String },

    /// The SQL parsed, but a construct has no local-dialect rewrite
    #[error("No local rewrite for {construct} in '{snippet}'")]
    UnsupportedConstruct { snippet: String, construct: String },

    /// The configured source dialect is not known to the parser
    #[error("Unknown source dialect '{0}'")]
    UnknownDialect(String),
}

impl TranspilationError {
    pub fn parse(sql: &str, cause: impl std::fmt::Display) -> Self {
        Self::Parse {
            snippet: truncate_snippet(sql),
            cause: cause.to_string(),
        }
    }

    pub fn unsupported(sql: &str, construct: impl Into<String>) -> Self {
        Self::UnsupportedConstruct {
            snippet: truncate_snippet(sql),
            construct: construct.into(),
        }
    }

    /// The truncated SQL fragment this error refers to, if any.
    pub fn snippet(&self) -> Option<&str> {
        match self {
            Self::Parse { snippet, .. } | Self::UnsupportedConstruct { snippet, .. } => {
                Some(snippet)
            }
            Self::UnknownDialect(_) => None,
        }
    }
}

/// Collapse whitespace and cut `sql` to [`SNIPPET_LIMIT`] characters.
pub fn truncate_snippet(sql: &str) -> String {
    let flat = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > SNIPPET_LIMIT {
        let mut cut: String = flat.chars().take(SNIPPET_LIMIT).collect();
        cut.push_str("...");
        cut
    } else {
        flat
    }
}
