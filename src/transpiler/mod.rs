//! Dialect transpiler
//!
//! Parses warehouse SQL, runs the rewrite passes in [`passes::PIPELINE`] over
//! each statement and regenerates text the local engine accepts. Stateless
//! apart from a bounded set of failing snippets already logged.

mod error;
pub mod passes;
pub mod scan;

pub use error::{truncate_snippet, TranspilationError, SNIPPET_LIMIT};

use sqlparser::ast::Statement;
use sqlparser::dialect::{dialect_from_str, Dialect, GenericDialect};
use sqlparser::parser::Parser;
use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

/// Upper bound on remembered snippets before the set is reset.
const LOGGED_SNIPPET_CAPACITY: usize = 512;

static LOGGED_SNIPPETS: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

/// Rewrites SQL from a named source dialect into the local dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transpiler {
    source_dialect: String,
}

impl Transpiler {
    /// Create a transpiler for `source_dialect` (e.g. `snowflake`, `bigquery`).
    pub fn new(source_dialect: &str) -> Result<Self, TranspilationError> {
        let name = source_dialect.trim().to_lowercase();
        if dialect_from_str(&name).is_none() {
            return Err(TranspilationError::UnknownDialect(source_dialect.to_string()));
        }
        Ok(Self {
            source_dialect: name,
        })
    }

    pub fn source_dialect(&self) -> &str {
        &self.source_dialect
    }

    fn dialect(&self) -> Box<dyn Dialect> {
        dialect_from_str(&self.source_dialect).unwrap_or_else(|| Box::new(GenericDialect {}))
    }

    /// Parse `sql` into statements without rewriting.
    pub fn parse(&self, sql: &str) -> Result<Vec<Statement>, TranspilationError> {
        let dialect = self.dialect();
        Parser::parse_sql(dialect.as_ref(), sql).map_err(|e| TranspilationError::parse(sql, e))
    }

    /// Rewrite `sql` for the local engine.
    ///
    /// Empty input yields an empty string; multiple statements are joined
    /// with `;\n`. Running the output through again returns it unchanged.
    pub fn to_local_dialect(&self, sql: &str) -> Result<String, TranspilationError> {
        if sql.trim().is_empty() {
            return Ok(String::new());
        }

        let statements = self.parse(sql).inspect_err(|e| log_failure(e))?;
        let rewritten = statements
            .into_iter()
            .map(|statement| {
                passes::run_all(statement)
                    .map(|s| s.to_string())
                    .map_err(|construct| TranspilationError::unsupported(sql, construct))
            })
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|e| log_failure(e))?;

        Ok(rewritten.join(";\n"))
    }

    /// `Ok(())` if `sql` transpiles, otherwise the error message.
    pub fn can_transpile(&self, sql: &str) -> Result<(), String> {
        self.to_local_dialect(sql).map(|_| ()).map_err(|e| e.to_string())
    }

    /// Cloud-only calls in `sql`. Never fails; unparseable statements get a token scan.
    pub fn detect_blacklisted_functions(&self, sql: &str) -> Vec<String> {
        scan::blacklisted_calls(self.dialect().as_ref(), sql)
    }

    /// `sql` without comments, for pattern matching.
    pub fn strip_comments(&self, sql: &str) -> String {
        scan::strip_comments(self.dialect().as_ref(), sql)
    }

    /// Dotted names of relations referenced by `sql`. Empty on parse failure.
    pub fn referenced_relations(&self, sql: &str) -> Vec<String> {
        scan::relations(self.dialect().as_ref(), sql)
    }
}

impl Default for Transpiler {
    fn default() -> Self {
        Self {
            source_dialect: "snowflake".to_string(),
        }
    }
}

/// One-shot form of [`Transpiler::to_local_dialect`].
pub fn to_local_dialect(sql: &str, source_dialect: &str) -> Result<String, TranspilationError> {
    Transpiler::new(source_dialect)?.to_local_dialect(sql)
}

fn log_failure(error: &TranspilationError) {
    let Some(snippet) = error.snippet() else {
        return;
    };
    let logged = LOGGED_SNIPPETS.get_or_init(|| Mutex::new(HashSet::new()));
    let Ok(mut logged) = logged.lock() else {
        return;
    };
    if logged.len() >= LOGGED_SNIPPET_CAPACITY {
        logged.clear();
    }
    if logged.insert(snippet.to_string()) {
        tracing::debug!(error = %error, "Transpilation failed");
    }
}
