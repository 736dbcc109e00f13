//! Best-effort scans over SQL that never fail the caller
//!
//! The blacklist scan works statement by statement: one malformed statement
//! must not hide a cloud-only call in another, and a statement that fails to
//! parse still gets a token-level scan.

use sqlparser::ast::{visit_relations, Expr, ObjectName, Statement, TableFactor, Visit, Visitor};
use sqlparser::dialect::Dialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};
use std::ops::ControlFlow;

/// Qualified-name fragments of calls that only the cloud venue can execute.
pub const CLOUD_ONLY_CALLS: &[&str] = &[
    // ML / AI inference
    "SNOWFLAKE.CORTEX",
    "SNOWFLAKE.ML",
    "ML.PREDICT",
    "ML.EXPLAIN",
    "ML.EVALUATE",
    "ML.TRAINING_INFO",
    // Proprietary XML / semi-structured accessors
    "PARSE_XML",
    "XMLGET",
    // Administrative
    "GET_DDL",
    "SYSTEM$",
];

/// True if the qualified call name contains any [`CLOUD_ONLY_CALLS`] fragment.
pub fn is_cloud_only_call(name: &str) -> bool {
    let upper = name.to_uppercase();
    CLOUD_ONLY_CALLS.iter().any(|fragment| upper.contains(fragment))
}

/// Cloud-only call names found in `sql`, deduplicated in first-seen order.
pub fn blacklisted_calls(dialect: &dyn Dialect, sql: &str) -> Vec<String> {
    let tokens = match Tokenizer::new(dialect, sql).tokenize() {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::debug!(error = %e, "Blacklist scan skipped: SQL does not tokenize");
            return Vec::new();
        }
    };

    let mut found: Vec<String> = Vec::new();
    for chunk in split_statements(tokens) {
        let names = match Parser::new(dialect)
            .with_tokens(chunk.clone())
            .parse_statements()
        {
            Ok(statements) => calls_in_statements(&statements),
            Err(e) => {
                tracing::trace!(error = %e, "Statement does not parse, scanning tokens");
                calls_in_tokens(&chunk)
            }
        };
        for name in names.into_iter().filter(|n| is_cloud_only_call(n)) {
            if !found.contains(&name) {
                found.push(name);
            }
        }
    }
    found
}

/// Dotted names of every relation the SQL reads or writes. Empty on parse failure.
pub fn relations(dialect: &dyn Dialect, sql: &str) -> Vec<String> {
    let statements = match Parser::parse_sql(dialect, sql) {
        Ok(statements) => statements,
        Err(_) => return Vec::new(),
    };
    let mut names: Vec<String> = Vec::new();
    let _ = visit_relations(&statements, |relation| {
        let name = dotted(relation);
        if !names.contains(&name) {
            names.push(name);
        }
        ControlFlow::<()>::Continue(())
    });
    names
}

/// `sql` with every comment replaced by a space. Returns the input unchanged if it does
/// not tokenize.
pub fn strip_comments(dialect: &dyn Dialect, sql: &str) -> String {
    match Tokenizer::new(dialect, sql).tokenize() {
        Ok(tokens) => tokens
            .iter()
            .map(|t| match t {
                Token::Whitespace(
                    Whitespace::SingleLineComment { .. } | Whitespace::MultiLineComment(_),
                ) => " ".to_string(),
                other => other.to_string(),
            })
            .collect(),
        Err(_) => sql.to_string(),
    }
}

fn split_statements(tokens: Vec<Token>) -> Vec<Vec<Token>> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    for token in tokens {
        if token == Token::SemiColon {
            chunks.push(std::mem::take(&mut current));
        } else {
            current.push(token);
        }
    }
    chunks.push(current);
    chunks
        .into_iter()
        .filter(|chunk| chunk.iter().any(|t| !matches!(t, Token::Whitespace(_))))
        .collect()
}

fn calls_in_statements(statements: &[Statement]) -> Vec<String> {
    let mut collector = CallCollector::default();
    for statement in statements {
        let _ = statement.visit(&mut collector);
    }
    collector.names
}

/// Dotted words immediately followed by `(`.
fn calls_in_tokens(tokens: &[Token]) -> Vec<String> {
    let significant: Vec<&Token> = tokens
        .iter()
        .filter(|t| !matches!(t, Token::Whitespace(_)))
        .collect();

    let mut names = Vec::new();
    let mut i = 0;
    while i < significant.len() {
        let Token::Word(first) = significant[i] else {
            i += 1;
            continue;
        };
        let mut parts = vec![first.value.clone()];
        let mut j = i + 1;
        while j + 1 < significant.len() {
            match (significant[j], significant[j + 1]) {
                (Token::Period, Token::Word(next)) => {
                    parts.push(next.value.clone());
                    j += 2;
                }
                _ => break,
            }
        }
        if matches!(significant.get(j), Some(Token::LParen)) {
            names.push(parts.join(".").to_uppercase());
        }
        i = j.max(i + 1);
    }
    names
}

#[derive(Default)]
struct CallCollector {
    names: Vec<String>,
}

impl CallCollector {
    fn note(&mut self, name: &ObjectName) {
        self.names.push(dotted(name).to_uppercase());
    }
}

impl Visitor for CallCollector {
    type Break = ();

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<()> {
        if let Expr::Function(func) = expr {
            self.note(&func.name);
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, factor: &TableFactor) -> ControlFlow<()> {
        match factor {
            TableFactor::Function { name, .. } => self.note(name),
            TableFactor::Table {
                name, args: Some(_), ..
            } => self.note(name),
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_statement(&mut self, statement: &Statement) -> ControlFlow<()> {
        if let Statement::Call(func) = statement {
            self.note(&func.name);
        }
        ControlFlow::Continue(())
    }
}

fn dotted(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|ident| ident.value.as_str())
        .collect::<Vec<_>>()
        .join(".")
}
