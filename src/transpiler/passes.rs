//! AST rewrite passes
//!
//! Every pass takes an owned statement and hands back the rewritten statement,
//! or a description of the construct it could not rewrite. Passes only emit
//! names that no pass matches again, which keeps the pipeline idempotent.

use sqlparser::ast::{
    visit_expressions_mut, CastKind, DataType, ExactNumberInfo, Expr, Function, FunctionArg,
    FunctionArgExpr, FunctionArgumentClause, FunctionArgumentList, FunctionArguments, Ident,
    JsonPath, JsonPathElem, ObjectName, Statement, TableFactor, TimezoneInfo, Value, VisitMut,
    VisitorMut,
};
use std::ops::ControlFlow;

/// A single rewrite pass over one statement.
pub type Pass = fn(Statement) -> Result<Statement, String>;

/// Passes in execution order.
pub const PIPELINE: &[(&str, Pass)] = &[
    ("function_renames", rename_functions),
    ("conditionals", rewrite_conditionals),
    ("try_casts", rewrite_try_casts),
    ("semi_structured", rewrite_semi_structured),
    ("zero_if_null", rewrite_zero_if_null),
    ("lateral_flatten", rewrite_flatten),
    ("qualify", rewrite_qualify),
    ("date_functions", rewrite_date_functions),
];

/// Run every pass in [`PIPELINE`] over `statement`.
pub fn run_all(statement: Statement) -> Result<Statement, String> {
    PIPELINE.iter().try_fold(statement, |stmt, (name, pass)| {
        tracing::trace!(pass = name, "Running rewrite pass");
        pass(stmt)
    })
}

/// `LISTAGG` to `STRING_AGG`, `NVL`/`IFNULL` to `COALESCE`.
pub fn rename_functions(statement: Statement) -> Result<Statement, String> {
    rewrite_calls(statement, |func, name| match name {
        "LISTAGG" => {
            let mut renamed = with_name(func, "STRING_AGG");
            if !renamed.within_group.is_empty() {
                let order_by = std::mem::take(&mut renamed.within_group);
                match &mut renamed.args {
                    FunctionArguments::List(list) => {
                        list.clauses.push(FunctionArgumentClause::OrderBy(order_by))
                    }
                    _ => return Err("LISTAGG without arguments".to_string()),
                }
            }
            Ok(Some(Expr::Function(renamed)))
        }
        "NVL" | "IFNULL" => {
            let args = exact_args(func, name, 2)?;
            Ok(Some(coalesce(args)))
        }
        _ => Ok(None),
    })
}

/// `IFF(c, a, b)` and `NVL2(x, a, b)` to searched `CASE` expressions.
pub fn rewrite_conditionals(statement: Statement) -> Result<Statement, String> {
    rewrite_calls(statement, |func, name| match name {
        "IFF" => {
            let mut args = exact_args(func, name, 3)?.into_iter();
            let (cond, then, otherwise) = match (args.next(), args.next(), args.next()) {
                (Some(c), Some(t), Some(o)) => (c, t, o),
                _ => return Err("IFF with missing arguments".to_string()),
            };
            Ok(Some(case_when(cond, then, otherwise)))
        }
        "NVL2" => {
            let mut args = exact_args(func, name, 3)?.into_iter();
            let (value, present, absent) = match (args.next(), args.next(), args.next()) {
                (Some(v), Some(p), Some(a)) => (v, p, a),
                _ => return Err("NVL2 with missing arguments".to_string()),
            };
            Ok(Some(case_when(
                Expr::IsNotNull(Box::new(value)),
                present,
                absent,
            )))
        }
        _ => Ok(None),
    })
}

/// `TRY_TO_<TYPE>(x, ...)` to `TRY_CAST(x AS <type>)`.
pub fn rewrite_try_casts(statement: Statement) -> Result<Statement, String> {
    rewrite_calls(statement, |func, name| {
        let Some(suffix) = name.strip_prefix("TRY_TO_") else {
            return Ok(None);
        };
        let args = positional_args(func, name)?;
        let Some(value) = args.into_iter().next() else {
            return Err(format!("{name} without arguments"));
        };
        Ok(Some(Expr::Cast {
            kind: CastKind::TryCast,
            expr: Box::new(value),
            data_type: try_cast_target(suffix),
            format: None,
        }))
    })
}

/// Target type for a `TRY_TO_<suffix>` call. Unknown suffixes become strings.
pub fn try_cast_target(suffix: &str) -> DataType {
    match suffix.to_uppercase().as_str() {
        "NUMBER" | "NUMERIC" | "DOUBLE" => DataType::Double,
        "DECIMAL" => DataType::Decimal(ExactNumberInfo::None),
        "DATE" => DataType::Date,
        "TIME" => DataType::Time(None, TimezoneInfo::None),
        "TIMESTAMP" | "TIMESTAMP_NTZ" | "TIMESTAMP_LTZ" | "TIMESTAMP_TZ" => {
            DataType::Timestamp(None, TimezoneInfo::None)
        }
        "BOOLEAN" => DataType::Boolean,
        _ => DataType::Varchar(None),
    }
}

/// Object/array builders, JSON parsing, VARIANT casts and path access.
pub fn rewrite_semi_structured(statement: Statement) -> Result<Statement, String> {
    rewrite_exprs(statement, |expr| {
        match expr {
            Expr::Function(func) => {
                let Some(name) = simple_name(func) else {
                    return Ok(());
                };
                let replacement = match name.as_str() {
                    "OBJECT_CONSTRUCT" => {
                        positional_args(func, &name)?;
                        Expr::Function(with_name(func, "json_object"))
                    }
                    "ARRAY_CONSTRUCT" => {
                        positional_args(func, &name)?;
                        Expr::Function(with_name(func, "list_value"))
                    }
                    "PARSE_JSON" | "TO_VARIANT" => {
                        let mut args = exact_args(func, &name, 1)?;
                        let Some(value) = args.pop() else {
                            return Err(format!("{name} without arguments"));
                        };
                        cast_to_json(value)
                    }
                    _ => return Ok(()),
                };
                *expr = replacement;
            }
            Expr::Cast { data_type, .. } if is_variant(&*data_type) => {
                *data_type = DataType::JSON;
            }
            Expr::JsonAccess { value, path } => {
                let literal = json_path_literal(path)?;
                let value = std::mem::replace(value.as_mut(), Expr::Value(Value::Null));
                *expr = call(
                    "json_extract",
                    vec![value, Expr::Value(Value::SingleQuotedString(literal))],
                );
            }
            _ => {}
        }
        Ok(())
    })
}

/// `ZEROIFNULL(x)` to `COALESCE(x, 0)`.
pub fn rewrite_zero_if_null(statement: Statement) -> Result<Statement, String> {
    rewrite_calls(statement, |func, name| {
        if name != "ZEROIFNULL" {
            return Ok(None);
        }
        let mut args = exact_args(func, name, 1)?;
        args.push(Expr::Value(Value::Number("0".to_string(), false)));
        Ok(Some(coalesce(args)))
    })
}

/// Row-generating `FLATTEN` calls to `UNNEST` over their input.
pub fn rewrite_flatten(mut statement: Statement) -> Result<Statement, String> {
    match statement.visit(&mut FlattenRewriter) {
        ControlFlow::Break(construct) => Err(construct),
        ControlFlow::Continue(()) => Ok(statement),
    }
}

/// Hook for QUALIFY post-processing. The local engine accepts QUALIFY as parsed.
pub fn rewrite_qualify(statement: Statement) -> Result<Statement, String> {
    Ok(statement)
}

/// Hook for date-function post-processing. The parser already normalizes the
/// date functions both dialects share.
pub fn rewrite_date_functions(statement: Statement) -> Result<Statement, String> {
    Ok(statement)
}

struct FlattenRewriter;

impl VisitorMut for FlattenRewriter {
    type Break = String;

    fn post_visit_table_factor(&mut self, factor: &mut TableFactor) -> ControlFlow<String> {
        match flatten_replacement(factor) {
            Ok(Some(unnest)) => {
                *factor = unnest;
                ControlFlow::Continue(())
            }
            Ok(None) => ControlFlow::Continue(()),
            Err(construct) => ControlFlow::Break(construct),
        }
    }
}

fn flatten_replacement(factor: &TableFactor) -> Result<Option<TableFactor>, String> {
    let (args, alias) = match factor {
        TableFactor::Function {
            name, args, alias, ..
        } if is_flatten(name) => (args.clone(), alias.clone()),
        TableFactor::Table {
            name,
            args: Some(table_args),
            alias,
            ..
        } if is_flatten(name) => (table_args.args.clone(), alias.clone()),
        TableFactor::TableFunction {
            expr: Expr::Function(func),
            alias,
        } if is_flatten(&func.name) => match &func.args {
            FunctionArguments::List(list) => (list.args.clone(), alias.clone()),
            _ => (Vec::new(), alias.clone()),
        },
        _ => return Ok(None),
    };

    let input = flatten_input(&args).ok_or_else(|| "FLATTEN without an input".to_string())?;
    Ok(Some(TableFactor::UNNEST {
        alias,
        array_exprs: vec![input],
        with_offset: false,
        with_offset_alias: None,
        with_ordinality: false,
    }))
}

/// The `input =>` argument wherever it sits, else the first positional one.
fn flatten_input(args: &[FunctionArg]) -> Option<Expr> {
    let named = args.iter().find_map(|arg| match arg {
        FunctionArg::Named {
            name,
            arg: FunctionArgExpr::Expr(expr),
            ..
        } if name.value.eq_ignore_ascii_case("input") => Some(expr.clone()),
        FunctionArg::ExprNamed {
            name: Expr::Identifier(name),
            arg: FunctionArgExpr::Expr(expr),
            ..
        } if name.value.eq_ignore_ascii_case("input") => Some(expr.clone()),
        _ => None,
    });
    named.or_else(|| {
        args.iter().find_map(|arg| match arg {
            FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => Some(expr.clone()),
            _ => None,
        })
    })
}

fn is_flatten(name: &ObjectName) -> bool {
    name.0
        .last()
        .is_some_and(|ident| ident.value.eq_ignore_ascii_case("FLATTEN"))
}

fn is_variant(data_type: &DataType) -> bool {
    matches!(data_type, DataType::Custom(name, _) if name.to_string().eq_ignore_ascii_case("VARIANT"))
}

/// `$.a.b[0]` style path for a semi-structured access chain.
fn json_path_literal(path: &JsonPath) -> Result<String, String> {
    let mut literal = String::from("$");
    for elem in &path.path {
        match elem {
            JsonPathElem::Dot { key, .. } => push_key(&mut literal, key),
            JsonPathElem::Bracket { key } => match key {
                Expr::Value(Value::Number(index, _)) => {
                    literal.push('[');
                    literal.push_str(index);
                    literal.push(']');
                }
                Expr::Value(Value::SingleQuotedString(key))
                | Expr::Value(Value::DoubleQuotedString(key)) => push_key(&mut literal, key),
                other => return Err(format!("semi-structured access with computed key {other}")),
            },
        }
    }
    Ok(literal)
}

fn push_key(literal: &mut String, key: &str) {
    if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        literal.push('.');
        literal.push_str(key);
    } else {
        literal.push_str(&format!(".\"{}\"", key.replace('"', "\\\"")));
    }
}

/// Apply `rule` to every function call, bottom-up. `rule` sees the call and
/// its upper-cased unqualified name and returns a replacement if it has one.
fn rewrite_calls<F>(statement: Statement, mut rule: F) -> Result<Statement, String>
where
    F: FnMut(&Function, &str) -> Result<Option<Expr>, String>,
{
    rewrite_exprs(statement, |expr| {
        let Expr::Function(func) = expr else {
            return Ok(());
        };
        let Some(name) = simple_name(func) else {
            return Ok(());
        };
        if let Some(replacement) = rule(func, &name)? {
            *expr = replacement;
        }
        Ok(())
    })
}

fn rewrite_exprs<F>(mut statement: Statement, mut rule: F) -> Result<Statement, String>
where
    F: FnMut(&mut Expr) -> Result<(), String>,
{
    let flow = visit_expressions_mut(&mut statement, |expr| match rule(expr) {
        Ok(()) => ControlFlow::Continue(()),
        Err(construct) => ControlFlow::Break(construct),
    });
    match flow {
        ControlFlow::Break(construct) => Err(construct),
        ControlFlow::Continue(()) => Ok(statement),
    }
}

fn simple_name(func: &Function) -> Option<String> {
    match func.name.0.as_slice() {
        [ident] => Some(ident.value.to_uppercase()),
        _ => None,
    }
}

fn positional_args(func: &Function, name: &str) -> Result<Vec<Expr>, String> {
    match &func.args {
        FunctionArguments::None => Ok(Vec::new()),
        FunctionArguments::Subquery(_) => Err(format!("{name} over a subquery")),
        FunctionArguments::List(list) => list
            .args
            .iter()
            .map(|arg| match arg {
                FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => Ok(expr.clone()),
                other => Err(format!("{name} with argument {other}")),
            })
            .collect(),
    }
}

fn exact_args(func: &Function, name: &str, arity: usize) -> Result<Vec<Expr>, String> {
    let args = positional_args(func, name)?;
    if args.len() != arity {
        return Err(format!(
            "{name} with {} arguments (expected {arity})",
            args.len()
        ));
    }
    Ok(args)
}

fn with_name(func: &Function, name: &str) -> Function {
    let mut renamed = func.clone();
    renamed.name = ObjectName(vec![Ident::new(name)]);
    renamed
}

fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function(Function {
        name: ObjectName(vec![Ident::new(name)]),
        uses_odbc_syntax: false,
        parameters: FunctionArguments::None,
        args: FunctionArguments::List(FunctionArgumentList {
            duplicate_treatment: None,
            args: args
                .into_iter()
                .map(|arg| FunctionArg::Unnamed(FunctionArgExpr::Expr(arg)))
                .collect(),
            clauses: vec![],
        }),
        filter: None,
        null_treatment: None,
        over: None,
        within_group: vec![],
    })
}

fn coalesce(args: Vec<Expr>) -> Expr {
    call("COALESCE", args)
}

fn case_when(condition: Expr, then: Expr, otherwise: Expr) -> Expr {
    Expr::Case {
        operand: None,
        conditions: vec![condition],
        results: vec![then],
        else_result: Some(Box::new(otherwise)),
    }
}

fn cast_to_json(value: Expr) -> Expr {
    Expr::Cast {
        kind: CastKind::Cast,
        expr: Box::new(value),
        data_type: DataType::JSON,
        format: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlparser::dialect::SnowflakeDialect;
    use sqlparser::parser::Parser;

    fn apply(pass: Pass, sql: &str) -> Result<String, String> {
        let mut statements = Parser::parse_sql(&SnowflakeDialect {}, sql).unwrap();
        let statement = statements.remove(0);
        pass(statement).map(|s| s.to_string())
    }

    #[test]
    fn test_listagg_becomes_string_agg() {
        let out = apply(rename_functions, "SELECT LISTAGG(name, ',') FROM t").unwrap();
        assert_eq!(out, "SELECT STRING_AGG(name, ',') FROM t");
    }

    #[test]
    fn test_listagg_within_group_moves_into_arguments() {
        let out = apply(
            rename_functions,
            "SELECT LISTAGG(name, ',') WITHIN GROUP (ORDER BY name) FROM t",
        )
        .unwrap();
        assert_eq!(out, "SELECT STRING_AGG(name, ',' ORDER BY name) FROM t");
    }

    #[test]
    fn test_nvl_and_ifnull_become_coalesce() {
        let out = apply(rename_functions, "SELECT NVL(a, 0), IFNULL(b, 'x') FROM t").unwrap();
        assert_eq!(out, "SELECT COALESCE(a, 0), COALESCE(b, 'x') FROM t");
    }

    #[test]
    fn test_nvl_wrong_arity_is_unsupported() {
        let err = apply(rename_functions, "SELECT NVL(a) FROM t").unwrap_err();
        assert!(err.contains("NVL"));
    }

    #[test]
    fn test_qualified_function_is_left_alone() {
        let out = apply(rename_functions, "SELECT util.nvl(a, 0) FROM t").unwrap();
        assert_eq!(out, "SELECT util.nvl(a, 0) FROM t");
    }

    #[test]
    fn test_iff_becomes_case() {
        let out = apply(rewrite_conditionals, "SELECT IFF(a > 1, 'big', 'small') FROM t").unwrap();
        assert_eq!(
            out,
            "SELECT CASE WHEN a > 1 THEN 'big' ELSE 'small' END FROM t"
        );
    }

    #[test]
    fn test_nvl2_becomes_case_on_not_null() {
        let out = apply(rewrite_conditionals, "SELECT NVL2(a, 'set', 'unset') FROM t").unwrap();
        assert_eq!(
            out,
            "SELECT CASE WHEN a IS NOT NULL THEN 'set' ELSE 'unset' END FROM t"
        );
    }

    #[test]
    fn test_try_to_number_becomes_try_cast_double() {
        let out = apply(rewrite_try_casts, "SELECT TRY_TO_NUMBER(a) FROM t").unwrap();
        assert_eq!(out, "SELECT TRY_CAST(a AS DOUBLE) FROM t");
    }

    #[test]
    fn test_try_to_timestamp_variants() {
        let out = apply(
            rewrite_try_casts,
            "SELECT TRY_TO_TIMESTAMP_NTZ(a), TRY_TO_DATE(b), TRY_TO_BOOLEAN(c) FROM t",
        )
        .unwrap();
        assert_eq!(
            out,
            "SELECT TRY_CAST(a AS TIMESTAMP), TRY_CAST(b AS DATE), TRY_CAST(c AS BOOLEAN) FROM t"
        );
    }

    #[test]
    fn test_try_to_unknown_suffix_defaults_to_varchar() {
        let out = apply(rewrite_try_casts, "SELECT TRY_TO_GEOGRAPHY(a) FROM t").unwrap();
        assert_eq!(out, "SELECT TRY_CAST(a AS VARCHAR) FROM t");
    }

    #[test]
    fn test_try_cast_target_table() {
        assert_eq!(try_cast_target("numeric"), DataType::Double);
        assert_eq!(
            try_cast_target("DECIMAL"),
            DataType::Decimal(ExactNumberInfo::None)
        );
        assert_eq!(
            try_cast_target("TIME"),
            DataType::Time(None, TimezoneInfo::None)
        );
        assert_eq!(try_cast_target("VARCHAR"), DataType::Varchar(None));
    }

    #[test]
    fn test_object_and_array_builders() {
        let out = apply(
            rewrite_semi_structured,
            "SELECT OBJECT_CONSTRUCT('k', a), ARRAY_CONSTRUCT(1, 2) FROM t",
        )
        .unwrap();
        assert_eq!(out, "SELECT json_object('k', a), list_value(1, 2) FROM t");
    }

    #[test]
    fn test_parse_json_and_to_variant_become_json_cast() {
        let out = apply(
            rewrite_semi_structured,
            "SELECT PARSE_JSON(raw), TO_VARIANT(a) FROM t",
        )
        .unwrap();
        assert_eq!(out, "SELECT CAST(raw AS JSON), CAST(a AS JSON) FROM t");
    }

    #[test]
    fn test_variant_cast_becomes_json() {
        let out = apply(rewrite_semi_structured, "SELECT a::VARIANT FROM t").unwrap();
        assert_eq!(out, "SELECT a::JSON FROM t");
    }

    #[test]
    fn test_path_access_becomes_json_extract() {
        let out = apply(rewrite_semi_structured, "SELECT payload:user.id FROM t").unwrap();
        assert_eq!(out, "SELECT json_extract(payload, '$.user.id') FROM t");
    }

    #[test]
    fn test_bracket_access_becomes_json_extract() {
        let out = apply(rewrite_semi_structured, "SELECT payload['user_id'] FROM t").unwrap();
        assert_eq!(out, "SELECT json_extract(payload, '$.user_id') FROM t");
    }

    #[test]
    fn test_computed_bracket_key_is_unsupported() {
        let err = apply(rewrite_semi_structured, "SELECT payload[k] FROM t").unwrap_err();
        assert!(err.contains("computed key"));
    }

    #[test]
    fn test_zeroifnull_becomes_coalesce_zero() {
        let out = apply(rewrite_zero_if_null, "SELECT ZEROIFNULL(amount) FROM t").unwrap();
        assert_eq!(out, "SELECT COALESCE(amount, 0) FROM t");
    }

    #[test]
    fn test_lateral_flatten_named_input() {
        let out = apply(
            rewrite_flatten,
            "SELECT f.value FROM t, LATERAL FLATTEN(input => t.items) f",
        )
        .unwrap();
        assert!(out.contains("UNNEST(t.items)"));
        assert!(!out.to_uppercase().contains("FLATTEN"));
    }

    #[test]
    fn test_lateral_flatten_named_input_not_first() {
        let out = apply(
            rewrite_flatten,
            "SELECT f.value FROM t, LATERAL FLATTEN(outer => true, input => t.items) f",
        )
        .unwrap();
        assert!(out.contains("UNNEST(t.items)"));
    }

    #[test]
    fn test_lateral_flatten_positional_input() {
        let out = apply(
            rewrite_flatten,
            "SELECT f.value FROM t, LATERAL FLATTEN(t.items) f",
        )
        .unwrap();
        assert!(out.contains("UNNEST(t.items)"));
        assert!(!out.to_uppercase().contains("FLATTEN"));
    }

    #[test]
    fn test_table_flatten_is_rewritten() {
        let out = apply(
            rewrite_flatten,
            "SELECT f.value FROM TABLE(FLATTEN(input => arr)) f",
        )
        .unwrap();
        assert!(out.contains("UNNEST(arr)"));
    }

    #[test]
    fn test_hook_passes_are_no_ops() {
        let sql = "SELECT a FROM t QUALIFY ROW_NUMBER() OVER (PARTITION BY a ORDER BY b) = 1";
        let expected = Parser::parse_sql(&SnowflakeDialect {}, sql).unwrap()[0].to_string();
        assert_eq!(apply(rewrite_qualify, sql).unwrap(), expected);
        assert_eq!(apply(rewrite_date_functions, sql).unwrap(), expected);
    }

    #[test]
    fn test_pipeline_runs_all_passes() {
        let statement = Parser::parse_sql(
            &SnowflakeDialect {},
            "SELECT NVL(IFF(a > 0, a, NULL), ZEROIFNULL(b)) FROM t",
        )
        .unwrap()
        .remove(0);
        let out = run_all(statement).unwrap().to_string();
        assert_eq!(
            out,
            "SELECT COALESCE(CASE WHEN a > 0 THEN a ELSE NULL END, COALESCE(b, 0)) FROM t"
        );
    }
}
