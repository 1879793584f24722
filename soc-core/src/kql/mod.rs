mod lexer;
mod parser;

pub use parser::{parse, Expr, Value as KqlValue};

use serde_json::{json, Value as JsonValue};

/// Translates a parsed KQL-lite expression into a generic search DSL
/// (spec §6 semantic mapping table). Malformed/unsupported constructs are
/// never produced by `parse` — the fallback to `query_string` applies at
/// the `compile` entry point for the whole query string, not per-node.
pub fn compile_expr(expr: &Expr) -> JsonValue {
    match expr {
        Expr::MatchAll => json!({"match_all": {}}),
        Expr::And(clauses) => json!({"bool": {"must": clauses.iter().map(compile_expr).collect::<Vec<_>>()}}),
        Expr::Or(clauses) => json!({
            "bool": {
                "should": clauses.iter().map(compile_expr).collect::<Vec<_>>(),
                "minimum_should_match": 1,
            }
        }),
        Expr::Not(inner) => json!({"bool": {"must_not": [compile_expr(inner)]}}),
        Expr::Eq(field, v) => json!({"term": {field: kql_value_to_json(v)}}),
        Expr::Ne(field, v) => json!({"bool": {"must_not": [{"term": {field: kql_value_to_json(v)}}]}}),
        Expr::Contains(field, s) => json!({"match": {field: s}}),
        Expr::Startswith(field, s) => json!({"prefix": {field: s}}),
        Expr::Endswith(field, s) => json!({"wildcard": {field: format!("*{s}")}}),
        Expr::Has(field, s) => json!({"match": {field: s}}),
        Expr::In(field, values) => json!({"terms": {field: values.iter().map(kql_value_to_json).collect::<Vec<_>>()}}),
        Expr::Gt(field, n) => json!({"range": {field: {"gt": n}}}),
        Expr::Gte(field, n) => json!({"range": {field: {"gte": n}}}),
        Expr::Lt(field, n) => json!({"range": {field: {"lt": n}}}),
        Expr::Lte(field, n) => json!({"range": {field: {"lte": n}}}),
    }
}

fn kql_value_to_json(v: &KqlValue) -> JsonValue {
    match v {
        KqlValue::Str(s) => json!(s),
        KqlValue::Int(n) => json!(n),
    }
}

/// Parses and compiles a KQL-lite query string. Any query that fails to
/// parse falls back to a `query_string` clause rather than erroring, per
/// spec §6 ("malformed expressions fall back to query_string").
pub fn compile(query: &str) -> JsonValue {
    let stripped = strip_table_prefix(query);
    match parser::parse(stripped) {
        Ok(expr) => compile_expr(&expr),
        Err(_) => json!({"query_string": {"query": query}}),
    }
}

/// Strips an optional leading `<Table> | where ...` prefix (spec §6).
fn strip_table_prefix(query: &str) -> &str {
    if let Some(idx) = query.find('|') {
        let (head, tail) = query.split_at(idx);
        let head = head.trim();
        if !head.is_empty() && head.chars().all(|c| c.is_alphanumeric() || c == '_') {
            let rest = tail[1..].trim_start();
            if let Some(rest) = rest.strip_prefix("where") {
                return rest.trim_start();
            }
        }
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_and_or_per_semantic_mapping_table() {
        let dsl = compile(r#"host.name == "WORK-01" and (event_type == "login" or event_type == "logout")"#);
        let bool_obj = dsl.get("bool").unwrap();
        let must = bool_obj.get("must").unwrap().as_array().unwrap();
        assert_eq!(must.len(), 2);
        assert!(must[0].get("term").unwrap().get("host.name").unwrap() == "WORK-01");
        let inner_bool = must[1].get("bool").unwrap();
        let should = inner_bool.get("should").unwrap().as_array().unwrap();
        assert_eq!(should.len(), 2);
        assert_eq!(inner_bool.get("minimum_should_match").unwrap(), 1);
    }

    #[test]
    fn malformed_query_falls_back_to_query_string() {
        let dsl = compile("host.name == ");
        assert!(dsl.get("query_string").is_some());
    }

    #[test]
    fn parsing_same_query_twice_is_deterministic() {
        let q = r#"severity >= 50 and message contains "fail""#;
        let d1 = compile(q);
        let d2 = compile(q);
        assert_eq!(d1, d2);
    }

    #[test]
    fn double_negation_is_equivalent_to_original() {
        let single = parser::parse(r#"x == "a""#).unwrap();
        let double = parser::parse(r#"not not x == "a""#).unwrap();
        assert_eq!(compile_expr(&double), json!({"bool": {"must_not": [{"bool": {"must_not": [compile_expr(&single)]}}]}}));
    }

    #[test]
    fn table_prefix_is_stripped_before_parsing() {
        let dsl = compile(r#"Events | where host.name == "A""#);
        assert_eq!(dsl, json!({"term": {"host.name": "A"}}));
    }
}
