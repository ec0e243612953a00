use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Value, json};

pub const GUARDRAIL_NAME: &str = "read_only_sql_single_statement";

const MUTATING_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "create", "alter", "drop", "replace", "truncate", "attach",
    "detach", "pragma", "vacuum", "reindex", "analyze", "begin", "commit", "rollback",
];

#[derive(Debug, Clone, PartialEq)]
pub struct SqlGuardrailViolation {
    pub message: String,
    pub details: Value,
}

/// Accepts exactly one `SELECT`, `WITH ... SELECT` or `EXPLAIN ... SELECT`
/// statement. Keywords inside string literals are ignored so that quoted
/// values such as `'Drop Dead'` stay legal.
pub fn validate_read_only_sql(raw_sql: &str) -> Result<(), SqlGuardrailViolation> {
    let candidate = strip_trailing_semicolons(raw_sql);
    if candidate.is_empty() {
        return Err(guardrail_violation(
            "SQL query is empty; provide a SELECT/CTE/EXPLAIN-SELECT statement",
            json!({"reason":"empty_statement"}),
        ));
    }

    let code_only = mask_string_literals(candidate);
    if code_only.contains(';') {
        return Err(guardrail_violation(
            "Multi-statement SQL is not allowed; submit exactly one read-only statement",
            json!({"reason":"multi_statement"}),
        ));
    }

    let normalized = code_only.to_ascii_lowercase();
    if let Some(keyword) = first_mutating_keyword(&normalized) {
        return Err(guardrail_violation(
            format!("Mutating SQL keyword `{keyword}` is not allowed"),
            json!({"reason":"mutating_statement","detected_keyword":keyword}),
        ));
    }

    let normalized_whitespace = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    let allowed = normalized_whitespace.starts_with("select")
        || normalized_whitespace.starts_with("with")
        || normalized_whitespace.starts_with("explain select")
        || normalized_whitespace.starts_with("explain query plan select");
    if !allowed {
        let leading_keyword = leading_keyword(&normalized);
        return Err(guardrail_violation(
            "Only SELECT, WITH ... SELECT, and EXPLAIN ... SELECT statements are allowed",
            json!({"reason":"unsupported_statement","leading_keyword":leading_keyword}),
        ));
    }

    Ok(())
}

pub fn strip_trailing_semicolons(raw_sql: &str) -> &str {
    let mut candidate = raw_sql.trim();
    while let Some(stripped) = candidate.strip_suffix(';') {
        candidate = stripped.trim_end();
    }
    candidate
}

/// Replaces the body of every single-quoted literal with a neutral `'_'`.
/// An unterminated literal swallows the rest of the statement.
fn mask_string_literals(sql: &str) -> String {
    string_literal_regex().replace_all(sql, "'_'").into_owned()
}

fn string_literal_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"'(?:[^']|'')*(?:'|$)").expect("string literal regex should compile")
    })
}

fn first_mutating_keyword(normalized_sql: &str) -> Option<String> {
    normalized_sql
        .split(|ch: char| !ch.is_ascii_alphanumeric() && ch != '_')
        .find_map(|token| {
            MUTATING_KEYWORDS
                .contains(&token)
                .then_some(token.to_string())
        })
}

fn leading_keyword(normalized_sql: &str) -> String {
    normalized_sql
        .split(|ch: char| !ch.is_ascii_alphanumeric() && ch != '_')
        .find(|token| !token.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

fn guardrail_violation(message: impl Into<String>, details: Value) -> SqlGuardrailViolation {
    SqlGuardrailViolation {
        message: message.into(),
        details: json!({
            "allowed_forms":[
                "SELECT ...",
                "WITH ... SELECT ...",
                "EXPLAIN SELECT ...",
                "EXPLAIN QUERY PLAN SELECT ..."
            ],
            "guardrail": GUARDRAIL_NAME,
            "violation": details
        }),
    }
}
