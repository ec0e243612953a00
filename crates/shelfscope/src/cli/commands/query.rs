use anyhow::Result;
use clap::Args;
use serde_json::{Value, json};

use super::{CommandContext, print_envelope};
use crate::gateway::QueryGateway;
use crate::models::QueryEnvelope;
use crate::render::render_table;

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// A single read-only SELECT (or WITH ... SELECT) statement.
    #[arg(value_name = "SQL")]
    pub sql: String,
}

pub fn run(args: &QueryArgs, context: &CommandContext) -> Result<()> {
    let gateway = context.open_gateway("query")?;
    let rows = gateway
        .execute_select(&args.sql)
        .map_err(|error| QueryEnvelope::from_gateway_error("query", &error).into_failure())?;
    eprintln!(
        "query: rows={} truncated={} row_cap={}",
        rows.len(),
        rows.truncated,
        context.row_cap
    );

    if context.json {
        let mut envelope = QueryEnvelope::ok(
            "query",
            json!({ "columns": rows.columns, "rows": rows.rows }),
        )
        .with_meta("row_count", json!(rows.len()))
        .with_meta("truncated", json!(rows.truncated))
        .with_meta("row_cap", json!(context.row_cap));
        if rows.truncated {
            envelope = envelope
                .with_warning(
                    "row_cap_exceeded",
                    format!("result truncated to {} rows", context.row_cap),
                )
                .with_warning_details(json!({ "row_cap": context.row_cap }));
        }
        return print_envelope(&envelope);
    }

    let headers = rows.columns.clone();
    let body = rows
        .rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|column| row.get(column).map(text_cell).unwrap_or_default())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    if headers.is_empty() {
        println!("(no columns)");
    } else {
        print!("{}", render_table(&headers, &body));
    }
    println!(
        "({} {})",
        rows.len(),
        if rows.len() == 1 { "row" } else { "rows" }
    );
    if rows.truncated {
        println!("warning: result truncated to {} rows", context.row_cap);
    }
    Ok(())
}

fn text_cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
