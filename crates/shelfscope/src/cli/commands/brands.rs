use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::{CommandContext, print_envelope};
use crate::metrics::MetricsBuilder;
use crate::models::QueryEnvelope;

#[derive(Debug, Clone, Args)]
pub struct BrandsArgs {}

pub fn run(_args: &BrandsArgs, context: &CommandContext) -> Result<()> {
    let cache = context.open_cache("brands")?;
    let metrics = MetricsBuilder::new(&cache, context.table.clone());
    let brands = metrics
        .brands()
        .map_err(|error| QueryEnvelope::from_metrics_error("brands", &error).into_failure())?;
    eprintln!("brands: table={} count={}", context.table.as_str(), brands.len());

    if context.json {
        let envelope = QueryEnvelope::ok("brands", json!({ "brands": brands }))
            .with_meta("table", json!(context.table.as_str()));
        return print_envelope(&envelope);
    }

    for brand in &brands {
        println!("{brand}");
    }
    Ok(())
}
