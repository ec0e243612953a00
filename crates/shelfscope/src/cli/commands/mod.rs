pub mod brands;
pub mod dashboard;
pub mod packs;
pub mod query;
pub mod session;

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use super::app::RuntimeArgs;
use crate::cache::{QueryCache, SystemClock};
use crate::config::RuntimePaths;
use crate::gateway::SqliteGateway;
use crate::metrics::CatalogTable;
use crate::models::QueryEnvelope;

/// Settings every command shares, resolved once at startup.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub paths: RuntimePaths,
    pub table: CatalogTable,
    pub cache_ttl: Duration,
    pub row_cap: usize,
    pub json: bool,
}

impl CommandContext {
    pub fn new(paths: RuntimePaths, runtime: &RuntimeArgs) -> Result<Self> {
        let table = CatalogTable::parse(&runtime.table).context("invalid --table")?;
        Ok(Self {
            paths,
            table,
            cache_ttl: Duration::from_secs(runtime.cache_ttl_secs),
            row_cap: runtime.row_cap,
            json: runtime.json,
        })
    }

    pub fn open_gateway(&self, command: &str) -> Result<SqliteGateway> {
        SqliteGateway::open(&self.paths.catalog_path)
            .map(|gateway| gateway.with_row_cap(self.row_cap))
            .map_err(|error| QueryEnvelope::from_gateway_error(command, &error).into_failure())
    }

    /// Process-wide query cache over the catalog gateway.
    pub fn open_cache(&self, command: &str) -> Result<QueryCache<SqliteGateway>> {
        let gateway = self.open_gateway(command)?;
        Ok(QueryCache::with_clock(
            gateway,
            SystemClock::new(),
            self.cache_ttl,
        ))
    }
}

pub(crate) fn print_envelope(envelope: &QueryEnvelope) -> Result<()> {
    let encoded = serde_json::to_string(envelope).context("failed to encode envelope")?;
    println!("{encoded}");
    Ok(())
}

pub(crate) fn to_json_value<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).context("failed to encode command output")
}
