use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::{
    brands::BrandsArgs, dashboard::DashboardArgs, packs::PacksArgs, query::QueryArgs,
    session::SessionArgs,
};
use crate::cache::DEFAULT_QUERY_TTL;
use crate::gateway::DEFAULT_ROW_CAP;
use crate::metrics::DEFAULT_TABLE;

#[derive(Debug, Parser)]
#[command(
    name = "shelfscope",
    version,
    about = "Read-only catalog analytics dashboard and insight pack viewer"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    /// SQLite catalog file, opened read-only.
    #[arg(long, global = true, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub packs_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "NAME", default_value = DEFAULT_TABLE)]
    pub table: String,

    #[arg(long, global = true, value_name = "SECONDS", default_value_t = DEFAULT_QUERY_TTL.as_secs())]
    pub cache_ttl_secs: u64,

    #[arg(long, global = true, default_value_t = DEFAULT_ROW_CAP)]
    pub row_cap: usize,

    /// Emit JSON envelopes instead of text.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,
}

/// Filter controls shared by `dashboard` and `session`.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    #[arg(long = "brand", value_name = "BRAND")]
    pub brands: Vec<String>,

    /// Start from the first three catalog brands instead of every brand.
    #[arg(long, default_value_t = false, conflicts_with = "brands")]
    pub default_brands: bool,

    #[arg(
        long,
        value_name = "PERCENT",
        default_value_t = 0,
        value_parser = clap::value_parser!(u32).range(0..=90)
    )]
    pub min_discount: u32,

    #[arg(long, value_name = "RATING", default_value_t = 0.0)]
    pub min_rating: f64,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Dashboard(DashboardArgs),
    Brands(BrandsArgs),
    Packs(PacksArgs),
    Query(QueryArgs),
    Session(SessionArgs),
}
