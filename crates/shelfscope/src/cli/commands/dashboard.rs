use std::path::Path;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use serde_json::json;

use super::{CommandContext, print_envelope, to_json_value};
use crate::cache::{Clock, QueryCache};
use crate::cli::app::FilterArgs;
use crate::filter::FilterSelection;
use crate::gateway::QueryGateway;
use crate::metrics::{MetricsBuilder, build_dashboard};
use crate::models::QueryEnvelope;
use crate::packs::{PackLoad, PackLoader, discover_packs, select_packs};
use crate::render::{render_dashboard, render_pack};

#[derive(Debug, Clone, Args)]
pub struct DashboardArgs {
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Insight packs to show next to the dashboard, by file stem.
    #[arg(long = "pack", value_name = "LABEL")]
    pub packs: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub no_packs: bool,
}

impl FilterArgs {
    pub fn selection(&self) -> Result<FilterSelection> {
        Ok(FilterSelection::new(
            self.brands.iter().cloned(),
            self.min_discount,
            self.min_rating,
        )?)
    }

    /// Fills brands from the catalog when `--default-brands` is set.
    pub(crate) fn apply_default_brands<G: QueryGateway, C: Clock>(
        &self,
        mut selection: FilterSelection,
        command: &str,
        cache: &QueryCache<G, C>,
        context: &CommandContext,
    ) -> Result<FilterSelection> {
        if self.default_brands {
            let metrics = MetricsBuilder::new(cache, context.table.clone());
            let brands = metrics.default_brands().map_err(|failure| {
                QueryEnvelope::from_metrics_error(command, &failure).into_failure()
            })?;
            eprintln!("{command}: default brands={}", brands.join(","));
            selection.set_brands(brands)?;
        }
        Ok(selection)
    }
}

pub fn run(args: &DashboardArgs, context: &CommandContext) -> Result<()> {
    let selection = args.filters.selection()?;
    let cache = context.open_cache("dashboard")?;
    let selection = args
        .filters
        .apply_default_brands(selection, "dashboard", &cache, context)?;
    let loader = PackLoader::default();
    let packs = (!args.no_packs).then_some(args.packs.as_slice());
    render_pass(&cache, &loader, context, &selection, packs)
}

#[derive(Debug, Serialize)]
struct PackView {
    label: String,
    column: usize,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    pack: serde_json::Value,
}

#[derive(Debug, Default, Serialize)]
struct PacksSection {
    views: Vec<PackView>,
    text: String,
    warnings: Vec<String>,
}

/// One full top-to-bottom evaluation: dashboard queries, then packs.
/// Packs render even when a query fails; the failure is returned afterwards.
pub(crate) fn render_pass<G: QueryGateway, C: Clock>(
    cache: &QueryCache<G, C>,
    loader: &PackLoader,
    context: &CommandContext,
    selection: &FilterSelection,
    packs: Option<&[String]>,
) -> Result<()> {
    let metrics = MetricsBuilder::new(cache, context.table.clone());
    let run = build_dashboard(&metrics, selection);
    let packs_section = match packs {
        Some(requested) => collect_packs(loader, &context.paths.packs_dir, requested),
        None => PacksSection::default(),
    };
    let stats = cache.stats();
    eprintln!(
        "dashboard: predicate=\"{}\" cache_hits={} cache_misses={} cache_entries={} packs={}",
        run.report.predicate,
        stats.hits,
        stats.misses,
        stats.entries,
        packs_section.views.len()
    );

    if context.json {
        let data = json!({
            "filters": to_json_value(selection)?,
            "report": to_json_value(&run.report)?,
            "packs": to_json_value(&packs_section.views)?,
        });
        let mut envelope = match &run.failure {
            Some(failure) => QueryEnvelope::from_metrics_error("dashboard", failure).with_data(data),
            None => QueryEnvelope::ok("dashboard", data),
        }
        .with_meta("cache", to_json_value(&stats)?)
        .with_meta("cache_ttl_secs", json!(cache.ttl().as_secs()));
        for brand in &run.report.unknown_brands {
            envelope = envelope
                .with_warning("unknown_brand", format!("brand `{brand}` is not in the catalog"));
        }
        for warning in &packs_section.warnings {
            envelope = envelope.with_warning("pack_warning", warning.clone());
        }
        match run.failure {
            Some(_) => return Err(envelope.into_failure()),
            None => print_envelope(&envelope)?,
        }
        return Ok(());
    }

    print!("{}", render_dashboard(&run.report));
    if packs.is_some() {
        println!();
        println!("## Insights Packs");
        for warning in &packs_section.warnings {
            println!("warning: {warning}");
        }
        print!("{}", packs_section.text);
    }

    match run.failure {
        Some(failure) => {
            Err(QueryEnvelope::from_metrics_error("dashboard", &failure).into_failure())
        }
        None => Ok(()),
    }
}

fn collect_packs(loader: &PackLoader, packs_dir: &Path, requested: &[String]) -> PacksSection {
    let mut section = PacksSection::default();
    let available = match discover_packs(packs_dir) {
        Ok(available) => available,
        Err(error) => {
            section
                .warnings
                .push(format!("packs directory unavailable: {error:#}"));
            return section;
        }
    };
    if available.is_empty() {
        section.warnings.push(format!(
            "No packs found. Generate some into {}",
            packs_dir.display()
        ));
        return section;
    }

    let selection = select_packs(&available, requested);
    for label in &selection.unknown_labels {
        section.warnings.push(format!("unknown pack `{label}`"));
    }
    for (index, pack_file) in selection.chosen.iter().enumerate() {
        let column = selection.column_of(index);
        let load = loader.load(&pack_file.path);
        section
            .text
            .push_str(&render_pack(&pack_file.label, column, &load));
        let (status, reason) = match &load {
            PackLoad::Ready(pack) if !pack.is_empty() => ("ready", None),
            PackLoad::Ready(_) => ("empty", None),
            PackLoad::Unreadable { reason } => ("unreadable", Some(reason.clone())),
        };
        section.views.push(PackView {
            label: pack_file.label.clone(),
            column,
            status,
            reason,
            pack: serde_json::to_value(&*load.pack()).unwrap_or_default(),
        });
    }
    section
}
