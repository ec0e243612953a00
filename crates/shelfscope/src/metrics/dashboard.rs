use serde::Serialize;

use super::{BandCount, KpiSummary, MetricsBuilder, MetricsError, PriceBucketStat, ProductRow};
use crate::cache::Clock;
use crate::filter::{FilterSelection, Predicate};
use crate::gateway::QueryGateway;

/// Every section of one render. Sections after a failed query stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardReport {
    pub predicate: String,
    pub available_brands: Option<Vec<String>>,
    pub unknown_brands: Vec<String>,
    pub kpis: Option<KpiSummary>,
    pub discount_bands: Option<Vec<BandCount>>,
    pub price_buckets: Option<Vec<PriceBucketStat>>,
    pub top_discounted: Option<Vec<ProductRow>>,
    pub top_rated: Option<Vec<ProductRow>>,
}

#[derive(Debug)]
pub struct DashboardRun {
    pub report: DashboardReport,
    pub failure: Option<MetricsError>,
}

/// Runs the dashboard queries top to bottom, stopping at the first gateway
/// failure.
pub fn build_dashboard<G: QueryGateway, C: Clock>(
    metrics: &MetricsBuilder<'_, G, C>,
    selection: &FilterSelection,
) -> DashboardRun {
    let predicate = Predicate::from_selection(selection);
    let mut report = DashboardReport {
        predicate: predicate.to_sql(),
        ..DashboardReport::default()
    };
    let failure = fill_sections(metrics, selection, &predicate, &mut report).err();
    DashboardRun { report, failure }
}

fn fill_sections<G: QueryGateway, C: Clock>(
    metrics: &MetricsBuilder<'_, G, C>,
    selection: &FilterSelection,
    predicate: &Predicate,
    report: &mut DashboardReport,
) -> Result<(), MetricsError> {
    let brands = metrics.brands()?;
    report.unknown_brands = selection
        .brands()
        .iter()
        .filter(|brand| !brands.contains(brand))
        .cloned()
        .collect();
    report.available_brands = Some(brands);

    report.kpis = Some(metrics.kpi_summary(predicate)?);
    report.discount_bands = Some(metrics.discount_bands(predicate)?);
    report.price_buckets = Some(metrics.price_buckets(predicate)?);
    report.top_discounted = Some(metrics.top_discounted(predicate)?);
    report.top_rated = Some(metrics.top_rated(predicate)?);
    Ok(())
}
