//! Aggregate and ranking queries scoped by the current predicate.

pub mod dashboard;
pub mod rows;

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use crate::cache::{Clock, QueryCache};
use crate::filter::{DiscountBand, Predicate, PriceBucket};
use crate::gateway::{GatewayError, QueryGateway, QueryRows};

pub use dashboard::{DashboardReport, DashboardRun, build_dashboard};
pub use rows::{BandCount, KpiSummary, PriceBucketStat, ProductRow};

pub const DEFAULT_TABLE: &str = "products";
pub const TOP_LIMIT: usize = 50;
pub const TOP_RATED_MIN_RATINGS: u32 = 100;
pub const TOP_RATED_MIN_RATING: f64 = 4.0;
pub const DEFAULT_BRAND_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTableName(pub String);

impl std::fmt::Display for InvalidTableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "table name must be an identifier or schema.identifier, got `{}`",
            self.0
        )
    }
}

impl std::error::Error for InvalidTableName {}

/// Catalog table reference, restricted to plain identifiers so it can be
/// interpolated safely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTable(String);

impl CatalogTable {
    pub fn parse(raw: &str) -> Result<Self, InvalidTableName> {
        let trimmed = raw.trim();
        if table_name_regex().is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(InvalidTableName(raw.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CatalogTable {
    fn default() -> Self {
        Self(DEFAULT_TABLE.to_string())
    }
}

fn table_name_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
            .expect("table name regex should compile")
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsError {
    pub query: &'static str,
    pub source: GatewayError,
}

impl std::fmt::Display for MetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} query failed: {}", self.query, self.source)
    }
}

impl std::error::Error for MetricsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Builds and runs the dashboard queries through a shared cache.
#[derive(Debug)]
pub struct MetricsBuilder<'a, G, C> {
    cache: &'a QueryCache<G, C>,
    table: CatalogTable,
}

impl<'a, G: QueryGateway, C: Clock> MetricsBuilder<'a, G, C> {
    #[must_use]
    pub fn new(cache: &'a QueryCache<G, C>, table: CatalogTable) -> Self {
        Self { cache, table }
    }

    /// Distinct non-NULL brands, ascending.
    pub fn brands(&self) -> Result<Vec<String>, MetricsError> {
        let rows = self.run("brands", &brands_sql(&self.table))?;
        Ok(rows
            .rows
            .iter()
            .filter_map(|row| row.get("brand").and_then(|value| value.as_str()))
            .map(str::to_string)
            .collect())
    }

    /// The first few brands in catalog order, used as an opt-in preselection.
    pub fn default_brands(&self) -> Result<Vec<String>, MetricsError> {
        let mut brands = self.brands()?;
        brands.truncate(DEFAULT_BRAND_COUNT);
        Ok(brands)
    }

    /// Headline numbers; an empty match set yields the zero summary.
    pub fn kpi_summary(&self, predicate: &Predicate) -> Result<KpiSummary, MetricsError> {
        let rows = self.run("kpi_summary", &kpi_sql(&self.table, predicate))?;
        let summary = match rows.rows.first() {
            Some(row) => decode_row::<KpiSummary>("kpi_summary", row)?,
            None => KpiSummary::default(),
        };
        Ok(summary)
    }

    pub fn discount_bands(&self, predicate: &Predicate) -> Result<Vec<BandCount>, MetricsError> {
        let rows = self.run("discount_bands", &discount_bands_sql(&self.table, predicate))?;
        decode_rows("discount_bands", &rows)
    }

    pub fn price_buckets(
        &self,
        predicate: &Predicate,
    ) -> Result<Vec<PriceBucketStat>, MetricsError> {
        let rows = self.run("price_buckets", &price_buckets_sql(&self.table, predicate))?;
        decode_rows("price_buckets", &rows)
    }

    pub fn top_discounted(&self, predicate: &Predicate) -> Result<Vec<ProductRow>, MetricsError> {
        let rows = self.run("top_discounted", &top_discounted_sql(&self.table, predicate))?;
        decode_rows("top_discounted", &rows)
    }

    pub fn top_rated(&self, predicate: &Predicate) -> Result<Vec<ProductRow>, MetricsError> {
        let rows = self.run("top_rated", &top_rated_sql(&self.table, predicate))?;
        decode_rows("top_rated", &rows)
    }

    fn run(
        &self,
        query: &'static str,
        sql: &str,
    ) -> Result<std::rc::Rc<QueryRows>, MetricsError> {
        self.cache
            .fetch(sql)
            .map_err(|source| MetricsError { query, source })
    }
}

fn decode_rows<T: DeserializeOwned>(
    query: &'static str,
    rows: &QueryRows,
) -> Result<Vec<T>, MetricsError> {
    rows.rows.iter().map(|row| decode_row(query, row)).collect()
}

fn decode_row<T: DeserializeOwned>(
    query: &'static str,
    row: &crate::gateway::Row,
) -> Result<T, MetricsError> {
    serde_json::from_value(serde_json::Value::Object(row.clone())).map_err(|error| MetricsError {
        query,
        source: GatewayError::Execution {
            cause: format!("unexpected result shape: {error}"),
        },
    })
}

#[must_use]
pub fn brands_sql(table: &CatalogTable) -> String {
    format!(
        "SELECT DISTINCT brand FROM {} WHERE brand IS NOT NULL ORDER BY 1",
        table.as_str()
    )
}

#[must_use]
pub fn kpi_sql(table: &CatalogTable, predicate: &Predicate) -> String {
    format!(
        "SELECT COUNT(*) AS products, \
         ROUND(AVG(price),2) AS avg_price, \
         ROUND(AVG(mrp),2) AS avg_mrp, \
         ROUND(AVG(discount_percent),2) AS avg_discount_pct, \
         SUM(CASE WHEN price = mrp THEN 1 ELSE 0 END) AS no_discount_items \
         FROM {} WHERE {predicate}",
        table.as_str()
    )
}

#[must_use]
pub fn discount_bands_sql(table: &CatalogTable, predicate: &Predicate) -> String {
    format!(
        "SELECT band, COUNT(*) AS items FROM (\
         SELECT {} AS band FROM {} WHERE {predicate}\
         ) b GROUP BY band ORDER BY items DESC, band ASC",
        DiscountBand::case_sql(),
        table.as_str()
    )
}

#[must_use]
pub fn price_buckets_sql(table: &CatalogTable, predicate: &Predicate) -> String {
    format!(
        "SELECT {} AS price_bucket, \
         COUNT(*) AS items, \
         ROUND(AVG(discount_percent),2) AS avg_discount_pct \
         FROM {} WHERE {predicate} \
         GROUP BY price_bucket ORDER BY items DESC, price_bucket ASC",
        PriceBucket::case_sql(),
        table.as_str()
    )
}

#[must_use]
pub fn top_discounted_sql(table: &CatalogTable, predicate: &Predicate) -> String {
    format!(
        "SELECT product_id, title, brand, price, mrp, discount_percent, rating, rating_total \
         FROM {} WHERE {predicate} \
         ORDER BY discount_percent DESC, price ASC LIMIT {TOP_LIMIT}",
        table.as_str()
    )
}

#[must_use]
pub fn top_rated_sql(table: &CatalogTable, predicate: &Predicate) -> String {
    let scoped = predicate
        .and(&format!("rating_total >= {TOP_RATED_MIN_RATINGS}"))
        .and(&format!("rating >= {TOP_RATED_MIN_RATING:.0}"));
    format!(
        "SELECT product_id, title, brand, rating, rating_total, price, mrp, discount_percent \
         FROM {} WHERE {scoped} \
         ORDER BY rating DESC, rating_total DESC LIMIT {TOP_LIMIT}",
        table.as_str()
    )
}
