use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, params};
use shelfscope::cache::{ManualClock, QueryCache};
use shelfscope::filter::{FilterSelection, Predicate};
use shelfscope::gateway::{GatewayError, QueryGateway, QueryRows, SqliteGateway};
use shelfscope::metrics::{CatalogTable, KpiSummary, MetricsBuilder, build_dashboard};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}-{nanos}"));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

type Product<'a> = (&'a str, &'a str, Option<&'a str>, f64, f64, i64, f64, i64);

const PRODUCTS: &[Product<'static>] = &[
    ("p1", "Logo Tee", Some("Puma"), 200.0, 400.0, 50, 4.5, 150),
    ("p2", "Cap", Some("Puma"), 100.0, 200.0, 50, 3.9, 500),
    ("p3", "Slim Jeans", Some("Levi's"), 50.0, 72.0, 30, 4.2, 90),
    ("p4", "Boots", Some("Drop Dead"), 6000.0, 6000.0, 0, 4.8, 1200),
    ("p5", "Plain Socks", None, 20.0, 20.0, 0, 3.0, 5),
];

fn write_catalog(path: &Path, products: &[Product<'_>]) {
    let connection = Connection::open(path).expect("catalog should be creatable");
    connection
        .execute_batch(
            "CREATE TABLE products (
                product_id TEXT PRIMARY KEY,
                title TEXT,
                brand TEXT,
                price REAL,
                mrp REAL,
                discount_percent INTEGER,
                rating REAL,
                rating_total INTEGER
            );",
        )
        .expect("schema should apply");
    for (id, title, brand, price, mrp, discount, rating, total) in products {
        connection
            .execute(
                "INSERT INTO products VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![id, title, brand, price, mrp, discount, rating, total],
            )
            .expect("row should insert");
    }
}

fn open_fixture(prefix: &str, products: &[Product<'_>]) -> SqliteGateway {
    let dir = unique_temp_dir(prefix);
    let path = dir.join("catalog.sqlite");
    write_catalog(&path, products);
    SqliteGateway::open(&path).expect("fixture catalog should open read-only")
}

fn selection(brands: &[&str], min_discount: u32, min_rating: f64) -> FilterSelection {
    FilterSelection::new(brands.iter().copied(), min_discount, min_rating)
        .expect("selection should be valid")
}

struct CountingGateway<G> {
    inner: G,
    calls: Cell<usize>,
}

impl<G: QueryGateway> QueryGateway for CountingGateway<G> {
    fn execute_select(&self, sql: &str) -> Result<QueryRows, GatewayError> {
        self.calls.set(self.calls.get() + 1);
        self.inner.execute_select(sql)
    }
}

#[test]
fn brands_are_distinct_sorted_and_skip_nulls() {
    let gateway = open_fixture("shelfscope-brands", PRODUCTS);
    let cache = QueryCache::new(gateway);
    let metrics = MetricsBuilder::new(&cache, CatalogTable::default());

    assert_eq!(
        metrics.brands().expect("brands query"),
        ["Drop Dead", "Levi's", "Puma"]
    );
}

#[test]
fn default_brands_are_the_first_three_in_catalog_order() {
    let mut products = PRODUCTS.to_vec();
    products.push(("p6", "Runner", Some("Nike"), 3000.0, 4000.0, 25, 4.1, 40));
    let gateway = open_fixture("shelfscope-default-brands", &products);
    let cache = QueryCache::new(gateway);
    let metrics = MetricsBuilder::new(&cache, CatalogTable::default());

    assert_eq!(
        metrics.default_brands().expect("brands query"),
        ["Drop Dead", "Levi's", "Nike"]
    );
}

#[test]
fn kpis_summarize_the_filtered_set() {
    let gateway = open_fixture("shelfscope-kpis", PRODUCTS);
    let cache = QueryCache::new(gateway);
    let metrics = MetricsBuilder::new(&cache, CatalogTable::default());

    let all = metrics
        .kpi_summary(&Predicate::from_selection(&selection(
            &["Puma", "Levi's", "Drop Dead"],
            0,
            0.0,
        )))
        .expect("kpi query");
    assert_eq!(all.products, 4);
    assert_eq!(all.avg_price, 1587.5);
    assert_eq!(all.avg_mrp, 1668.0);
    assert_eq!(all.avg_discount_pct, 32.5);
    assert_eq!(all.no_discount_items, 1);

    let quoted = metrics
        .kpi_summary(&Predicate::from_selection(&selection(&["Levi's"], 0, 0.0)))
        .expect("quoted brand should be queryable");
    assert_eq!(quoted.products, 1);
    assert_eq!(quoted.avg_price, 50.0);
}

#[test]
fn empty_match_set_yields_zero_kpis_and_empty_sections() {
    let gateway = open_fixture("shelfscope-empty", PRODUCTS);
    let cache = QueryCache::new(gateway);
    let metrics = MetricsBuilder::new(&cache, CatalogTable::default());
    let predicate = Predicate::from_selection(&selection(&["Nike"], 0, 0.0));

    assert_eq!(
        metrics.kpi_summary(&predicate).expect("kpi query"),
        KpiSummary::default()
    );
    assert!(metrics.discount_bands(&predicate).expect("bands").is_empty());
    assert!(metrics.price_buckets(&predicate).expect("buckets").is_empty());
    assert!(metrics.top_discounted(&predicate).expect("top").is_empty());
    assert!(metrics.top_rated(&predicate).expect("rated").is_empty());
}

#[test]
fn empty_table_has_zero_kpis() {
    let gateway = open_fixture("shelfscope-empty-table", &[]);
    let cache = QueryCache::new(gateway);
    let metrics = MetricsBuilder::new(&cache, CatalogTable::default());

    let summary = metrics.kpi_summary(&Predicate::all()).expect("kpi query");
    assert_eq!(summary, KpiSummary::default());
    assert!(metrics.brands().expect("brands").is_empty());
}

#[test]
fn discount_bands_and_price_buckets_count_by_label() {
    let gateway = open_fixture("shelfscope-bands", PRODUCTS);
    let cache = QueryCache::new(gateway);
    let metrics = MetricsBuilder::new(&cache, CatalogTable::default());
    let predicate = Predicate::from_selection(&selection(&["Puma", "Levi's", "Drop Dead"], 0, 0.0));

    let bands = metrics
        .discount_bands(&predicate)
        .expect("bands query")
        .into_iter()
        .map(|band| (band.band, band.items))
        .collect::<Vec<_>>();
    assert_eq!(
        bands,
        [
            ("40-60%".to_string(), 2),
            ("0%".to_string(), 1),
            ("20-40%".to_string(), 1)
        ]
    );

    let buckets = metrics
        .price_buckets(&predicate)
        .expect("buckets query")
        .into_iter()
        .map(|bucket| (bucket.price_bucket, bucket.items, bucket.avg_discount_pct))
        .collect::<Vec<_>>();
    assert_eq!(
        buckets,
        [
            ("<500".to_string(), 3, 43.33),
            ("5000+".to_string(), 1, 0.0)
        ]
    );
}

#[test]
fn top_discounted_breaks_ties_on_lower_price() {
    let gateway = open_fixture("shelfscope-top-discounted", PRODUCTS);
    let cache = QueryCache::new(gateway);
    let metrics = MetricsBuilder::new(&cache, CatalogTable::default());
    let predicate = Predicate::from_selection(&selection(&["Puma", "Levi's"], 0, 0.0));

    let ranked = metrics
        .top_discounted(&predicate)
        .expect("top discounted query")
        .into_iter()
        .map(|row| (row.discount_percent, row.price))
        .collect::<Vec<_>>();
    assert_eq!(
        ranked,
        [
            (Some(50.0), Some(100.0)),
            (Some(50.0), Some(200.0)),
            (Some(30.0), Some(50.0))
        ]
    );
}

#[test]
fn top_rated_requires_volume_and_rating() {
    let gateway = open_fixture("shelfscope-top-rated", PRODUCTS);
    let cache = QueryCache::new(gateway);
    let metrics = MetricsBuilder::new(&cache, CatalogTable::default());

    let ids = metrics
        .top_rated(&Predicate::all())
        .expect("top rated query")
        .into_iter()
        .map(|row| row.product_id)
        .collect::<Vec<_>>();
    assert_eq!(ids, ["p4", "p1"]);

    let min_rating = Predicate::from_selection(&selection(&[], 0, 4.6));
    let ids = metrics
        .top_rated(&min_rating)
        .expect("top rated query")
        .into_iter()
        .map(|row| row.product_id)
        .collect::<Vec<_>>();
    assert_eq!(ids, ["p4"]);
}

#[test]
fn dashboard_flags_unknown_brands_and_fills_every_section() {
    let gateway = open_fixture("shelfscope-dashboard", PRODUCTS);
    let cache = QueryCache::new(gateway);
    let metrics = MetricsBuilder::new(&cache, CatalogTable::default());

    let run = build_dashboard(&metrics, &selection(&["Drop Dead", "Nike"], 0, 0.0));
    assert!(run.failure.is_none());
    let report = run.report;
    assert_eq!(report.predicate, "1=1 AND brand IN ('Drop Dead','Nike')");
    assert_eq!(report.unknown_brands, ["Nike"]);
    assert_eq!(report.kpis.map(|kpis| kpis.products), Some(1));
    assert!(report.discount_bands.is_some());
    assert!(report.price_buckets.is_some());
    assert_eq!(report.top_discounted.map(|rows| rows.len()), Some(1));
    assert_eq!(report.top_rated.map(|rows| rows.len()), Some(1));
}

#[test]
fn missing_table_stops_the_render_at_the_first_query() {
    let gateway = open_fixture("shelfscope-missing-table", PRODUCTS);
    let cache = QueryCache::new(gateway);
    let table = CatalogTable::parse("catalog_items").expect("valid identifier");
    let metrics = MetricsBuilder::new(&cache, table);

    let run = build_dashboard(&metrics, &FilterSelection::default());
    let failure = run.failure.expect("query against a missing table must fail");
    assert_eq!(failure.query, "brands");
    assert_eq!(failure.source.code(), "query_execution_failed");
    assert!(run.report.kpis.is_none());
    assert!(run.report.top_rated.is_none());
}

#[test]
fn repeated_renders_within_ttl_reuse_cached_results() {
    let gateway = CountingGateway {
        inner: open_fixture("shelfscope-cache", PRODUCTS),
        calls: Cell::new(0),
    };
    let clock = ManualClock::default();
    let cache = QueryCache::with_clock(&gateway, &clock, Duration::from_secs(300));
    let metrics = MetricsBuilder::new(&cache, CatalogTable::default());
    let filters = selection(&["Puma"], 10, 0.0);

    let first = build_dashboard(&metrics, &filters);
    assert_eq!(gateway.calls.get(), 6);
    clock.advance(Duration::from_secs(120));
    let second = build_dashboard(&metrics, &filters);
    assert_eq!(gateway.calls.get(), 6);
    assert_eq!(first.report, second.report);

    build_dashboard(&metrics, &selection(&["Puma"], 20, 0.0));
    assert_eq!(gateway.calls.get(), 6 + 5, "brands list is shared across filters");

    clock.advance(Duration::from_secs(180));
    build_dashboard(&metrics, &filters);
    assert_eq!(gateway.calls.get(), 6 + 5 + 6);
}

#[test]
fn ranked_tables_accept_rating_totals_stored_as_real() {
    let dir = unique_temp_dir("shelfscope-real-totals");
    let path = dir.join("catalog.sqlite");
    let connection = Connection::open(&path).expect("catalog should be creatable");
    connection
        .execute_batch(
            "CREATE TABLE products (
                product_id TEXT, title TEXT, brand TEXT, price REAL, mrp REAL,
                discount_percent REAL, rating REAL, rating_total REAL
            );
            INSERT INTO products VALUES ('p1', 'Logo Tee', 'Puma', 200, 400, 50, 4.5, 150.0);
            INSERT INTO products VALUES ('p2', 'Slim Jeans', 'Levi''s', 50, 72, 30, 4.2, NULL);",
        )
        .expect("fixture should load");
    drop(connection);

    let cache = QueryCache::new(SqliteGateway::open(&path).expect("catalog should open"));
    let metrics = MetricsBuilder::new(&cache, CatalogTable::default());

    let discounted = metrics
        .top_discounted(&Predicate::all())
        .expect("top discounted query");
    let totals = discounted
        .iter()
        .map(|row| (row.product_id.as_str(), row.rating_total))
        .collect::<Vec<_>>();
    assert_eq!(totals, [("p1", Some(150)), ("p2", None)]);

    let rated = metrics.top_rated(&Predicate::all()).expect("top rated query");
    assert_eq!(rated.len(), 1);
    assert_eq!(rated[0].rating_total, Some(150));
}
