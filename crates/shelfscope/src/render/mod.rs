//! Plain-text layout of dashboard sections and insight packs.

use std::fmt::Write as _;

use serde_json::Value;

use crate::metrics::{DashboardReport, KpiSummary, ProductRow};
use crate::packs::{InsightPack, PackLoad};

pub const BAR_WIDTH: usize = 30;
pub const UNREADABLE_PACK_MESSAGE: &str = "Could not read this pack.";

#[must_use]
pub fn no_data_message(section: &str) -> String {
    format!("No data for {section} with the current filters.")
}

#[must_use]
pub fn render_dashboard(report: &DashboardReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "filter: {}", report.predicate);
    if let Some(brands) = &report.available_brands {
        let _ = writeln!(out, "brands available: {}", brands.len());
    }
    for brand in &report.unknown_brands {
        let _ = writeln!(out, "warning: brand `{brand}` is not in the catalog");
    }

    if let Some(kpis) = &report.kpis {
        out.push('\n');
        out.push_str(&render_kpis(kpis));
    }
    if let Some(bands) = &report.discount_bands {
        let bars = bands
            .iter()
            .map(|band| (band.band.clone(), band.items as f64))
            .collect::<Vec<_>>();
        out.push('\n');
        out.push_str(&render_bar_chart("Discount bands", &bars, 0));
    }
    if let Some(buckets) = &report.price_buckets {
        let items = buckets
            .iter()
            .map(|bucket| (bucket.price_bucket.clone(), bucket.items as f64))
            .collect::<Vec<_>>();
        let discounts = buckets
            .iter()
            .map(|bucket| (bucket.price_bucket.clone(), bucket.avg_discount_pct))
            .collect::<Vec<_>>();
        out.push('\n');
        out.push_str(&render_bar_chart("Price buckets", &items, 0));
        out.push('\n');
        out.push_str(&render_bar_chart("Avg discount by price bucket", &discounts, 2));
    }
    if let Some(rows) = &report.top_discounted {
        out.push('\n');
        out.push_str(&render_product_table("Top discounted (50)", rows));
    }
    if let Some(rows) = &report.top_rated {
        out.push('\n');
        out.push_str(&render_product_table("Top rated by volume (50)", rows));
    }
    out
}

#[must_use]
pub fn render_kpis(kpis: &KpiSummary) -> String {
    let tiles = [
        ("Products", kpis.products.to_string()),
        ("Avg Price", format!("{:.2}", kpis.avg_price)),
        ("Avg MRP", format!("{:.2}", kpis.avg_mrp)),
        ("Avg Discount %", format!("{:.2}", kpis.avg_discount_pct)),
        ("No-discount Items", kpis.no_discount_items.to_string()),
    ];
    let line = tiles
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join(" | ");
    format!("{line}\n")
}

/// Horizontal bars scaled to the largest value. `decimals` controls how the
/// value after each bar is printed.
#[must_use]
pub fn render_bar_chart(title: &str, bars: &[(String, f64)], decimals: usize) -> String {
    let mut out = format!("## {title}\n");
    if bars.is_empty() {
        let _ = writeln!(out, "{}", no_data_message(&title.to_lowercase()));
        return out;
    }

    let label_width = bars.iter().map(|(label, _)| label.chars().count()).max().unwrap_or(0);
    let max_value = bars.iter().map(|(_, value)| *value).fold(0.0_f64, f64::max);
    for (label, value) in bars {
        let length = if max_value > 0.0 && *value > 0.0 {
            ((value / max_value) * BAR_WIDTH as f64).round().max(1.0) as usize
        } else {
            0
        };
        let _ = writeln!(
            out,
            "{label:<label_width$} | {} {value:.decimals$}",
            "#".repeat(length)
        );
    }
    out
}

#[must_use]
pub fn render_product_table(title: &str, rows: &[ProductRow]) -> String {
    let mut out = format!("## {title}\n");
    if rows.is_empty() {
        let _ = writeln!(out, "{}", no_data_message(&title.to_lowercase()));
        return out;
    }

    let headers = [
        "product_id",
        "title",
        "brand",
        "price",
        "mrp",
        "discount_percent",
        "rating",
        "rating_total",
    ]
    .map(str::to_string);
    let body = rows
        .iter()
        .map(|row| {
            vec![
                row.product_id.clone(),
                row.title.clone().unwrap_or_default(),
                row.brand.clone().unwrap_or_default(),
                optional_number(row.price),
                optional_number(row.mrp),
                optional_number(row.discount_percent),
                optional_number(row.rating),
                row.rating_total.map(|total| total.to_string()).unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    out.push_str(&render_table(&headers, &body));
    out
}

fn optional_number(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_default()
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

/// Left-aligned columns separated by two spaces, trailing blanks trimmed.
#[must_use]
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count())
        .collect::<Vec<_>>();
    for row in rows {
        for (index, cell) in row.iter().enumerate().take(widths.len()) {
            widths[index] = widths[index].max(cell.chars().count());
        }
    }

    let format_line = |cells: &[String]| {
        let line = widths
            .iter()
            .enumerate()
            .map(|(index, &width)| {
                let cell = cells.get(index).map(String::as_str).unwrap_or_default();
                format!("{cell:<width$}")
            })
            .collect::<Vec<_>>()
            .join("  ");
        format!("{}\n", line.trim_end())
    };

    let mut out = format_line(headers);
    let rule = widths
        .iter()
        .map(|width| "-".repeat(*width))
        .collect::<Vec<_>>();
    out.push_str(&format_line(&rule));
    for row in rows {
        out.push_str(&format_line(row));
    }
    out
}

/// One pack column: bullets, KPIs as JSON, then each named table.
#[must_use]
pub fn render_pack(label: &str, column: usize, load: &PackLoad) -> String {
    let mut out = format!("### {label} [column {}]\n", column + 1);
    if load.is_blank() {
        let _ = writeln!(out, "warning: {UNREADABLE_PACK_MESSAGE}");
        if let PackLoad::Unreadable { reason } = load {
            let _ = writeln!(out, "  reason: {reason}");
        }
        return out;
    }
    out.push_str(&render_pack_body(&load.pack()));
    out
}

fn render_pack_body(pack: &InsightPack) -> String {
    let mut out = String::new();
    for bullet in &pack.bullets {
        let _ = writeln!(out, "• {bullet}");
    }

    if !pack.kpis.is_empty() {
        let kpis = serde_json::to_string_pretty(&pack.kpis).unwrap_or_default();
        let _ = writeln!(out, "Insight KPIs (JSON):\n{kpis}");
    }

    for table in &pack.tables {
        let _ = writeln!(out, "{}", title_case(&table.name));
        let mut headers: Vec<String> = Vec::new();
        for row in &table.rows {
            for key in row.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }
        let body = table
            .rows
            .iter()
            .map(|row| {
                headers
                    .iter()
                    .map(|header| row.get(header).map(cell_text).unwrap_or_default())
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        out.push_str(&render_table(&headers, &body));
    }
    out
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Number(number) => number
            .as_f64()
            .filter(|_| number.is_f64())
            .map_or_else(|| number.to_string(), format_number),
        other => other.to_string(),
    }
}

/// `top_brands_by_discount` becomes `Top Brands By Discount`. Each underscore
/// becomes one space; a letter is capitalised when the character before it
/// is not a letter.
#[must_use]
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut after_letter = false;
    for ch in name.chars() {
        let ch = if ch == '_' { ' ' } else { ch };
        if after_letter {
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_uppercase());
        }
        after_letter = ch.is_alphabetic();
    }
    out
}
