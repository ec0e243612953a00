use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::filter::{DiscountBand, PriceBucket};
use crate::utils::de::{null_as_default, optional_integral};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    #[serde(default, deserialize_with = "null_as_default")]
    pub products: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub avg_price: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub avg_mrp: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub avg_discount_pct: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub no_discount_items: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandCount {
    pub band: String,
    pub items: u64,
}

impl BandCount {
    #[must_use]
    pub fn kind(&self) -> Option<DiscountBand> {
        DiscountBand::from_label(&self.band)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBucketStat {
    pub price_bucket: String,
    pub items: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub avg_discount_pct: f64,
}

impl PriceBucketStat {
    #[must_use]
    pub fn kind(&self) -> Option<PriceBucket> {
        PriceBucket::from_label(&self.price_bucket)
    }
}

/// One catalog product as shown in the ranked tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    #[serde(deserialize_with = "identifier_as_string")]
    pub product_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub mrp: Option<f64>,
    #[serde(default)]
    pub discount_percent: Option<f64>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "optional_integral")]
    pub rating_total: Option<i64>,
}

fn identifier_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "product_id must be text or number, got {other}"
        ))),
    }
}
