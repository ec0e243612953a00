pub mod bands;

use std::fmt::{Display, Formatter};

use serde::Serialize;

pub use bands::{DiscountBand, PriceBucket};

pub const MAX_MIN_DISCOUNT: u8 = 90;
pub const MAX_MIN_RATING: f64 = 5.0;
pub const TAUTOLOGY_CLAUSE: &str = "1=1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    EmptyBrand,
    DiscountOutOfRange(u32),
    RatingOutOfRange(String),
}

impl Display for FilterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyBrand => f.write_str("brand names must not be empty"),
            Self::DiscountOutOfRange(value) => write!(
                f,
                "min discount must be between 0 and {MAX_MIN_DISCOUNT}, got {value}"
            ),
            Self::RatingOutOfRange(value) => write!(
                f,
                "min rating must be between 0.0 and {MAX_MIN_RATING:.1}, got {value}"
            ),
        }
    }
}

impl std::error::Error for FilterError {}

/// User-facing filter controls, already range-checked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterSelection {
    brands: Vec<String>,
    min_discount: u8,
    min_rating: f64,
}

impl Default for FilterSelection {
    fn default() -> Self {
        Self {
            brands: Vec::new(),
            min_discount: 0,
            min_rating: 0.0,
        }
    }
}

impl FilterSelection {
    pub fn new(
        brands: impl IntoIterator<Item = impl Into<String>>,
        min_discount: u32,
        min_rating: f64,
    ) -> Result<Self, FilterError> {
        let mut selection = Self::default();
        selection.set_brands(brands)?;
        selection.set_min_discount(min_discount)?;
        selection.set_min_rating(min_rating)?;
        Ok(selection)
    }

    #[must_use]
    pub fn brands(&self) -> &[String] {
        &self.brands
    }

    #[must_use]
    pub const fn min_discount(&self) -> u8 {
        self.min_discount
    }

    #[must_use]
    pub const fn min_rating(&self) -> f64 {
        self.min_rating
    }

    /// Replaces the brand set. Duplicates collapse onto their first occurrence.
    pub fn set_brands(
        &mut self,
        brands: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), FilterError> {
        let mut deduped: Vec<String> = Vec::new();
        for brand in brands {
            let brand = brand.into();
            if brand.trim().is_empty() {
                return Err(FilterError::EmptyBrand);
            }
            if !deduped.contains(&brand) {
                deduped.push(brand);
            }
        }
        self.brands = deduped;
        Ok(())
    }

    pub fn set_min_discount(&mut self, min_discount: u32) -> Result<(), FilterError> {
        if min_discount > u32::from(MAX_MIN_DISCOUNT) {
            return Err(FilterError::DiscountOutOfRange(min_discount));
        }
        self.min_discount = min_discount as u8;
        Ok(())
    }

    /// Accepts 0.0..=5.0 and snaps to the slider's 0.1 step.
    pub fn set_min_rating(&mut self, min_rating: f64) -> Result<(), FilterError> {
        if !min_rating.is_finite() || !(0.0..=MAX_MIN_RATING).contains(&min_rating) {
            return Err(FilterError::RatingOutOfRange(min_rating.to_string()));
        }
        self.min_rating = (min_rating * 10.0).round() / 10.0;
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        self.brands.is_empty() && self.min_discount == 0 && self.min_rating <= 0.0
    }
}

/// Conjunction of filter clauses applied to the catalog table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Predicate {
    clauses: Vec<String>,
}

impl Predicate {
    #[must_use]
    pub fn from_selection(selection: &FilterSelection) -> Self {
        let mut clauses = vec![TAUTOLOGY_CLAUSE.to_string()];

        if !selection.brands.is_empty() {
            let brand_csv = selection
                .brands
                .iter()
                .map(|brand| sql_quote(brand))
                .collect::<Vec<_>>()
                .join(",");
            clauses.push(format!("brand IN ({brand_csv})"));
        }
        if selection.min_discount > 0 {
            clauses.push(format!("discount_percent >= {}", selection.min_discount));
        }
        if selection.min_rating > 0.0 {
            clauses.push(format!("rating >= {:.1}", selection.min_rating));
        }

        Self { clauses }
    }

    /// Predicate that matches every row.
    #[must_use]
    pub fn all() -> Self {
        Self::from_selection(&FilterSelection::default())
    }

    #[must_use]
    pub fn clauses(&self) -> &[String] {
        &self.clauses
    }

    /// Extends the conjunction with a fixed, trusted clause.
    #[must_use]
    pub fn and(&self, clause: &str) -> Self {
        let mut clauses = self.clauses.clone();
        clauses.push(clause.to_string());
        Self { clauses }
    }

    #[must_use]
    pub fn to_sql(&self) -> String {
        self.clauses.join(" AND ")
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Renders `value` as a single-quoted SQL string literal, doubling every
/// embedded single quote.
#[must_use]
pub fn sql_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
