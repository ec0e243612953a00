//! Fixed bucket boundaries shared by the SQL `CASE` expressions and the
//! in-process classifiers. Upper bounds are exclusive and evaluated in
//! declaration order; the first match wins.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiscountBand {
    #[serde(rename = "0%")]
    None,
    #[serde(rename = "0-20%")]
    UpTo20,
    #[serde(rename = "20-40%")]
    From20To40,
    #[serde(rename = "40-60%")]
    From40To60,
    #[serde(rename = "60%+")]
    Above60,
}

impl DiscountBand {
    pub const ALL: [Self; 5] = [
        Self::None,
        Self::UpTo20,
        Self::From20To40,
        Self::From40To60,
        Self::Above60,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "0%",
            Self::UpTo20 => "0-20%",
            Self::From20To40 => "20-40%",
            Self::From40To60 => "40-60%",
            Self::Above60 => "60%+",
        }
    }

    const fn rule(self) -> BucketRule {
        match self {
            Self::None => BucketRule::Equals(0.0),
            Self::UpTo20 => BucketRule::Below(20.0),
            Self::From20To40 => BucketRule::Below(40.0),
            Self::From40To60 => BucketRule::Below(60.0),
            Self::Above60 => BucketRule::Otherwise,
        }
    }

    #[must_use]
    pub fn classify(discount_percent: f64) -> Self {
        first_match(&Self::ALL, discount_percent, |band| band.rule())
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|band| band.label() == label)
    }

    /// `CASE` expression over `discount_percent` yielding the band label.
    #[must_use]
    pub fn case_sql() -> String {
        case_sql("discount_percent", &Self::ALL, |band| {
            (band.rule(), band.label())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PriceBucket {
    #[serde(rename = "<500")]
    Under500,
    #[serde(rename = "500-999")]
    From500,
    #[serde(rename = "1000-1999")]
    From1000,
    #[serde(rename = "2000-4999")]
    From2000,
    #[serde(rename = "5000+")]
    From5000,
}

impl PriceBucket {
    pub const ALL: [Self; 5] = [
        Self::Under500,
        Self::From500,
        Self::From1000,
        Self::From2000,
        Self::From5000,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Under500 => "<500",
            Self::From500 => "500-999",
            Self::From1000 => "1000-1999",
            Self::From2000 => "2000-4999",
            Self::From5000 => "5000+",
        }
    }

    const fn rule(self) -> BucketRule {
        match self {
            Self::Under500 => BucketRule::Below(500.0),
            Self::From500 => BucketRule::Below(1000.0),
            Self::From1000 => BucketRule::Below(2000.0),
            Self::From2000 => BucketRule::Below(5000.0),
            Self::From5000 => BucketRule::Otherwise,
        }
    }

    #[must_use]
    pub fn classify(price: f64) -> Self {
        first_match(&Self::ALL, price, |bucket| bucket.rule())
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|bucket| bucket.label() == label)
    }

    /// `CASE` expression over `price` yielding the bucket label.
    #[must_use]
    pub fn case_sql() -> String {
        case_sql("price", &Self::ALL, |bucket| (bucket.rule(), bucket.label()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BucketRule {
    Equals(f64),
    Below(f64),
    Otherwise,
}

impl BucketRule {
    fn matches(self, value: f64) -> bool {
        match self {
            Self::Equals(bound) => value == bound,
            Self::Below(bound) => value < bound,
            Self::Otherwise => true,
        }
    }

    fn sql_condition(self, column: &str) -> Option<String> {
        match self {
            Self::Equals(bound) => Some(format!("{column} = {}", sql_number(bound))),
            Self::Below(bound) => Some(format!("{column} < {}", sql_number(bound))),
            Self::Otherwise => None,
        }
    }
}

fn first_match<T: Copy>(buckets: &[T], value: f64, rule: impl Fn(T) -> BucketRule) -> T {
    buckets
        .iter()
        .copied()
        .find(|bucket| rule(*bucket).matches(value))
        .unwrap_or(buckets[buckets.len() - 1])
}

fn case_sql<T: Copy>(
    column: &str,
    buckets: &[T],
    describe: impl Fn(T) -> (BucketRule, &'static str),
) -> String {
    let mut sql = String::from("CASE");
    for bucket in buckets {
        let (rule, label) = describe(*bucket);
        match rule.sql_condition(column) {
            Some(condition) => sql.push_str(&format!(" WHEN {condition} THEN '{label}'")),
            None => sql.push_str(&format!(" ELSE '{label}'")),
        }
    }
    sql.push_str(" END");
    sql
}

fn sql_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
