use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::product::Product;

/// A configured interest-rate range.
///
/// States that `annual_rate` (a nominal annual rate, as a decimal fraction,
/// e.g. `0.60` for 60%) applies to `product` loans of `term_months` for
/// vehicles whose model year falls in the inclusive interval
/// `[year_from, year_to]`.
///
/// Active ranges sharing a `(product, term_months)` pair must have pairwise
/// disjoint year intervals; the repository enforces this atomically on every
/// insert and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRange {
    pub id: i64,
    pub product: Product,
    pub term_months: u32,
    pub year_from: i32,
    pub year_to: i32,
    pub annual_rate: Decimal,
    pub is_active: bool,
    /// Tie-break used only by the legacy unified table; kept on configured
    /// ranges for administrative parity but never consulted when resolving.
    pub priority: i32,
    pub name: Option<String>,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RateRange {
    /// Whether the inclusive year interval contains `year`.
    pub fn covers_year(&self, year: i32) -> bool {
        self.year_from <= year && year <= self.year_to
    }
}

/// Payload for creating a rate range. The repository assigns id and
/// timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRateRange {
    pub product: Product,
    pub term_months: u32,
    pub year_from: i32,
    pub year_to: i32,
    pub annual_rate: Decimal,
    pub is_active: bool,
    pub priority: i32,
    pub name: Option<String>,
    pub description: Option<String>,
    pub created_by: String,
}

/// Partial update for a rate range. `None` fields keep the stored value.
///
/// Product and term are deliberately not patchable: moving a range to a
/// different (product, term) bucket is a delete + create, which keeps the
/// overlap check simple to reason about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateRangePatch {
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub annual_rate: Option<Decimal>,
    pub is_active: Option<bool>,
    pub priority: Option<i32>,
    pub name: Option<Option<String>>,
    pub description: Option<Option<String>>,
}

impl RateRangePatch {
    /// The prospective row that would result from applying this patch.
    pub fn apply_to(&self, existing: &RateRange) -> RateRange {
        RateRange {
            year_from: self.year_from.unwrap_or(existing.year_from),
            year_to: self.year_to.unwrap_or(existing.year_to),
            annual_rate: self.annual_rate.unwrap_or(existing.annual_rate),
            is_active: self.is_active.unwrap_or(existing.is_active),
            priority: self.priority.unwrap_or(existing.priority),
            name: self.name.clone().unwrap_or_else(|| existing.name.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| existing.description.clone()),
            ..existing.clone()
        }
    }
}

/// A row of the legacy unified rate table.
///
/// Predates per-term configuration: the rate depends only on the vehicle
/// year, with `priority` (descending) breaking ties between overlapping
/// rows. Consulted only through the resolver's fallback path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyUnifiedRange {
    pub id: i64,
    pub year_from: i32,
    pub year_to: i32,
    pub annual_rate: Decimal,
    pub priority: i32,
    pub is_active: bool,
}

/// Identifies an existing range that blocks a write, as reported inside a
/// Conflict error so an administrator can locate and fix it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeOverlap {
    pub id: i64,
    pub year_from: i32,
    pub year_to: i32,
    pub name: Option<String>,
}

impl From<&RateRange> for RangeOverlap {
    fn from(range: &RateRange) -> Self {
        Self {
            id: range.id,
            year_from: range.year_from,
            year_to: range.year_to,
            name: range.name.clone(),
        }
    }
}

/// The outcome of a successful rate resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateMatch {
    /// Id of the matched row (a `rate_ranges` id, or a legacy table id when
    /// `fallback` is set).
    pub range_id: i64,
    /// Nominal annual rate (TNA) to price with.
    pub annual_rate: Decimal,
    /// True when the rate came from the legacy unified table rather than a
    /// product/term-specific range, so callers can surface "approximate
    /// general rate used".
    pub fallback: bool,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn sample_range() -> RateRange {
        RateRange {
            id: 7,
            product: Product::Auto,
            term_months: 12,
            year_from: 2015,
            year_to: 2020,
            annual_rate: dec!(0.60),
            is_active: true,
            priority: 0,
            name: Some("mid fleet".to_string()),
            description: None,
            created_by: "admin".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn covers_year_is_inclusive_on_both_bounds() {
        let range = sample_range();
        assert!(range.covers_year(2015));
        assert!(range.covers_year(2018));
        assert!(range.covers_year(2020));
        assert!(!range.covers_year(2014));
        assert!(!range.covers_year(2021));
    }

    #[test]
    fn patch_overrides_only_provided_fields() {
        let existing = sample_range();
        let patch = RateRangePatch {
            year_to: Some(2022),
            annual_rate: Some(dec!(0.55)),
            ..Default::default()
        };

        let merged = patch.apply_to(&existing);

        assert_eq!(merged.year_from, 2015);
        assert_eq!(merged.year_to, 2022);
        assert_eq!(merged.annual_rate, dec!(0.55));
        assert_eq!(merged.is_active, existing.is_active);
        assert_eq!(merged.name, existing.name);
        assert_eq!(merged.id, existing.id);
    }

    #[test]
    fn patch_can_clear_optional_fields() {
        let existing = sample_range();
        let patch = RateRangePatch {
            name: Some(None),
            ..Default::default()
        };

        let merged = patch.apply_to(&existing);

        assert_eq!(merged.name, None);
    }

    #[test]
    fn overlap_summary_carries_bounds_and_name() {
        let range = sample_range();
        let overlap = RangeOverlap::from(&range);

        assert_eq!(overlap.id, 7);
        assert_eq!(overlap.year_from, 2015);
        assert_eq!(overlap.year_to, 2020);
        assert_eq!(overlap.name.as_deref(), Some("mid fleet"));
    }
}
