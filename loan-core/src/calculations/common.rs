//! Shared numeric conventions for loan pricing.
//!
//! Holds the rounding policy and the day-count constants used to convert a
//! nominal annual rate into a periodic one. Everything here is a single
//! source of truth: no other module restates these values.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Days assumed per installment period under the 30/365 convention.
pub const DAYS_PER_PERIOD: Decimal = dec!(30);

/// Days assumed per year under the 30/365 convention.
///
/// 365 is the canonical divisor; a 360-day variant existed historically and
/// was retired.
pub const DAYS_PER_YEAR: Decimal = dec!(365);

/// Rounds a decimal value to exactly two decimal places using half-up rounding.
///
/// This follows standard financial rounding conventions where values at exactly
/// 0.005 are rounded up to 0.01 (away from zero). Applied only when a schedule
/// row or summary total is materialized, never to intermediate rates or the
/// running balance.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use loan_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(123.454)), dec!(123.45));
/// assert_eq!(round_half_up(dec!(123.455)), dec!(123.46));
/// assert_eq!(round_half_up(dec!(-123.455)), dec!(-123.46)); // Away from zero
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}
