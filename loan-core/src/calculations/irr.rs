//! Internal-rate-of-return solving for effective-cost computation.
//!
//! Finds the periodic rate at which a cash-flow stream's net present value
//! is zero, using Newton-Raphson with a bisection fallback. Both phases run
//! a fixed iteration budget, so the solver always terminates.

use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use thiserror::Error;

/// Convergence tolerance on the periodic rate.
const RATE_TOLERANCE: Decimal = dec!(0.0000000001);

/// A net present value this close to zero counts as a root.
const NPV_TOLERANCE: Decimal = dec!(0.0000000001);

/// Iteration budget for the Newton phase.
const NEWTON_MAX_ITERATIONS: u32 = 100;

/// Iteration budget for the bisection fallback.
const BISECTION_MAX_ITERATIONS: u32 = 200;

/// Bracket for the periodic rate. -50% to +200% per period comfortably
/// contains any rate a loan product can produce while keeping the discount
/// factors representable.
const RATE_LOWER_BOUND: Decimal = dec!(-0.5);
const RATE_UPPER_BOUND: Decimal = dec!(2);

/// Errors from the IRR solver.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IrrError {
    /// The cash-flow stream was empty.
    #[error("no cash flows provided")]
    NoCashFlows,

    /// All flows share one sign (or are zero), so no rate can discount them
    /// to zero.
    #[error("cash flows never change sign; no internal rate exists")]
    NoSignChange,

    /// Neither Newton-Raphson nor bisection found a root within the
    /// iteration budget and rate bracket.
    #[error("IRR solve did not converge within the iteration budget")]
    NonConvergence,
}

/// Solve for the periodic internal rate of return of `cash_flows`, where
/// index 0 is the flow at time zero (typically negative: the net amount
/// disbursed) and each subsequent entry is one period later.
///
/// Returns the periodic rate; callers annualize it themselves.
pub fn periodic_irr(cash_flows: &[Decimal]) -> Result<Decimal, IrrError> {
    if cash_flows.is_empty() {
        return Err(IrrError::NoCashFlows);
    }

    if cash_flows.iter().all(|cf| cf.abs() < NPV_TOLERANCE) {
        return Ok(Decimal::ZERO);
    }

    let has_positive = cash_flows.iter().any(|cf| *cf > NPV_TOLERANCE);
    let has_negative = cash_flows.iter().any(|cf| *cf < -NPV_TOLERANCE);
    if !has_positive || !has_negative {
        return Err(IrrError::NoSignChange);
    }

    // Newton-Raphson from a mild positive guess.
    let mut rate = dec!(0.05);
    for _ in 0..NEWTON_MAX_ITERATIONS {
        let (npv, dnpv) = npv_and_derivative(cash_flows, rate);

        if dnpv.abs() < NPV_TOLERANCE {
            // Flat derivative; Newton cannot make progress here.
            return bisection(cash_flows);
        }

        let next = (rate - npv / dnpv)
            .clamp(RATE_LOWER_BOUND, RATE_UPPER_BOUND);

        if (next - rate).abs() < RATE_TOLERANCE {
            return Ok(next);
        }
        rate = next;
    }

    bisection(cash_flows)
}

/// Net present value of `cash_flows` at a periodic `rate`, together with
/// its derivative with respect to the rate.
///
/// Discount factors are accumulated multiplicatively; if a factor grows
/// beyond `Decimal` range the remaining flows discount to nothing and the
/// loop stops.
fn npv_and_derivative(cash_flows: &[Decimal], rate: Decimal) -> (Decimal, Decimal) {
    let one_plus = Decimal::ONE + rate;
    let mut npv = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;
    let mut factor = Decimal::ONE; // (1 + rate)^t

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            match factor.checked_mul(one_plus) {
                Some(next) if !next.is_zero() => factor = next,
                _ => break,
            }
        }
        npv += cf / factor;
        if t > 0 {
            dnpv -= Decimal::from(t as u32) * cf / (factor * one_plus);
        }
    }

    (npv, dnpv)
}

fn npv_at_rate(cash_flows: &[Decimal], rate: Decimal) -> Decimal {
    npv_and_derivative(cash_flows, rate).0
}

/// Bisection fallback over the fixed rate bracket.
fn bisection(cash_flows: &[Decimal]) -> Result<Decimal, IrrError> {
    let mut low = RATE_LOWER_BOUND;
    let mut high = RATE_UPPER_BOUND;
    let two = dec!(2);

    let npv_low = npv_at_rate(cash_flows, low);
    let npv_high = npv_at_rate(cash_flows, high);
    if npv_low.is_sign_positive() == npv_high.is_sign_positive() {
        return Err(IrrError::NonConvergence);
    }

    for _ in 0..BISECTION_MAX_ITERATIONS {
        let mid = (low + high) / two;
        let npv_mid = npv_at_rate(cash_flows, mid);

        if npv_mid.abs() < NPV_TOLERANCE || (high - low) / two < RATE_TOLERANCE {
            return Ok(mid);
        }

        if npv_mid.is_sign_positive() == npv_at_rate(cash_flows, low).is_sign_positive() {
            low = mid;
        } else {
            high = mid;
        }
    }

    Err(IrrError::NonConvergence)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn assert_close(actual: Decimal, expected: Decimal, tolerance: Decimal) {
        assert!(
            (actual - expected).abs() < tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn empty_stream_is_rejected() {
        assert_eq!(periodic_irr(&[]), Err(IrrError::NoCashFlows));
    }

    #[test]
    fn all_zero_flows_have_zero_irr() {
        let flows = vec![dec!(0), dec!(0), dec!(0)];
        assert_eq!(periodic_irr(&flows), Ok(dec!(0)));
    }

    #[test]
    fn same_sign_flows_are_rejected() {
        let flows = vec![dec!(100), dec!(100), dec!(100)];
        assert_eq!(periodic_irr(&flows), Err(IrrError::NoSignChange));
    }

    #[test]
    fn single_period_repayment_has_exact_rate() {
        // -1000 now, 1100 in one period: the rate is exactly 10%.
        let flows = vec![dec!(-1000), dec!(1100)];
        let rate = periodic_irr(&flows).unwrap();
        assert_close(rate, dec!(0.10), dec!(0.000000001));
    }

    #[test]
    fn break_even_stream_has_zero_rate() {
        let flows = vec![dec!(-1000), dec!(250), dec!(250), dec!(250), dec!(250)];
        let rate = periodic_irr(&flows).unwrap();
        assert_close(rate, dec!(0), dec!(0.000000001));
    }

    #[test]
    fn recovers_the_rate_of_a_level_annuity() {
        // 24 level payments priced at i = 0.60 * 30/365 exactly reproduce i.
        let i = dec!(0.60) * dec!(30) / dec!(365);
        let payment = dec!(359944.0405348265385519635092);
        let mut flows = vec![dec!(-5000000)];
        flows.extend(std::iter::repeat_n(payment, 24));

        let rate = periodic_irr(&flows).unwrap();

        assert_close(rate, i, dec!(0.00000001));
    }

    #[test]
    fn upfront_fees_raise_the_rate_above_the_nominal_one() {
        let i = dec!(0.60) * dec!(30) / dec!(365);
        let payment = dec!(359944.0405348265385519635092);
        // 3% of principal withheld upfront.
        let mut flows = vec![dec!(-4850000)];
        flows.extend(std::iter::repeat_n(payment, 24));

        let rate = periodic_irr(&flows).unwrap();

        assert!(rate > i, "rate {rate} should exceed nominal {i}");
    }
}
