//! French (constant-installment) amortization and effective-cost math.
//!
//! Turns a principal, a term and an annual rate into a full installment
//! schedule plus summary totals. All arithmetic is `Decimal`; the running
//! balance and the periodic rate are kept at full precision and amounts are
//! rounded to the cent only when a schedule row is materialized.
//!
//! # Schedule shape
//!
//! | Component | Rule |
//! |-----------|------|
//! | base installment | `P * i / (1 - (1 + i)^-n)`; exactly `P / n` when `i = 0` |
//! | interest_k | exact outstanding balance × periodic rate |
//! | principal_k | `base - interest_k`; the final period absorbs the rounding residual |
//! | VAT | charged on the interest component only |
//! | add-ons | flat monthly insurance amounts, outside the interest/principal split |
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use loan_core::calculations::{AmortizationEngine};
//! use loan_core::models::{FeeConfig, RateConvention};
//!
//! let engine = AmortizationEngine::new(FeeConfig::zero());
//!
//! // Zero rate: every installment is exactly principal / n.
//! let result = engine
//!     .amortize(dec!(2400000), 24, dec!(0), RateConvention::NominalAnnual)
//!     .unwrap();
//! assert_eq!(result.installments[0].total, dec!(100000.00));
//! assert_eq!(result.installments[23].total, dec!(100000.00));
//! ```

use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::calculations::common::{DAYS_PER_PERIOD, DAYS_PER_YEAR, round_half_up};
use crate::calculations::irr::{IrrError, periodic_irr};
use crate::models::{FeeConfig, Installment, RateConvention};

/// Errors that can occur while pricing a single loan. Fatal only to that
/// computation; the engine itself is stateless.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmortizationError {
    /// The principal must be strictly positive.
    #[error("principal must be positive, got {0}")]
    NonPositivePrincipal(Decimal),

    /// The term must be at least one period.
    #[error("term must be at least one month")]
    ZeroTerm,

    /// The annual rate must be non-negative.
    #[error("rate must be non-negative, got {0}")]
    NegativeRate(Decimal),

    /// A fee or tax percentage/amount was negative.
    #[error("fee configuration value must be non-negative, got {0}")]
    NegativeFee(Decimal),

    /// Upfront deductions consumed the entire disbursement.
    #[error("upfront costs {upfront} leave no positive net disbursement from {principal}")]
    NoNetDisbursement { principal: Decimal, upfront: Decimal },

    /// The effective-cost solve failed.
    #[error("effective annual cost: {0}")]
    EffectiveCost(#[from] IrrError),
}

/// Schedule and totals produced by [`AmortizationEngine::amortize`].
///
/// Carries no product or provenance information; the quote assembler wraps
/// this into a full [`crate::models::LoanQuote`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationResult {
    /// Periodic (monthly) rate the schedule was generated with, at full
    /// precision.
    pub monthly_rate: Decimal,
    /// One row per period, amounts rounded to the cent.
    pub installments: Vec<Installment>,
    /// Fees and taxes withheld from the disbursement, rounded.
    pub upfront_costs: Decimal,
    /// `principal - upfront_costs`, rounded.
    pub net_disbursement: Decimal,
    /// Sum of every installment total.
    pub total_payable: Decimal,
    /// Effective annual financing cost (CFT): the annualized internal rate
    /// of the net disbursement against the installment stream. Unrounded;
    /// it is a rate, not a currency amount.
    pub effective_annual_cost: Decimal,
}

/// Stateless calculator for constant-installment loan schedules.
///
/// Construct one per fee/tax configuration and call
/// [`amortize`](Self::amortize) freely from any number of threads; the
/// engine only reads its configuration.
#[derive(Debug, Clone)]
pub struct AmortizationEngine {
    fees: FeeConfig,
}

impl AmortizationEngine {
    pub fn new(fees: FeeConfig) -> Self {
        Self { fees }
    }

    pub fn fees(&self) -> &FeeConfig {
        &self.fees
    }

    /// Price a loan: generate the installment schedule, the upfront-cost
    /// breakdown and the effective annual cost.
    ///
    /// `annual_rate` is interpreted under `convention` (a monthly rate is
    /// accepted as-is despite the parameter name).
    ///
    /// # Errors
    ///
    /// Returns [`AmortizationError`] for non-positive principal, a zero
    /// term, a negative rate, negative fee configuration, upfront costs
    /// that consume the whole disbursement, or an effective-cost solve
    /// that fails to converge.
    pub fn amortize(
        &self,
        principal: Decimal,
        term_months: u32,
        annual_rate: Decimal,
        convention: RateConvention,
    ) -> Result<AmortizationResult, AmortizationError> {
        self.validate(principal, term_months, annual_rate)?;

        let monthly_rate = monthly_rate(annual_rate, convention);
        let installments = self.build_schedule(principal, term_months, monthly_rate);

        let upfront_exact = self.upfront_costs(principal);
        let net_exact = principal - upfront_exact;
        if net_exact <= Decimal::ZERO {
            warn!(
                %principal,
                upfront = %upfront_exact,
                "upfront costs consume the entire disbursement"
            );
            return Err(AmortizationError::NoNetDisbursement {
                principal,
                upfront: round_half_up(upfront_exact),
            });
        }

        let net_disbursement = round_half_up(net_exact);
        let total_payable = installments
            .iter()
            .map(|row| row.total)
            .sum::<Decimal>();

        let effective_annual_cost =
            self.effective_annual_cost(net_disbursement, &installments)?;

        Ok(AmortizationResult {
            monthly_rate,
            installments,
            upfront_costs: round_half_up(upfront_exact),
            net_disbursement,
            total_payable,
            effective_annual_cost,
        })
    }

    fn validate(
        &self,
        principal: Decimal,
        term_months: u32,
        annual_rate: Decimal,
    ) -> Result<(), AmortizationError> {
        if principal <= Decimal::ZERO {
            return Err(AmortizationError::NonPositivePrincipal(principal));
        }
        if term_months == 0 {
            return Err(AmortizationError::ZeroTerm);
        }
        if annual_rate < Decimal::ZERO {
            return Err(AmortizationError::NegativeRate(annual_rate));
        }
        for value in [
            self.fees.vat_on_interest_pct,
            self.fees.origination_fee_pct,
            self.fees.origination_fee_fixed,
            self.fees.stamp_tax_pct,
            self.fees.life_insurance_monthly_pct,
            self.fees.vehicle_insurance_monthly,
        ] {
            if value < Decimal::ZERO {
                return Err(AmortizationError::NegativeFee(value));
            }
        }
        Ok(())
    }

    /// Generate the schedule. The balance used for interest accrual stays
    /// at full precision; each row's amounts are rounded as they are
    /// materialized, and the final row's principal is the difference
    /// between the full principal and everything already presented, so the
    /// principal column always sums exactly to the principal.
    fn build_schedule(
        &self,
        principal: Decimal,
        term_months: u32,
        monthly_rate: Decimal,
    ) -> Vec<Installment> {
        let base = base_installment(principal, monthly_rate, term_months);
        let add_ons_exact =
            self.fees.life_insurance_monthly_pct * principal + self.fees.vehicle_insurance_monthly;
        let add_ons = round_half_up(add_ons_exact);

        let mut rows = Vec::with_capacity(term_months as usize);
        let mut exact_balance = principal;
        let mut presented_principal = Decimal::ZERO;

        for period in 1..=term_months {
            let interest_exact = exact_balance * monthly_rate;
            let principal_exact = base - interest_exact;
            exact_balance -= principal_exact;

            let interest = round_half_up(interest_exact);
            let vat = round_half_up(interest_exact * self.fees.vat_on_interest_pct);
            let principal_component = if period == term_months {
                principal - presented_principal
            } else {
                round_half_up(principal_exact)
            };
            presented_principal += principal_component;

            let total = principal_component + interest + vat + add_ons;
            rows.push(Installment {
                period,
                interest,
                principal: principal_component,
                vat,
                add_ons,
                total,
                balance: principal - presented_principal,
            });
        }

        rows
    }

    /// Fees and taxes deducted from the gross disbursement before the
    /// borrower receives anything.
    fn upfront_costs(&self, principal: Decimal) -> Decimal {
        self.fees.origination_fee_pct * principal
            + self.fees.origination_fee_fixed
            + self.fees.stamp_tax_pct * principal
    }

    /// Solve the CFT: the annualized internal rate of
    /// `{-net_disbursement, total_1, ..., total_n}`.
    fn effective_annual_cost(
        &self,
        net_disbursement: Decimal,
        installments: &[Installment],
    ) -> Result<Decimal, AmortizationError> {
        let mut cash_flows = Vec::with_capacity(installments.len() + 1);
        cash_flows.push(-net_disbursement);
        cash_flows.extend(installments.iter().map(|row| row.total));

        let monthly = periodic_irr(&cash_flows)?;
        Ok((Decimal::ONE + monthly).powi(12) - Decimal::ONE)
    }
}

/// Normalize an annual rate to a periodic (monthly) one.
///
/// * `Monthly` — used as given.
/// * `EffectiveAnnual` — `(1 + rate)^(1/12) - 1`.
/// * `NominalAnnual` — `rate * 30/365` (see
///   [`crate::calculations::common`] for the day-count constants).
pub fn monthly_rate(annual_rate: Decimal, convention: RateConvention) -> Decimal {
    match convention {
        RateConvention::Monthly => annual_rate,
        RateConvention::EffectiveAnnual => {
            (Decimal::ONE + annual_rate).powd(Decimal::ONE / dec!(12)) - Decimal::ONE
        }
        RateConvention::NominalAnnual => annual_rate * DAYS_PER_PERIOD / DAYS_PER_YEAR,
    }
}

/// Constant installment for a principal `p` at periodic rate `i` over `n`
/// periods. The zero-rate case is an explicit branch: the general formula
/// would divide by zero.
fn base_installment(p: Decimal, i: Decimal, n: u32) -> Decimal {
    if i.is_zero() {
        return p / Decimal::from(n);
    }
    let discount = Decimal::ONE - (Decimal::ONE + i).powi(-i64::from(n));
    p * i / discount
}
