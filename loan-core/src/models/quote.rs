use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::product::{Product, RateConvention};

/// Fees and taxes mixed into a loan quote.
///
/// Percentages are decimal fractions (`0.21` for 21%). The two `_pct` fee
/// fields and the stamp tax are charged once, upfront, against the
/// disbursement; the insurance fields are flat monthly add-ons appended to
/// every installment without participating in the interest/principal split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeConfig {
    /// VAT charged on the interest component of each installment only.
    pub vat_on_interest_pct: Decimal,
    /// Origination fee as a fraction of principal, deducted upfront.
    pub origination_fee_pct: Decimal,
    /// Fixed origination charge, deducted upfront.
    pub origination_fee_fixed: Decimal,
    /// Stamp tax as a fraction of principal, deducted upfront.
    pub stamp_tax_pct: Decimal,
    /// Life insurance premium per month, as a fraction of principal.
    pub life_insurance_monthly_pct: Decimal,
    /// Fixed vehicle insurance amount per month.
    pub vehicle_insurance_monthly: Decimal,
}

impl FeeConfig {
    /// A configuration with every fee and tax at zero.
    pub fn zero() -> Self {
        Self {
            vat_on_interest_pct: Decimal::ZERO,
            origination_fee_pct: Decimal::ZERO,
            origination_fee_fixed: Decimal::ZERO,
            stamp_tax_pct: Decimal::ZERO,
            life_insurance_monthly_pct: Decimal::ZERO,
            vehicle_insurance_monthly: Decimal::ZERO,
        }
    }
}

/// One row of an amortization schedule. All amounts are rounded to the
/// smallest currency unit (2 decimal places, half-up) at materialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    /// 1-based period index.
    pub period: u32,
    /// Interest accrued on the balance outstanding at the start of the
    /// period.
    pub interest: Decimal,
    /// Principal repaid this period.
    pub principal: Decimal,
    /// VAT on the interest component.
    pub vat: Decimal,
    /// Flat monthly add-ons (insurance).
    pub add_ons: Decimal,
    /// Total payable this period.
    pub total: Decimal,
    /// Balance outstanding after this period's principal payment.
    pub balance: Decimal,
}

/// A fully priced loan: the installment schedule plus summary totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanQuote {
    pub product: Product,
    pub vehicle_year: i32,
    /// Gross disbursement (the financed principal).
    pub principal: Decimal,
    pub term_months: u32,
    /// Annual rate the quote was priced from, in `convention`.
    pub annual_rate: Decimal,
    pub convention: RateConvention,
    /// Periodic (monthly) rate derived from `annual_rate`.
    pub monthly_rate: Decimal,
    /// Ordered schedule, one row per period.
    pub installments: Vec<Installment>,
    /// Upfront fees and taxes withheld from the disbursement.
    pub upfront_costs: Decimal,
    /// Amount actually delivered to the borrower.
    pub net_disbursement: Decimal,
    /// Sum of every installment total.
    pub total_payable: Decimal,
    /// Effective annual financing cost (CFT), all fees and taxes included.
    pub effective_annual_cost: Decimal,
    /// Id of the rate range the rate came from, when resolved from
    /// configuration.
    pub source_range_id: Option<i64>,
    /// True when the rate came from the legacy unified table.
    pub used_fallback: bool,
}

impl LoanQuote {
    /// Constant installment amount (every period's total except, at most, a
    /// sub-cent residual on the last one). Zero for an empty schedule.
    pub fn monthly_payment(&self) -> Decimal {
        self.installments
            .first()
            .map(|row| row.total)
            .unwrap_or(Decimal::ZERO)
    }

    /// The summary fields a loan application snapshots at submission time.
    pub fn summary(&self) -> QuoteSummary {
        QuoteSummary {
            principal: self.principal,
            term_months: self.term_months,
            monthly_payment: self.monthly_payment(),
            total_payable: self.total_payable,
            annual_rate: self.annual_rate,
            effective_annual_cost: self.effective_annual_cost,
        }
    }
}

/// Immutable snapshot of a quote's headline figures, stored by the external
/// loan-application record for audit. Never read back by this subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSummary {
    pub principal: Decimal,
    pub term_months: u32,
    pub monthly_payment: Decimal,
    pub total_payable: Decimal,
    pub annual_rate: Decimal,
    pub effective_annual_cost: Decimal,
}
