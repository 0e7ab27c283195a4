//! Quote assembly: resolve a rate, price the loan, annotate provenance.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::calculations::{AmortizationEngine, AmortizationError};
use crate::db::RepositoryError;
use crate::models::{FeeConfig, LoanQuote, Product, RateConvention};
use crate::resolver::{RateResolver, ResolveError};

/// Failures while assembling a quote.
#[derive(Debug, Error, PartialEq)]
pub enum QuoteError {
    /// No active rate is configured for this combination. An expected,
    /// presentable outcome ("not yet configured"), not a system failure.
    #[error("no rate configured for {product:?} term {term_months} year {vehicle_year}")]
    RateNotConfigured {
        product: Product,
        term_months: u32,
        vehicle_year: i32,
    },

    /// The requested term is not offered for the product.
    #[error("term {term_months} months is not offered for {product:?}")]
    InvalidTerm { product: Product, term_months: u32 },

    /// The schedule or effective-cost computation failed for this quote.
    #[error(transparent)]
    Calculation(#[from] AmortizationError),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<ResolveError> for QuoteError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::InvalidTerm {
                product,
                term_months,
            } => QuoteError::InvalidTerm {
                product,
                term_months,
            },
            ResolveError::Repository(e) => QuoteError::Repository(e),
        }
    }
}

/// Composes the resolver and the amortization engine into borrower-facing
/// quotes. Stateless beyond its collaborators; call freely from concurrent
/// tasks.
pub struct QuoteAssembler {
    resolver: RateResolver,
}

impl QuoteAssembler {
    pub fn new(resolver: RateResolver) -> Self {
        Self { resolver }
    }

    /// Price one loan: resolve the configured TNA for (product, year, term)
    /// and run the amortization engine with it. The result carries the
    /// source range id and whether the legacy fallback was used.
    pub async fn quote(
        &self,
        product: Product,
        vehicle_year: i32,
        principal: Decimal,
        term_months: u32,
        fees: &FeeConfig,
    ) -> Result<LoanQuote, QuoteError> {
        let matched = self
            .resolver
            .resolve(product, vehicle_year, term_months)
            .await?
            .ok_or(QuoteError::RateNotConfigured {
                product,
                term_months,
                vehicle_year,
            })?;

        let engine = AmortizationEngine::new(fees.clone());
        let result = engine.amortize(
            principal,
            term_months,
            matched.annual_rate,
            RateConvention::NominalAnnual,
        )?;

        Ok(LoanQuote {
            product,
            vehicle_year,
            principal,
            term_months,
            annual_rate: matched.annual_rate,
            convention: RateConvention::NominalAnnual,
            monthly_rate: result.monthly_rate,
            installments: result.installments,
            upfront_costs: result.upfront_costs,
            net_disbursement: result.net_disbursement,
            total_payable: result.total_payable,
            effective_annual_cost: result.effective_annual_cost,
            source_range_id: Some(matched.range_id),
            used_fallback: matched.fallback,
        })
    }

    /// Quote every allowed term for the product independently.
    ///
    /// A failure on one term (typically an unconfigured rate) is captured
    /// in that term's entry and never aborts the others. Keys ascend, so
    /// output order is deterministic regardless of evaluation order.
    pub async fn batch_quote(
        &self,
        product: Product,
        vehicle_year: i32,
        principal: Decimal,
        fees: &FeeConfig,
    ) -> BTreeMap<u32, Result<LoanQuote, QuoteError>> {
        let mut results = BTreeMap::new();
        for &term in product.allowed_terms() {
            let outcome = self
                .quote(product, vehicle_year, principal, term, fees)
                .await;
            results.insert(term, outcome);
        }
        results
    }
}
