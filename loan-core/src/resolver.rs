//! Rate resolution: which configured rate applies to a loan request.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::db::{RateRepository, RepositoryError};
use crate::models::{Product, RateMatch};

/// Which products may fall back to the legacy unified rate table when no
/// product/term-specific range covers the vehicle year.
///
/// The fallback is an injected capability rather than a hard-coded product
/// branch so it can be retired independently of the resolution logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackPolicy {
    legacy_products: Vec<Product>,
}

impl FallbackPolicy {
    /// The production policy: only AUTO may use the legacy table.
    pub fn auto_only() -> Self {
        Self {
            legacy_products: vec![Product::Auto],
        }
    }

    /// No product falls back; unmatched lookups are simply not found.
    pub fn disabled() -> Self {
        Self {
            legacy_products: Vec::new(),
        }
    }

    pub fn permits(&self, product: Product) -> bool {
        self.legacy_products.contains(&product)
    }
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::auto_only()
    }
}

/// Failures while resolving a rate. "No rate configured" is not an error:
/// [`RateResolver::resolve`] returns `Ok(None)` for that expected outcome.
#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    /// The requested term is not offered for the product. Rejected before
    /// any storage access.
    #[error("term {term_months} months is not offered for {product:?}")]
    InvalidTerm { product: Product, term_months: u32 },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Pure lookup over the configured rate ranges.
///
/// Reads immutable configuration only; safe to share across any number of
/// concurrent callers.
pub struct RateResolver {
    repo: Arc<dyn RateRepository>,
    fallback: FallbackPolicy,
}

impl RateResolver {
    pub fn new(repo: Arc<dyn RateRepository>, fallback: FallbackPolicy) -> Self {
        Self { repo, fallback }
    }

    /// Find the single applicable rate for (product, vehicle year, term).
    ///
    /// Resolution order:
    /// 1. An active product/term-specific range covering the year.
    /// 2. If the fallback policy permits the product, the highest-priority
    ///    active legacy unified row covering the year (term ignored),
    ///    returned with `fallback = true`.
    /// 3. `Ok(None)` — nothing configured.
    pub async fn resolve(
        &self,
        product: Product,
        vehicle_year: i32,
        term_months: u32,
    ) -> Result<Option<RateMatch>, ResolveError> {
        if !product.allows_term(term_months) {
            return Err(ResolveError::InvalidTerm {
                product,
                term_months,
            });
        }

        let ranges = self.repo.list_active_ranges(product, term_months).await?;
        if let Some(range) = ranges.iter().find(|r| r.covers_year(vehicle_year)) {
            debug!(
                range_id = range.id,
                ?product,
                term_months,
                vehicle_year,
                "resolved configured rate range"
            );
            return Ok(Some(RateMatch {
                range_id: range.id,
                annual_rate: range.annual_rate,
                fallback: false,
            }));
        }

        if self.fallback.permits(product) {
            if let Some(legacy) = self.repo.find_legacy_range(vehicle_year).await? {
                warn!(
                    legacy_id = legacy.id,
                    ?product,
                    term_months,
                    vehicle_year,
                    "no specific range configured; using legacy unified rate"
                );
                return Ok(Some(RateMatch {
                    range_id: legacy.id,
                    annual_rate: legacy.annual_rate,
                    fallback: true,
                }));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use crate::test_support::InMemoryRateRepository;

    use super::*;

    fn resolver(repo: InMemoryRateRepository, fallback: FallbackPolicy) -> RateResolver {
        RateResolver::new(Arc::new(repo), fallback)
    }

    #[tokio::test]
    async fn resolves_the_single_covering_range() {
        let repo = InMemoryRateRepository::new();
        let id = repo.seed_range(Product::Auto, 12, 2015, 2020, dec!(0.60), true);
        repo.seed_range(Product::Auto, 12, 2021, 2025, dec!(0.55), true);

        let found = resolver(repo, FallbackPolicy::auto_only())
            .resolve(Product::Auto, 2018, 12)
            .await
            .unwrap();

        assert_eq!(
            found,
            Some(RateMatch {
                range_id: id,
                annual_rate: dec!(0.60),
                fallback: false,
            })
        );
    }

    #[tokio::test]
    async fn inactive_ranges_are_never_resolved() {
        let repo = InMemoryRateRepository::new();
        repo.seed_range(Product::Auto, 12, 2015, 2020, dec!(0.60), false);

        let found = resolver(repo, FallbackPolicy::disabled())
            .resolve(Product::Auto, 2018, 12)
            .await
            .unwrap();

        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn invalid_term_is_rejected_before_lookup() {
        // Term 30 is not an AUTO term even though a range would cover it.
        let repo = InMemoryRateRepository::new();
        repo.seed_range(Product::Auto, 12, 2000, 2030, dec!(0.60), true);

        let result = resolver(repo, FallbackPolicy::auto_only())
            .resolve(Product::Auto, 2018, 30)
            .await;

        assert_eq!(
            result,
            Err(ResolveError::InvalidTerm {
                product: Product::Auto,
                term_months: 30,
            })
        );
    }

    #[tokio::test]
    async fn auto_falls_back_to_highest_priority_legacy_row() {
        let repo = InMemoryRateRepository::new();
        repo.seed_legacy(1, 2010, 2025, dec!(0.80), 1, true);
        repo.seed_legacy(2, 2010, 2025, dec!(0.70), 5, true);

        let found = resolver(repo, FallbackPolicy::auto_only())
            .resolve(Product::Auto, 2020, 12)
            .await
            .unwrap();

        assert_eq!(
            found,
            Some(RateMatch {
                range_id: 2,
                annual_rate: dec!(0.70),
                fallback: true,
            })
        );
    }

    #[tokio::test]
    async fn moto_never_falls_back_to_the_legacy_table() {
        // Only the legacy table is populated; MOTO must come back empty.
        let repo = InMemoryRateRepository::new();
        repo.seed_legacy(1, 2010, 2025, dec!(0.80), 1, true);

        let found = resolver(repo, FallbackPolicy::auto_only())
            .resolve(Product::Moto, 2020, 12)
            .await
            .unwrap();

        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn specific_range_wins_over_legacy_fallback() {
        let repo = InMemoryRateRepository::new();
        let id = repo.seed_range(Product::Auto, 12, 2015, 2025, dec!(0.60), true);
        repo.seed_legacy(99, 2000, 2030, dec!(0.90), 10, true);

        let found = resolver(repo, FallbackPolicy::auto_only())
            .resolve(Product::Auto, 2020, 12)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.range_id, id);
        assert!(!found.fallback);
    }

    #[tokio::test]
    async fn disabled_policy_suppresses_fallback_for_auto() {
        let repo = InMemoryRateRepository::new();
        repo.seed_legacy(1, 2010, 2025, dec!(0.80), 1, true);

        let found = resolver(repo, FallbackPolicy::disabled())
            .resolve(Product::Auto, 2020, 12)
            .await
            .unwrap();

        assert_eq!(found, None);
    }
}
