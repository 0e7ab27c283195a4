//! Administrative service over the rate-range configuration.
//!
//! Validates writes field-by-field before any storage access and gates them
//! behind an administrator check. The overlap invariant itself is enforced
//! by the repository, atomically with the write; this layer only surfaces
//! the resulting Conflict with its list of blocking ranges.

use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::{RateRepository, RepositoryError};
use crate::models::{NewRateRange, Product, RangeOverlap, RateRange, RateRangePatch};

/// Caller identity as decided by the surrounding application. Write
/// operations require `is_admin`; reads and quoting do not consult it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user: String,
    pub is_admin: bool,
}

impl AuthContext {
    pub fn admin(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            is_admin: true,
        }
    }
}

/// Errors from administrative rate-range operations.
#[derive(Debug, Error, PartialEq)]
pub enum RateStoreError {
    /// The caller is not an administrator.
    #[error("caller is not authorized to modify rate configuration")]
    Forbidden,

    /// `year_from` exceeds `year_to`.
    #[error("invalid year range: {year_from} > {year_to}")]
    InvalidYearRange { year_from: i32, year_to: i32 },

    /// The term is not in the product's allowed set.
    #[error("term {term_months} months is not offered for {product:?}")]
    TermNotAllowed { product: Product, term_months: u32 },

    /// The rate must be non-negative.
    #[error("rate must be non-negative, got {0}")]
    NegativeRate(Decimal),

    /// The write would overlap the listed active ranges. Storage was left
    /// unchanged.
    #[error("range overlaps {} active range(s)", .0.len())]
    Overlap(Vec<RangeOverlap>),

    #[error("range not found")]
    NotFound,

    /// The range kept changing under concurrent edits; reload and retry.
    #[error("range was modified concurrently; reload and retry")]
    ConcurrentEdit,

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for RateStoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(overlaps) => RateStoreError::Overlap(overlaps),
            RepositoryError::NotFound => RateStoreError::NotFound,
            RepositoryError::Stale => RateStoreError::ConcurrentEdit,
            other => RateStoreError::Repository(other),
        }
    }
}

/// Write/read facade over rate-range persistence.
pub struct RateRangeStore {
    repo: Arc<dyn RateRepository>,
}

impl RateRangeStore {
    pub fn new(repo: Arc<dyn RateRepository>) -> Self {
        Self { repo }
    }

    /// Create a rate range.
    ///
    /// Field validation happens before any storage access; the overlap
    /// check runs inside the repository's transaction together with the
    /// insert.
    pub async fn create(
        &self,
        auth: &AuthContext,
        range: NewRateRange,
    ) -> Result<RateRange, RateStoreError> {
        require_admin(auth)?;
        validate_fields(
            range.product,
            range.term_months,
            range.year_from,
            range.year_to,
            range.annual_rate,
        )?;

        let created = self.repo.create_range(range).await.inspect_err(|err| {
            if let RepositoryError::Conflict(overlaps) = err {
                warn!(count = overlaps.len(), "rate range creation rejected: overlap");
            }
        })?;
        info!(
            range_id = created.id,
            product = ?created.product,
            term_months = created.term_months,
            by = %auth.user,
            "rate range created"
        );
        Ok(created)
    }

    /// Apply a partial update to an existing range.
    ///
    /// Each attempt re-reads the stored row, merges the patch onto it,
    /// validates the prospective row, and writes it back guarded by the
    /// row's `updated_at` version token. When another editor lands between
    /// the read and the write the guard fails and the whole
    /// read-merge-validate-write runs again against the fresh row, so
    /// neither editor's fields are silently dropped.
    pub async fn update(
        &self,
        auth: &AuthContext,
        id: i64,
        patch: RateRangePatch,
    ) -> Result<RateRange, RateStoreError> {
        require_admin(auth)?;

        const MAX_ATTEMPTS: u32 = 3;
        for attempt in 1..=MAX_ATTEMPTS {
            let existing = self.repo.get_range(id).await?;
            let prospective = patch.apply_to(&existing);
            validate_fields(
                prospective.product,
                prospective.term_months,
                prospective.year_from,
                prospective.year_to,
                prospective.annual_rate,
            )?;

            match self.repo.update_range(&prospective).await {
                Ok(()) => {
                    info!(range_id = id, by = %auth.user, "rate range updated");
                    return self.repo.get_range(id).await.map_err(Into::into);
                }
                Err(RepositoryError::Stale) if attempt < MAX_ATTEMPTS => {
                    debug!(range_id = id, attempt, "range changed mid-update; retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(RateStoreError::ConcurrentEdit)
    }

    /// Hard-delete a range. Loans snapshot resolved rates rather than
    /// referencing configuration rows, so no referential check is needed.
    pub async fn delete(&self, auth: &AuthContext, id: i64) -> Result<(), RateStoreError> {
        require_admin(auth)?;
        self.repo.delete_range(id).await?;
        info!(range_id = id, by = %auth.user, "rate range deleted");
        Ok(())
    }

    /// Active ranges for (product, term), ordered by `year_from`.
    pub async fn list_active(
        &self,
        product: Product,
        term_months: u32,
    ) -> Result<Vec<RateRange>, RateStoreError> {
        self.repo
            .list_active_ranges(product, term_months)
            .await
            .map_err(Into::into)
    }

    /// Every range for a product, for administrative listing.
    pub async fn list_all(&self, product: Product) -> Result<Vec<RateRange>, RateStoreError> {
        self.repo.list_ranges(product).await.map_err(Into::into)
    }
}

fn require_admin(auth: &AuthContext) -> Result<(), RateStoreError> {
    if !auth.is_admin {
        return Err(RateStoreError::Forbidden);
    }
    Ok(())
}

fn validate_fields(
    product: Product,
    term_months: u32,
    year_from: i32,
    year_to: i32,
    annual_rate: Decimal,
) -> Result<(), RateStoreError> {
    if year_from > year_to {
        return Err(RateStoreError::InvalidYearRange { year_from, year_to });
    }
    if !product.allows_term(term_months) {
        return Err(RateStoreError::TermNotAllowed {
            product,
            term_months,
        });
    }
    if annual_rate < Decimal::ZERO {
        return Err(RateStoreError::NegativeRate(annual_rate));
    }
    Ok(())
}
