use async_trait::async_trait;
use thiserror::Error;

use crate::models::{LegacyUnifiedRange, NewRateRange, Product, RangeOverlap, RateRange};

#[derive(Debug, Error, PartialEq)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    /// The write would leave two active ranges with overlapping year
    /// intervals for the same (product, term). Carries every blocking range
    /// so the caller can resolve the conflict.
    #[error("Overlapping active rate ranges: {0:?}")]
    Conflict(Vec<RangeOverlap>),

    /// The row changed since the caller read it; re-read and retry.
    #[error("Record was modified concurrently")]
    Stale,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Persistence seam for rate configuration.
///
/// Implementations must enforce the non-overlap invariant on every write:
/// the overlap check and the insert/update are one atomic unit, so two
/// concurrent writers can never both pass the check against a stale
/// snapshot. Reads carry no such requirement.
#[async_trait]
pub trait RateRepository: Send + Sync {
    /// Insert a new range after atomically verifying that no active range
    /// for the same (product, term) overlaps its year interval.
    ///
    /// # Errors
    /// [`RepositoryError::Conflict`] listing every overlapping active range.
    async fn create_range(&self, range: NewRateRange) -> Result<RateRange, RepositoryError>;

    async fn get_range(&self, id: i64) -> Result<RateRange, RepositoryError>;

    /// Overwrite an existing range with `range` (matched by `range.id`),
    /// atomically re-running the overlap check against all other active
    /// ranges in the same (product, term) bucket.
    ///
    /// `range.updated_at` is the version token: it must still match the
    /// stored row, otherwise the write fails with
    /// [`RepositoryError::Stale`] and nothing is changed. This is what
    /// keeps two concurrent editors from silently dropping each other's
    /// fields.
    async fn update_range(&self, range: &RateRange) -> Result<(), RepositoryError>;

    /// Unconditional hard delete. Loan applications snapshot resolved rates
    /// rather than referencing ranges, so no referential check is needed.
    async fn delete_range(&self, id: i64) -> Result<(), RepositoryError>;

    /// Active ranges for (product, term), ordered by `year_from`.
    async fn list_active_ranges(
        &self,
        product: Product,
        term_months: u32,
    ) -> Result<Vec<RateRange>, RepositoryError>;

    /// Every range for a product regardless of term or activity, ordered by
    /// term then `year_from`. Administrative listing.
    async fn list_ranges(&self, product: Product) -> Result<Vec<RateRange>, RepositoryError>;

    /// The active legacy unified row covering `vehicle_year` with the
    /// highest priority, if any. Term is ignored by design: the legacy
    /// table predates per-term configuration.
    async fn find_legacy_range(
        &self,
        vehicle_year: i32,
    ) -> Result<Option<LegacyUnifiedRange>, RepositoryError>;
}
