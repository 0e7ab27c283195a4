//! In-memory repository used by unit tests across the crate.

use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::db::{RateRepository, RepositoryError};
use crate::models::{
    LegacyUnifiedRange, NewRateRange, Product, RangeOverlap, RateRange,
};

/// A `Mutex<Vec<_>>`-backed repository. Enforces the same overlap contract
/// as a real backend (check-then-write under one lock) so service-level
/// tests observe realistic Conflict errors.
pub struct InMemoryRateRepository {
    ranges: Mutex<Vec<RateRange>>,
    legacy: Mutex<Vec<LegacyUnifiedRange>>,
    next_id: AtomicI64,
}

impl InMemoryRateRepository {
    pub fn new() -> Self {
        Self {
            ranges: Mutex::new(Vec::new()),
            legacy: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Insert a range directly, bypassing the overlap check. Returns its id.
    pub fn seed_range(
        &self,
        product: Product,
        term_months: u32,
        year_from: i32,
        year_to: i32,
        annual_rate: Decimal,
        is_active: bool,
    ) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.ranges.lock().unwrap().push(RateRange {
            id,
            product,
            term_months,
            year_from,
            year_to,
            annual_rate,
            is_active,
            priority: 0,
            name: None,
            description: None,
            created_by: "test".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        id
    }

    pub fn seed_legacy(
        &self,
        id: i64,
        year_from: i32,
        year_to: i32,
        annual_rate: Decimal,
        priority: i32,
        is_active: bool,
    ) {
        self.legacy.lock().unwrap().push(LegacyUnifiedRange {
            id,
            year_from,
            year_to,
            annual_rate,
            priority,
            is_active,
        });
    }

    fn overlaps_of(
        ranges: &[RateRange],
        product: Product,
        term_months: u32,
        year_from: i32,
        year_to: i32,
        exclude_id: Option<i64>,
    ) -> Vec<RangeOverlap> {
        ranges
            .iter()
            .filter(|r| {
                r.is_active
                    && r.product == product
                    && r.term_months == term_months
                    && Some(r.id) != exclude_id
                    && r.year_from <= year_to
                    && year_from <= r.year_to
            })
            .map(RangeOverlap::from)
            .collect()
    }
}

impl Default for InMemoryRateRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateRepository for InMemoryRateRepository {
    async fn create_range(&self, range: NewRateRange) -> Result<RateRange, RepositoryError> {
        let mut ranges = self.ranges.lock().unwrap();
        if range.is_active {
            let overlaps = Self::overlaps_of(
                &ranges,
                range.product,
                range.term_months,
                range.year_from,
                range.year_to,
                None,
            );
            if !overlaps.is_empty() {
                return Err(RepositoryError::Conflict(overlaps));
            }
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let stored = RateRange {
            id,
            product: range.product,
            term_months: range.term_months,
            year_from: range.year_from,
            year_to: range.year_to,
            annual_rate: range.annual_rate,
            is_active: range.is_active,
            priority: range.priority,
            name: range.name,
            description: range.description,
            created_by: range.created_by,
            created_at: now,
            updated_at: now,
        };
        ranges.push(stored.clone());
        Ok(stored)
    }

    async fn get_range(&self, id: i64) -> Result<RateRange, RepositoryError> {
        self.ranges
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn update_range(&self, range: &RateRange) -> Result<(), RepositoryError> {
        let mut ranges = self.ranges.lock().unwrap();
        let index = ranges
            .iter()
            .position(|r| r.id == range.id)
            .ok_or(RepositoryError::NotFound)?;
        if ranges[index].updated_at != range.updated_at {
            return Err(RepositoryError::Stale);
        }
        if range.is_active {
            let overlaps = Self::overlaps_of(
                &ranges,
                range.product,
                range.term_months,
                range.year_from,
                range.year_to,
                Some(range.id),
            );
            if !overlaps.is_empty() {
                return Err(RepositoryError::Conflict(overlaps));
            }
        }
        ranges[index] = RateRange {
            updated_at: Utc::now(),
            ..range.clone()
        };
        Ok(())
    }

    async fn delete_range(&self, id: i64) -> Result<(), RepositoryError> {
        let mut ranges = self.ranges.lock().unwrap();
        let before = ranges.len();
        ranges.retain(|r| r.id != id);
        if ranges.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_active_ranges(
        &self,
        product: Product,
        term_months: u32,
    ) -> Result<Vec<RateRange>, RepositoryError> {
        let mut out: Vec<_> = self
            .ranges
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.is_active && r.product == product && r.term_months == term_months)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.year_from);
        Ok(out)
    }

    async fn list_ranges(&self, product: Product) -> Result<Vec<RateRange>, RepositoryError> {
        let mut out: Vec<_> = self
            .ranges
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.product == product)
            .cloned()
            .collect();
        out.sort_by_key(|r| (r.term_months, r.year_from));
        Ok(out)
    }

    async fn find_legacy_range(
        &self,
        vehicle_year: i32,
    ) -> Result<Option<LegacyUnifiedRange>, RepositoryError> {
        Ok(self
            .legacy
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.is_active && r.year_from <= vehicle_year && vehicle_year <= r.year_to)
            .max_by_key(|r| r.priority)
            .cloned())
    }
}
