use std::io::Read;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use loan_core::{AuthContext, NewRateRange, Product, RateRangeStore, RateStoreError};

/// Errors that can occur when loading rate-range data.
#[derive(Debug, Error, PartialEq)]
pub enum RateRangeLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Unknown product code '{0}' (expected AUTO or MOTO)")]
    UnknownProduct(String),

    #[error("Store error: {0}")]
    Store(#[from] RateStoreError),
}

impl From<csv::Error> for RateRangeLoaderError {
    fn from(err: csv::Error) -> Self {
        RateRangeLoaderError::CsvParse(err.to_string())
    }
}

/// A single record from the rate ranges CSV file.
///
/// Columns:
/// - `product`: Product code (`AUTO` or `MOTO`)
/// - `term_months`: The loan term this rate applies to
/// - `year_from` / `year_to`: Inclusive vehicle model-year interval
/// - `annual_rate`: Nominal annual rate as a decimal fraction (e.g. `0.60`)
/// - `is_active`: Whether the range participates in resolution
/// - `name`: Optional administrative label (empty for none)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RateRangeRecord {
    pub product: String,
    pub term_months: u32,
    pub year_from: i32,
    pub year_to: i32,
    pub annual_rate: Decimal,
    pub is_active: bool,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub name: Option<String>,
}

fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        other => Ok(other),
    }
}

/// A record the store refused, with its 1-based data-row number. The rest of
/// the file is unaffected.
#[derive(Debug, PartialEq)]
pub struct RejectedRecord {
    pub row: usize,
    pub reason: RateRangeLoaderError,
}

/// Result of a bulk load: how many ranges were created, and which records
/// were rejected (with why).
#[derive(Debug, Default, PartialEq)]
pub struct LoadOutcome {
    pub inserted: usize,
    pub rejected: Vec<RejectedRecord>,
}

/// Loader for rate-range configuration from CSV files.
///
/// Records are written through [`RateRangeStore`], so every row is validated
/// and overlap-checked exactly as an interactive administrative write would
/// be. A rejected row (unknown product, bad bounds, overlap with an existing
/// active range) does not stop the rows after it; the outcome reports each
/// rejection with its row number.
pub struct RateRangeLoader;

impl RateRangeLoader {
    /// Parse rate-range records from a CSV reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<RateRangeRecord>, RateRangeLoaderError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: RateRangeRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Load rate-range records through the store.
    ///
    /// Rows are inserted in file order. Rejections are collected per row and
    /// reported in the outcome; an authorization failure aborts immediately,
    /// since it would reject every remaining row for the same reason.
    pub async fn load(
        store: &RateRangeStore,
        auth: &AuthContext,
        records: &[RateRangeRecord],
    ) -> Result<LoadOutcome, RateRangeLoaderError> {
        let mut outcome = LoadOutcome::default();

        for (index, record) in records.iter().enumerate() {
            let row = index + 1;

            let Some(product) = Product::from_code(record.product.trim()) else {
                warn!(row, product = %record.product, "skipping record: unknown product");
                outcome.rejected.push(RejectedRecord {
                    row,
                    reason: RateRangeLoaderError::UnknownProduct(record.product.clone()),
                });
                continue;
            };

            let range = NewRateRange {
                product,
                term_months: record.term_months,
                year_from: record.year_from,
                year_to: record.year_to,
                annual_rate: record.annual_rate,
                is_active: record.is_active,
                priority: 0,
                name: record.name.clone(),
                description: None,
                created_by: auth.user.clone(),
            };

            match store.create(auth, range).await {
                Ok(_) => outcome.inserted += 1,
                Err(RateStoreError::Forbidden) => {
                    return Err(RateStoreError::Forbidden.into());
                }
                Err(err) => {
                    warn!(row, %err, "skipping record: store rejected it");
                    outcome.rejected.push(RejectedRecord {
                        row,
                        reason: err.into(),
                    });
                }
            }
        }

        Ok(outcome)
    }
}
