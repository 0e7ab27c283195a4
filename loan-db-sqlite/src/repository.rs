use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{
    Connection, FromRow,
    sqlite::{SqlitePool, SqlitePoolOptions},
};
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use loan_core::{
    LegacyUnifiedRange, NewRateRange, Product, RangeOverlap, RateRange, RateRepository,
    RepositoryError,
};
use tracing::warn;

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub async fn new(database_url: &str) -> Result<Self> {
        // An in-memory database exists per connection, so the pool must not
        // grow past one or later queries would hit a fresh empty database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .with_context(|| format!("Failed to connect to database: {}", database_url))?;
        Ok(Self { pool })
    }

    pub fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Load and execute all SQL seed files from the specified directory.
    /// Files are executed in alphabetical order by filename.
    pub async fn run_seeds(&self, seeds_dir: &Path) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(seeds_dir)
            .with_context(|| format!("Failed to read seeds directory '{}'", seeds_dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sql"))
            .collect();

        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let sql = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;

            sqlx::raw_sql(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to execute seed file '{}'", path.display()))?;
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[derive(FromRow)]
struct RateRangeRow {
    id: i64,
    product: String,
    term_months: u32,
    year_from: i32,
    year_to: i32,
    annual_rate: String,
    is_active: bool,
    priority: i32,
    name: Option<String>,
    description: Option<String>,
    created_by: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<RateRangeRow> for RateRange {
    type Error = RepositoryError;

    fn try_from(row: RateRangeRow) -> Result<Self, Self::Error> {
        let product = Product::from_code(&row.product).ok_or_else(|| {
            RepositoryError::Database(format!("Invalid product code: {}", row.product))
        })?;
        Ok(RateRange {
            id: row.id,
            product,
            term_months: row.term_months,
            year_from: row.year_from,
            year_to: row.year_to,
            annual_rate: parse_decimal(&row.annual_rate)?,
            is_active: row.is_active,
            priority: row.priority,
            name: row.name,
            description: row.description,
            created_by: row.created_by,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[derive(FromRow)]
struct LegacyUnifiedRangeRow {
    id: i64,
    year_from: i32,
    year_to: i32,
    annual_rate: String,
    priority: i32,
    is_active: bool,
}

impl TryFrom<LegacyUnifiedRangeRow> for LegacyUnifiedRange {
    type Error = RepositoryError;

    fn try_from(row: LegacyUnifiedRangeRow) -> Result<Self, Self::Error> {
        Ok(LegacyUnifiedRange {
            id: row.id,
            year_from: row.year_from,
            year_to: row.year_to,
            annual_rate: parse_decimal(&row.annual_rate)?,
            priority: row.priority,
            is_active: row.is_active,
        })
    }
}

#[derive(FromRow)]
struct OverlapRow {
    id: i64,
    year_from: i32,
    year_to: i32,
    name: Option<String>,
}

impl From<OverlapRow> for RangeOverlap {
    fn from(row: OverlapRow) -> Self {
        RangeOverlap {
            id: row.id,
            year_from: row.year_from,
            year_to: row.year_to,
            name: row.name,
        }
    }
}

fn parse_decimal(s: &str) -> Result<Decimal, RepositoryError> {
    s.parse::<Decimal>()
        .map_err(|e| RepositoryError::Database(format!("Failed to parse decimal '{}': {}", s, e)))
}

/// Fixed-width storage format with nanosecond precision, so a timestamp
/// round-trips byte-for-byte and `updated_at` can serve as the version
/// token in `update_range`.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.9f").to_string()
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    // SQLite stores timestamps in various formats, try common ones
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| RepositoryError::Database(format!("Failed to parse datetime '{}': {}", s, e)))
}

const SELECT_RANGE_COLUMNS: &str = "SELECT id, product, term_months, year_from, year_to, \
     annual_rate, is_active, priority, name, description, \
     created_by, created_at, updated_at FROM rate_ranges";

/// Find active ranges in the same (product, term) bucket whose inclusive
/// year interval intersects `[year_from, year_to]`. Must run on the same
/// transaction as the write it guards.
async fn overlapping_ranges(
    tx: &mut sqlx::SqliteConnection,
    product: Product,
    term_months: u32,
    year_from: i32,
    year_to: i32,
    exclude_id: Option<i64>,
) -> Result<Vec<RangeOverlap>, RepositoryError> {
    let rows: Vec<OverlapRow> = sqlx::query_as(
        "SELECT id, year_from, year_to, name FROM rate_ranges
         WHERE product = ? AND term_months = ? AND is_active = 1
           AND year_from <= ? AND ? <= year_to
           AND id <> ?
         ORDER BY year_from",
    )
    .bind(product.code())
    .bind(term_months)
    .bind(year_to)
    .bind(year_from)
    .bind(exclude_id.unwrap_or(-1))
    .fetch_all(tx)
    .await
    .map_err(|e| RepositoryError::Database(e.to_string()))?;

    Ok(rows.into_iter().map(Into::into).collect())
}

#[async_trait]
impl RateRepository for SqliteRepository {
    async fn create_range(&self, range: NewRateRange) -> Result<RateRange, RepositoryError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        // BEGIN IMMEDIATE takes the write lock before the overlap SELECT,
        // so a concurrent writer waits here and re-reads the winner's
        // committed state instead of failing on a stale snapshot.
        let mut tx = conn
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        // Check and insert are one transaction: a concurrent writer cannot
        // slip an overlapping range in between.
        if range.is_active {
            let overlaps = overlapping_ranges(
                &mut *tx,
                range.product,
                range.term_months,
                range.year_from,
                range.year_to,
                None,
            )
            .await?;
            if !overlaps.is_empty() {
                warn!(
                    product = range.product.code(),
                    term_months = range.term_months,
                    count = overlaps.len(),
                    "rejecting overlapping rate range"
                );
                return Err(RepositoryError::Conflict(overlaps));
            }
        }

        let now = format_timestamp(&Utc::now());
        let result = sqlx::query(
            "INSERT INTO rate_ranges (
                product, term_months, year_from, year_to, annual_rate,
                is_active, priority, name, description, created_by,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(range.product.code())
        .bind(range.term_months)
        .bind(range.year_from)
        .bind(range.year_to)
        .bind(range.annual_rate.to_string())
        .bind(range.is_active)
        .bind(range.priority)
        .bind(&range.name)
        .bind(&range.description)
        .bind(&range.created_by)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        // Release the connection before re-reading, or a one-connection
        // pool (in-memory databases) would deadlock on the acquire below.
        let id = result.last_insert_rowid();
        drop(conn);
        self.get_range(id).await
    }

    async fn get_range(&self, id: i64) -> Result<RateRange, RepositoryError> {
        let row: RateRangeRow = sqlx::query_as(&format!("{SELECT_RANGE_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?
            .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn update_range(&self, range: &RateRange) -> Result<(), RepositoryError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        let mut tx = conn
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        if range.is_active {
            let overlaps = overlapping_ranges(
                &mut *tx,
                range.product,
                range.term_months,
                range.year_from,
                range.year_to,
                Some(range.id),
            )
            .await?;
            if !overlaps.is_empty() {
                warn!(
                    range_id = range.id,
                    count = overlaps.len(),
                    "rejecting overlapping rate range update"
                );
                return Err(RepositoryError::Conflict(overlaps));
            }
        }

        // `updated_at` doubles as the version token: the caller passes the
        // row as it read it, and a row rewritten since then no longer
        // matches, so a stale write-back touches nothing.
        let now = format_timestamp(&Utc::now());
        let result = sqlx::query(
            "UPDATE rate_ranges SET
                year_from = ?, year_to = ?, annual_rate = ?, is_active = ?,
                priority = ?, name = ?, description = ?, updated_at = ?
             WHERE id = ? AND updated_at = ?",
        )
        .bind(range.year_from)
        .bind(range.year_to)
        .bind(range.annual_rate.to_string())
        .bind(range.is_active)
        .bind(range.priority)
        .bind(&range.name)
        .bind(&range.description)
        .bind(&now)
        .bind(range.id)
        .bind(format_timestamp(&range.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM rate_ranges WHERE id = ?")
                .bind(range.id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| RepositoryError::Database(e.to_string()))?;
            return Err(match exists {
                Some(_) => RepositoryError::Stale,
                None => RepositoryError::NotFound,
            });
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(())
    }

    async fn delete_range(&self, id: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM rate_ranges WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn list_active_ranges(
        &self,
        product: Product,
        term_months: u32,
    ) -> Result<Vec<RateRange>, RepositoryError> {
        let rows: Vec<RateRangeRow> = sqlx::query_as(&format!(
            "{SELECT_RANGE_COLUMNS}
             WHERE product = ? AND term_months = ? AND is_active = 1
             ORDER BY year_from"
        ))
        .bind(product.code())
        .bind(term_months)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn list_ranges(&self, product: Product) -> Result<Vec<RateRange>, RepositoryError> {
        let rows: Vec<RateRangeRow> = sqlx::query_as(&format!(
            "{SELECT_RANGE_COLUMNS}
             WHERE product = ?
             ORDER BY term_months, year_from"
        ))
        .bind(product.code())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn find_legacy_range(
        &self,
        vehicle_year: i32,
    ) -> Result<Option<LegacyUnifiedRange>, RepositoryError> {
        let row: Option<LegacyUnifiedRangeRow> = sqlx::query_as(
            "SELECT id, year_from, year_to, annual_rate, priority, is_active
             FROM legacy_unified_ranges
             WHERE is_active = 1 AND year_from <= ? AND ? <= year_to
             ORDER BY priority DESC, id
             LIMIT 1",
        )
        .bind(vehicle_year)
        .bind(vehicle_year)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        row.map(|r| r.try_into()).transpose()
    }
}
