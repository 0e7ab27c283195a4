use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info};

use loan_core::db::repository::{RateRepository, RepositoryError};
use loan_core::db::{DbConfig, RepositoryFactory};

use crate::repository::SqliteRepository;

/// The SQLite backend, registered under `"sqlite"`:
///
/// ```rust,no_run
/// use loan_core::db::RepositoryRegistry;
/// use loan_db_sqlite::SqliteRepositoryFactory;
///
/// let mut registry = RepositoryRegistry::new();
/// registry.register(Box::new(SqliteRepositoryFactory));
/// ```
pub struct SqliteRepositoryFactory;

/// Locate the directory of seed `.sql` files.
///
/// First existing candidate wins: the `LOAN_DB_SQLITE_SEEDS_DIR`
/// environment variable, a `seeds` directory under the current working
/// directory, then the one shipped next to this crate's manifest. `None`
/// when no candidate exists, in which case seeding is skipped.
fn seeds_dir() -> Option<PathBuf> {
    let candidates = [
        std::env::var("LOAN_DB_SQLITE_SEEDS_DIR")
            .ok()
            .map(PathBuf::from),
        Some(PathBuf::from("./seeds")),
        Some(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("seeds")),
    ];
    candidates.into_iter().flatten().find(|dir| dir.is_dir())
}

#[async_trait]
impl RepositoryFactory for SqliteRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Open the database named by the connection string (a bare file path,
    /// a sqlx URL such as `sqlite:rates.db?mode=rwc`, or `":memory:"`),
    /// run the embedded migrations, and apply seed files when a seeds
    /// directory can be found (see [`seeds_dir`]).
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn RateRepository>, RepositoryError> {
        let repo = SqliteRepository::new(&config.connection_string)
            .await
            .map_err(|e| RepositoryError::Connection(e.to_string()))?;
        repo.run_migrations()
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        match seeds_dir() {
            Some(dir) => {
                info!(dir = %dir.display(), "applying seed files");
                repo.run_seeds(&dir)
                    .await
                    .map_err(|e| RepositoryError::Database(e.to_string()))?;
            }
            None => debug!("no seeds directory found; skipping seed data"),
        }
        Ok(Box::new(repo))
    }
}

#[cfg(test)]
mod tests {
    use loan_core::db::{DbConfig, RateRepository, RepositoryFactory, RepositoryRegistry};
    use loan_core::{NewRateRange, Product};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::SqliteRepositoryFactory;

    fn new_range(product: Product, term: u32, from: i32, to: i32) -> NewRateRange {
        NewRateRange {
            product,
            term_months: term,
            year_from: from,
            year_to: to,
            annual_rate: dec!(0.60),
            is_active: true,
            priority: 0,
            name: None,
            description: None,
            created_by: "factory-test".to_string(),
        }
    }

    #[test]
    fn backend_name_is_sqlite() {
        assert_eq!(SqliteRepositoryFactory.backend_name(), "sqlite");
    }

    #[tokio::test]
    async fn creates_in_memory_repository_with_schema_and_seeds() {
        let repo = SqliteRepositoryFactory
            .create(&DbConfig::default())
            .await
            .expect("factory should open an in-memory database");

        // Migrations ran: a full write/read cycle works.
        let created = repo
            .create_range(new_range(Product::Auto, 12, 2015, 2020))
            .await
            .expect("schema should be in place");
        assert_eq!(repo.get_range(created.id).await.unwrap(), created);

        // Seed files ran: the legacy unified table is populated.
        let legacy = repo
            .find_legacy_range(2020)
            .await
            .unwrap()
            .expect("seeded legacy row should cover 2020");
        assert_eq!(legacy.annual_rate, dec!(0.85));
    }

    #[tokio::test]
    async fn registry_routes_to_the_sqlite_factory() {
        let mut registry = RepositoryRegistry::new();
        registry.register(Box::new(SqliteRepositoryFactory));

        let repo = registry
            .create(&DbConfig::default())
            .await
            .expect("registry should build the sqlite backend");
        assert_eq!(repo.list_ranges(Product::Auto).await.unwrap(), vec![]);
    }
}
