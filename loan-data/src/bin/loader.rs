use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use loan_core::db::{DbConfig, RateRepository, RepositoryRegistry};
use loan_core::{AuthContext, RateRangeStore};
use loan_data::RateRangeLoader;
use loan_db_sqlite::SqliteRepositoryFactory;

/// Load rate-range configuration from a CSV file into the database.
///
/// The database is opened through the backend registry, which runs
/// migrations and applies seed files automatically (set
/// LOAN_DB_SQLITE_SEEDS_DIR to point the SQLite backend at a seeds
/// directory).
///
/// The CSV file should have the following columns:
/// - product: Product code (AUTO or MOTO)
/// - term_months: Loan term in months
/// - year_from: First vehicle model year covered (inclusive)
/// - year_to: Last vehicle model year covered (inclusive)
/// - annual_rate: Nominal annual rate as a decimal (e.g. 0.60)
/// - is_active: true or false
/// - name: Optional label (may be empty)
#[derive(Parser, Debug)]
#[command(name = "loan-data-loader")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the CSV file containing rate ranges
    #[arg(short, long)]
    file: PathBuf,

    /// Database backend to open
    #[arg(short, long, default_value = "sqlite")]
    backend: String,

    /// Connection string (e.g., sqlite:rates.db?mode=rwc to create if missing)
    #[arg(short, long, default_value = "sqlite:rates.db?mode=rwc")]
    database: String,

    /// User recorded as the creator of the loaded ranges
    #[arg(short, long, default_value = "loader")]
    user: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut registry = RepositoryRegistry::new();
    registry.register(Box::new(SqliteRepositoryFactory));

    let config = DbConfig {
        backend: args.backend.clone(),
        connection_string: args.database.clone(),
    };
    let repo: Arc<dyn RateRepository> = Arc::from(
        registry
            .create(&config)
            .await
            .with_context(|| format!("Failed to open {} database: {}", args.backend, args.database))?,
    );

    println!("Loading rate ranges from: {}", args.file.display());

    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open: {}", args.file.display()))?;

    let records = RateRangeLoader::parse(file)
        .with_context(|| format!("Failed to parse CSV: {}", args.file.display()))?;

    println!("Parsed {} records from CSV", records.len());

    let store = RateRangeStore::new(repo);
    let auth = AuthContext::admin(&args.user);
    let outcome = RateRangeLoader::load(&store, &auth, &records)
        .await
        .context("Failed to load rate ranges into database")?;

    println!("Successfully loaded {} rate ranges.", outcome.inserted);

    if !outcome.rejected.is_empty() {
        println!("Rejected {} record(s):", outcome.rejected.len());
        for rejection in &outcome.rejected {
            println!("  row {}: {}", rejection.row, rejection.reason);
        }
    }

    Ok(())
}
