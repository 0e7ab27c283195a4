pub mod calculations;
pub mod db;
pub mod models;
pub mod quoter;
pub mod resolver;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use calculations::{AmortizationEngine, AmortizationError, AmortizationResult};
pub use db::{RateRepository, RepositoryError};
pub use models::*;
pub use quoter::{QuoteAssembler, QuoteError};
pub use resolver::{FallbackPolicy, RateResolver, ResolveError};
pub use store::{AuthContext, RateRangeStore, RateStoreError};
