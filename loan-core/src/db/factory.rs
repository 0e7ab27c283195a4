use std::collections::HashMap;

use async_trait::async_trait;

use super::repository::{RateRepository, RepositoryError};

/// Where and how to open the rate-configuration database.
///
/// `backend` selects a registered [`RepositoryFactory`] by its
/// [`backend_name`](RepositoryFactory::backend_name). Everything about
/// `connection_string` belongs to that backend; the SQLite backend accepts
/// a file path, a sqlx URL such as `sqlite:rates.db?mode=rwc`, or
/// `":memory:"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub backend: String,
    pub connection_string: String,
}

impl Default for DbConfig {
    /// An in-memory SQLite database: the zero-setup choice for tests and
    /// local experimentation.
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            connection_string: ":memory:".to_string(),
        }
    }
}

/// Constructor for one database backend.
///
/// A backend crate exports a unit struct implementing this trait; the
/// application registers it with a [`RepositoryRegistry`] during startup
/// and never names the concrete repository type again.
#[async_trait]
pub trait RepositoryFactory: Send + Sync {
    /// Stable lowercase name this factory is registered under.
    fn backend_name(&self) -> &'static str;

    /// Produce a ready-to-use repository for `config`. Whatever setup the
    /// backend needs happens here: opening pools, running migrations,
    /// applying seed data.
    async fn create(&self, config: &DbConfig) -> Result<Box<dyn RateRepository>, RepositoryError>;
}

/// Maps backend names to their factories.
///
/// Built once at startup: register every compiled-in backend, then let
/// whatever owns the [`DbConfig`] call [`create`](Self::create).
pub struct RepositoryRegistry {
    factories: HashMap<&'static str, Box<dyn RepositoryFactory>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Add `factory` under its backend name. A factory already registered
    /// under that name is replaced.
    pub fn register(&mut self, factory: Box<dyn RepositoryFactory>) {
        self.factories.insert(factory.backend_name(), factory);
    }

    /// Registered backend names, alphabetical.
    pub fn available_backends(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Build a repository using the factory registered for
    /// `config.backend`.
    ///
    /// When no factory matches, fails with [`RepositoryError::Connection`]
    /// naming both the requested backend and the registered ones. Errors
    /// from the chosen factory pass through unchanged.
    pub async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn RateRepository>, RepositoryError> {
        let Some(factory) = self.factories.get(config.backend.as_str()) else {
            return Err(RepositoryError::Connection(format!(
                "unknown backend '{}'; available: {:?}",
                config.backend,
                self.available_backends()
            )));
        };

        factory.create(config).await
    }
}

impl Default for RepositoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}
