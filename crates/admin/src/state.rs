//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AdminConfig;
use crate::services::generator::ProductGenerator;

/// Application state shared across all handlers.
///
/// Cheap to clone; every clone shares the pool, configuration and
/// product generator.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    generator: ProductGenerator,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: AdminConfig, pool: PgPool, generator: ProductGenerator) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                generator,
            }),
        }
    }

    /// Get a reference to the admin configuration.
    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// The AI product generator. Unconfigured without an API key.
    #[must_use]
    pub fn generator(&self) -> &ProductGenerator {
        &self.inner.generator
    }
}
