//! Cached catalog lookups.
//!
//! Active categories, brands and shipping methods change rarely and are read
//! on most pages, so they are cached for 60 seconds with `moka`.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use emporium_db::{
    Brand, BrandRepository, Category, CategoryRepository, RepositoryError, ShippingMethod,
    ShippingMethodRepository,
};

/// How long cached lists stay fresh.
pub const CATALOG_TTL: Duration = Duration::from_secs(60);

/// Cache key for catalog lists.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
enum CacheKey {
    Categories,
    Brands,
    ShippingMethods,
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Categories(Arc<Vec<Category>>),
    Brands(Arc<Vec<Brand>>),
    ShippingMethods(Arc<Vec<ShippingMethod>>),
}

/// Read-through cache over the catalog repositories.
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<CacheKey, CacheValue>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new(CATALOG_TTL)
    }
}

impl CatalogCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(16).time_to_live(ttl).build();
        Self { cache }
    }

    /// Active categories in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the list has to be loaded and the query fails.
    pub async fn categories(&self, pool: &PgPool) -> Result<Arc<Vec<Category>>, RepositoryError> {
        if let Some(CacheValue::Categories(rows)) = self.cache.get(&CacheKey::Categories).await {
            debug!("Cache hit for categories");
            return Ok(rows);
        }
        let rows = Arc::new(CategoryRepository::new(pool).list_active().await?);
        self.cache
            .insert(CacheKey::Categories, CacheValue::Categories(Arc::clone(&rows)))
            .await;
        Ok(rows)
    }

    /// Active brands by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the list has to be loaded and the query fails.
    pub async fn brands(&self, pool: &PgPool) -> Result<Arc<Vec<Brand>>, RepositoryError> {
        if let Some(CacheValue::Brands(rows)) = self.cache.get(&CacheKey::Brands).await {
            debug!("Cache hit for brands");
            return Ok(rows);
        }
        let rows = Arc::new(BrandRepository::new(pool).list_active().await?);
        self.cache
            .insert(CacheKey::Brands, CacheValue::Brands(Arc::clone(&rows)))
            .await;
        Ok(rows)
    }

    /// Active shipping methods in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the list has to be loaded and the query fails.
    pub async fn shipping_methods(
        &self,
        pool: &PgPool,
    ) -> Result<Arc<Vec<ShippingMethod>>, RepositoryError> {
        if let Some(CacheValue::ShippingMethods(rows)) =
            self.cache.get(&CacheKey::ShippingMethods).await
        {
            debug!("Cache hit for shipping methods");
            return Ok(rows);
        }
        let rows = Arc::new(ShippingMethodRepository::new(pool).list_active().await?);
        self.cache
            .insert(
                CacheKey::ShippingMethods,
                CacheValue::ShippingMethods(Arc::clone(&rows)),
            )
            .await;
        Ok(rows)
    }

    /// Drop every cached list.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}
