//! Seed catalog data from a YAML file.
//!
//! Records are upserted (brands and categories by slug, shipping methods by
//! name, products by SKU), so a file can be applied repeatedly. Products
//! and child categories refer to brands and categories by slug:
//!
//! ```yaml
//! brands:
//!   - name: Northwind
//! categories:
//!   - name: Lighting
//!   - name: Desk Lamps
//!     parent: lighting
//! shipping_methods:
//!   - name: Standard
//!     base_rate: "5.00"
//!     min_days: 3
//!     max_days: 5
//! products:
//!   - name: Oak Desk Lamp
//!     sku: NW-LAMP-01
//!     price: "49.99"
//!     status: active
//!     brand: northwind
//!     category: desk-lamps
//!     stock: 25
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;

use emporium_core::{BrandId, CategoryId};
use emporium_db::{
    BrandInput, BrandRepository, CategoryInput, CategoryRepository, InventoryInput,
    InventoryRepository, ProductInput, ProductRepository, RepositoryError, ShippingMethodInput,
    ShippingMethodRepository,
};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid seed file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Unknown {kind} '{slug}' referenced by {by}")]
    UnknownReference {
        kind: &'static str,
        slug: String,
        by: String,
    },
    #[error("{record}: {source}")]
    Record {
        record: String,
        source: RepositoryError,
    },
}

/// A category and, optionally, its parent's slug.
#[derive(Debug, Deserialize)]
pub struct CategorySeed {
    #[serde(flatten)]
    pub input: CategoryInput,
    #[serde(default)]
    pub parent: Option<String>,
}

/// A product with brand/category slugs and starting stock.
#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    #[serde(flatten)]
    pub input: ProductInput,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Units on hand at `location`; no inventory row when absent.
    #[serde(default)]
    pub stock: Option<i32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub reorder_level: i32,
}

/// Contents of a seed file. Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub brands: Vec<BrandInput>,
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
    #[serde(default)]
    pub shipping_methods: Vec<ShippingMethodInput>,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

impl SeedFile {
    /// Parse a seed file.
    ///
    /// # Errors
    ///
    /// Returns `SeedError::Parse` for malformed YAML or missing fields.
    pub fn from_yaml(content: &str) -> Result<Self, SeedError> {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// How many records each section wrote.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub brands: usize,
    pub categories: usize,
    pub shipping_methods: usize,
    pub products: usize,
    pub stock_rows: usize,
}

fn record_error(record: impl Into<String>) -> impl FnOnce(RepositoryError) -> SeedError {
    let record = record.into();
    move |source| SeedError::Record { record, source }
}

/// Slug-to-ID lookup over records written by this run, falling back to the
/// database for records seeded earlier.
struct References<'a> {
    pool: &'a PgPool,
    brands: HashMap<String, BrandId>,
    categories: HashMap<String, CategoryId>,
}

impl<'a> References<'a> {
    fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            brands: HashMap::new(),
            categories: HashMap::new(),
        }
    }

    async fn brand(&self, slug: &str, by: &str) -> Result<BrandId, SeedError> {
        if let Some(id) = self.brands.get(slug) {
            return Ok(*id);
        }
        BrandRepository::new(self.pool)
            .get_by_slug(slug)
            .await
            .map_err(record_error(by))?
            .map(|brand| brand.id)
            .ok_or_else(|| SeedError::UnknownReference {
                kind: "brand",
                slug: slug.to_string(),
                by: by.to_string(),
            })
    }

    async fn category(&self, slug: &str, by: &str) -> Result<CategoryId, SeedError> {
        if let Some(id) = self.categories.get(slug) {
            return Ok(*id);
        }
        CategoryRepository::new(self.pool)
            .get_by_slug(slug)
            .await
            .map_err(record_error(by))?
            .map(|category| category.id)
            .ok_or_else(|| SeedError::UnknownReference {
                kind: "category",
                slug: slug.to_string(),
                by: by.to_string(),
            })
    }
}

/// Apply a parsed seed file.
///
/// Categories are written in file order, so a parent must come before its
/// children.
///
/// # Errors
///
/// Stops at the first record that fails validation or references an
/// unknown slug. Records written before it are kept.
pub async fn apply(pool: &PgPool, seed: SeedFile) -> Result<SeedSummary, SeedError> {
    let mut summary = SeedSummary::default();
    let mut refs = References::new(pool);

    let brands = BrandRepository::new(pool);
    for input in &seed.brands {
        let brand = brands
            .upsert(input)
            .await
            .map_err(record_error(format!("brand {}", input.name)))?;
        refs.brands.insert(brand.slug, brand.id);
        summary.brands += 1;
    }

    let categories = CategoryRepository::new(pool);
    for CategorySeed { mut input, parent } in seed.categories {
        let label = format!("category {}", input.name);
        if let Some(parent) = parent {
            input.parent_id = Some(refs.category(&parent, &label).await?);
        }
        let category = categories.upsert(&input).await.map_err(record_error(label))?;
        refs.categories.insert(category.slug, category.id);
        summary.categories += 1;
    }

    let methods = ShippingMethodRepository::new(pool);
    for input in &seed.shipping_methods {
        methods
            .upsert(input)
            .await
            .map_err(record_error(format!("shipping method {}", input.name)))?;
        summary.shipping_methods += 1;
    }

    let products = ProductRepository::new(pool);
    let inventory = InventoryRepository::new(pool);
    for entry in seed.products {
        let ProductSeed {
            mut input,
            brand,
            category,
            stock,
            location,
            reorder_level,
        } = entry;
        let label = format!("product {}", input.sku);
        if let Some(slug) = brand {
            input.brand_id = Some(refs.brand(&slug, &label).await?);
        }
        if let Some(slug) = category {
            input.category_id = Some(refs.category(&slug, &label).await?);
        }
        let product = products
            .upsert(&input)
            .await
            .map_err(record_error(label.clone()))?;
        summary.products += 1;

        if let Some(quantity) = stock {
            let mut row = InventoryInput {
                product_id: product.id,
                location: "main".to_string(),
                quantity,
                reorder_level,
            };
            if let Some(location) = location {
                row.location = location;
            }
            inventory.upsert(&row).await.map_err(record_error(label))?;
            summary.stock_rows += 1;
        }
    }

    Ok(summary)
}

/// Read, parse and apply `path`, logging a summary.
///
/// # Errors
///
/// Returns `SeedError` if the file cannot be read or parsed, or a record
/// fails.
pub async fn run(pool: &PgPool, path: &Path) -> Result<SeedSummary, SeedError> {
    tracing::info!(path = %path.display(), "Loading seed file");
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Read {
            path: path.display().to_string(),
            source,
        })?;
    let seed = SeedFile::from_yaml(&content)?;

    let summary = apply(pool, seed).await?;
    tracing::info!("Seeding complete!");
    tracing::info!("  Brands: {}", summary.brands);
    tracing::info!("  Categories: {}", summary.categories);
    tracing::info!("  Shipping methods: {}", summary.shipping_methods);
    tracing::info!("  Products: {}", summary.products);
    tracing::info!("  Stock rows: {}", summary.stock_rows);
    Ok(summary)
}
