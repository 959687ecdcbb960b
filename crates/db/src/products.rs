//! Product repository: back-office CRUD and storefront catalog queries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use emporium_core::api::{ListQuery, Paginated};
use emporium_core::{BrandId, CategoryId, ProductId, ProductStatus, Slug};

use crate::brands::optional_url;
use crate::listing::{ListSpec, StatusColumn, fetch_page, like_pattern};
use crate::{RepositoryError, required};

/// Longest warranty a product may carry.
pub const MAX_WARRANTY_MONTHS: i32 = 120;

/// A catalog product.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub brand_id: Option<BrandId>,
    pub category_id: Option<CategoryId>,
    pub status: ProductStatus,
    pub is_featured: bool,
    pub image_url: Option<String>,
    pub warranty_months: i32,
    /// Attribute name to value.
    pub attributes: Json<BTreeMap<String, serde_json::Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether customers can see and buy the product.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// Attribute values rendered as display strings, in name order.
    #[must_use]
    pub fn attribute_pairs(&self) -> Vec<(String, String)> {
        self.attributes
            .0
            .iter()
            .map(|(name, value)| {
                let shown = match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Bool(true) => "Yes".to_owned(),
                    serde_json::Value::Bool(false) => "No".to_owned(),
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                (name.clone(), shown)
            })
            .collect()
    }
}

/// Create/update payload for a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub sku: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub brand_id: Option<BrandId>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub warranty_months: i32,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

struct ValidProduct {
    name: String,
    slug: Slug,
    sku: String,
    description: String,
    price: Decimal,
    compare_at_price: Option<Decimal>,
    image_url: Option<String>,
}

impl ProductInput {
    fn validate(&self) -> Result<ValidProduct, RepositoryError> {
        let name = required(&self.name, "name")?;
        let sku = required(&self.sku, "SKU")?.to_uppercase();
        let slug = Slug::explicit_or_from(self.slug.as_deref(), &name)
            .map_err(|e| RepositoryError::invalid(e.to_string()))?;

        if self.price < Decimal::ZERO {
            return Err(RepositoryError::invalid("price cannot be negative"));
        }
        if let Some(compare_at) = self.compare_at_price
            && compare_at <= self.price
        {
            return Err(RepositoryError::invalid(
                "compare-at price must be greater than the price",
            ));
        }
        if !(0..=MAX_WARRANTY_MONTHS).contains(&self.warranty_months) {
            return Err(RepositoryError::invalid(format!(
                "warranty must be between 0 and {MAX_WARRANTY_MONTHS} months"
            )));
        }

        Ok(ValidProduct {
            name,
            slug,
            sku,
            description: self.description.trim().to_owned(),
            price: self.price.round_dp(2),
            compare_at_price: self.compare_at_price.map(|p| p.round_dp(2)),
            image_url: optional_url(self.image_url.as_deref(), "image URL")?,
        })
    }
}

/// Storefront sort orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl CatalogSort {
    pub const ALL: [Self; 4] = [Self::Newest, Self::PriceAsc, Self::PriceDesc, Self::Name];

    const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id ASC",
            Self::Name => "p.name ASC, p.id ASC",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Name => "name",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Newest => "Newest",
            Self::PriceAsc => "Price: low to high",
            Self::PriceDesc => "Price: high to low",
            Self::Name => "Name",
        }
    }
}

/// Storefront catalog filters (`/products?q=&category=&brand=&sort=&page=`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFilter {
    #[serde(default)]
    pub q: Option<String>,
    /// Category slug.
    #[serde(default)]
    pub category: Option<String>,
    /// Brand slug.
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub sort: CatalogSort,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

impl CatalogFilter {
    /// Products per storefront page.
    pub const PAGE_SIZE: u32 = 12;

    /// Paging parameters for this filter.
    #[must_use]
    pub fn list_query(&self) -> ListQuery {
        ListQuery {
            q: self.q.clone(),
            status: None,
            page: self.page,
            per_page: Some(self.per_page.unwrap_or(Self::PAGE_SIZE)),
        }
    }

    fn category(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn brand(&self) -> Option<&str> {
        self.brand.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(
            " FROM shop.products p \
             LEFT JOIN shop.categories c ON c.id = p.category_id \
             LEFT JOIN shop.brands b ON b.id = p.brand_id \
             WHERE p.status = 'active'",
        );
        if let Some(category) = self.category() {
            qb.push(" AND c.slug = ").push_bind(category.to_owned());
        }
        if let Some(brand) = self.brand() {
            qb.push(" AND b.slug = ").push_bind(brand.to_owned());
        }
        if let Some(term) = self.list_query().search() {
            let pattern = like_pattern(term);
            qb.push(" AND (p.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.sku ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

const LISTING: ListSpec = ListSpec {
    select: "*",
    from: "shop.products",
    search: &["name", "sku", "slug"],
    status: StatusColumn::Enum("status"),
    order_by: "updated_at DESC, id DESC",
};

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products for the back-office, any status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<Product>, RepositoryError> {
        fetch_page(self.pool, &LISTING, query).await
    }

    /// Active products for the storefront catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(
        &self,
        filter: &CatalogFilter,
    ) -> Result<Paginated<Product>, RepositoryError> {
        let query = filter.list_query();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        filter.push_where(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut rows = QueryBuilder::<Postgres>::new("SELECT p.*");
        filter.push_where(&mut rows);
        rows.push(" ORDER BY ")
            .push(filter.sort.order_by())
            .push(" LIMIT ")
            .push_bind(query.limit())
            .push(" OFFSET ")
            .push_bind(query.offset());
        let items = rows
            .build_query_as::<Product>()
            .fetch_all(self.pool)
            .await?;

        Ok(Paginated::new(items, &query, total))
    }

    /// Featured active products, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn featured(&self, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, Product>(
            "SELECT * FROM shop.products \
             WHERE status = 'active' AND is_featured \
             ORDER BY updated_at DESC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, Product>("SELECT * FROM shop.products WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, Product>("SELECT * FROM shop.products WHERE slug = $1")
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Fetch several products at once, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, Product>("SELECT * FROM shop.products WHERE id = ANY($1)")
            .bind(raw)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM shop.products")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for bad input and
    /// `RepositoryError::Conflict` if the slug or SKU is taken.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let product = input.validate()?;
        sqlx::query_as::<_, Product>(
            "INSERT INTO shop.products \
                 (name, slug, sku, description, price, compare_at_price, brand_id, category_id, \
                  status, is_featured, image_url, warranty_months, attributes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING *",
        )
        .bind(&product.name)
        .bind(product.slug.as_str())
        .bind(&product.sku)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.compare_at_price)
        .bind(input.brand_id)
        .bind(input.category_id)
        .bind(input.status)
        .bind(input.is_featured)
        .bind(&product.image_url)
        .bind(input.warranty_months)
        .bind(Json(&input.attributes))
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::from_write)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let product = input.validate()?;
        sqlx::query_as::<_, Product>(
            "UPDATE shop.products \
             SET name = $2, slug = $3, sku = $4, description = $5, price = $6, \
                 compare_at_price = $7, brand_id = $8, category_id = $9, status = $10, \
                 is_featured = $11, image_url = $12, warranty_months = $13, attributes = $14, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(id)
        .bind(&product.name)
        .bind(product.slug.as_str())
        .bind(&product.sku)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.compare_at_price)
        .bind(input.brand_id)
        .bind(input.category_id)
        .bind(input.status)
        .bind(input.is_featured)
        .bind(&product.image_url)
        .bind(input.warranty_months)
        .bind(Json(&input.attributes))
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::from_write)?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn set_status(
        &self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.products SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn set_featured(&self, id: ProductId, featured: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.products SET is_featured = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(featured)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a product and its inventory, deals and warranties.
    ///
    /// Order lines keep their copied name, SKU and price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(RepositoryError::from_write)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Insert or update a product keyed by SKU. Used by the seeder.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for bad input.
    pub async fn upsert(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let product = input.validate()?;
        sqlx::query_as::<_, Product>(
            "INSERT INTO shop.products \
                 (name, slug, sku, description, price, compare_at_price, brand_id, category_id, \
                  status, is_featured, image_url, warranty_months, attributes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (sku) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 slug = EXCLUDED.slug, \
                 description = EXCLUDED.description, \
                 price = EXCLUDED.price, \
                 compare_at_price = EXCLUDED.compare_at_price, \
                 brand_id = EXCLUDED.brand_id, \
                 category_id = EXCLUDED.category_id, \
                 status = EXCLUDED.status, \
                 is_featured = EXCLUDED.is_featured, \
                 image_url = EXCLUDED.image_url, \
                 warranty_months = EXCLUDED.warranty_months, \
                 attributes = EXCLUDED.attributes, \
                 updated_at = NOW() \
             RETURNING *",
        )
        .bind(&product.name)
        .bind(product.slug.as_str())
        .bind(&product.sku)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.compare_at_price)
        .bind(input.brand_id)
        .bind(input.category_id)
        .bind(input.status)
        .bind(input.is_featured)
        .bind(&product.image_url)
        .bind(input.warranty_months)
        .bind(Json(&input.attributes))
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::from_write)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> ProductInput {
        serde_json::from_value(serde_json::json!({
            "name": "Trail Runner",
            "sku": "tr-001",
            "price": "89.50"
        }))
        .unwrap()
    }

    #[test]
    fn test_defaults_and_normalization() {
        let raw = input();
        assert_eq!(raw.status, ProductStatus::Draft);
        let valid = raw.validate().unwrap();
        assert_eq!(valid.sku, "TR-001");
        assert_eq!(valid.slug.as_str(), "trail-runner");
    }

    #[test]
    fn test_price_rules() {
        let mut raw = input();
        raw.price = "-1".parse().unwrap();
        assert!(raw.validate().is_err());

        let mut raw = input();
        raw.compare_at_price = Some("89.50".parse().unwrap());
        assert!(raw.validate().is_err());
        raw.compare_at_price = Some("99.00".parse().unwrap());
        assert!(raw.validate().is_ok());
    }

    #[test]
    fn test_warranty_bounds() {
        let mut raw = input();
        raw.warranty_months = MAX_WARRANTY_MONTHS + 1;
        assert!(raw.validate().is_err());
        raw.warranty_months = 24;
        assert!(raw.validate().is_ok());
    }

    #[test]
    fn test_catalog_filter_sql() {
        let filter = CatalogFilter {
            q: Some("boot".to_owned()),
            category: Some("shoes".to_owned()),
            brand: Some("  ".to_owned()),
            ..CatalogFilter::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        filter.push_where(&mut qb);
        let sql = qb.sql();
        assert!(sql.contains("c.slug = $1"));
        assert!(!sql.contains("b.slug"));
        assert!(sql.contains("p.name ILIKE $2"));
        assert!(sql.contains("p.status = 'active'"));
    }

    #[test]
    fn test_catalog_sort_parses_snake_case() {
        let filter: CatalogFilter = serde_json::from_str(r#"{"sort": "price_desc"}"#).unwrap();
        assert_eq!(filter.sort, CatalogSort::PriceDesc);
        assert_eq!(filter.list_query().per_page(), CatalogFilter::PAGE_SIZE);
    }

    #[test]
    fn test_attribute_pairs() {
        let mut product_attrs = BTreeMap::new();
        product_attrs.insert("Waterproof".to_owned(), serde_json::json!(true));
        product_attrs.insert("Weight".to_owned(), serde_json::json!(310));
        let product = Product {
            id: ProductId::new(1),
            name: "Boot".to_owned(),
            slug: "boot".to_owned(),
            sku: "B-1".to_owned(),
            description: String::new(),
            price: Decimal::ONE,
            compare_at_price: None,
            brand_id: None,
            category_id: None,
            status: ProductStatus::Active,
            is_featured: false,
            image_url: None,
            warranty_months: 0,
            attributes: Json(product_attrs),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(
            product.attribute_pairs(),
            vec![
                ("Waterproof".to_owned(), "Yes".to_owned()),
                ("Weight".to_owned(), "310".to_owned()),
            ]
        );
        assert!(product.is_visible());
    }
}
