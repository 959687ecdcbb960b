//! Flash deal repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use emporium_core::api::{ListQuery, Paginated};
use emporium_core::pricing::DealRule;
use emporium_core::{DealId, ProductId};

use crate::listing::{ListSpec, StatusColumn, fetch_page};
use crate::{RepositoryError, required};

/// A time-boxed price on one product.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Deal {
    pub id: DealId,
    pub title: String,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_slug: String,
    pub regular_price: Decimal,
    pub deal_price: Decimal,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub quantity_limit: Option<i32>,
    pub sold_count: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deal {
    /// The pricing rule for this deal.
    #[must_use]
    pub const fn rule(&self) -> DealRule {
        DealRule {
            deal_price: self.deal_price,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            quantity_limit: self.quantity_limit,
            sold_count: self.sold_count,
            is_active: self.is_active,
        }
    }
}

/// Create/update payload for a deal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealInput {
    pub title: String,
    pub product_id: ProductId,
    pub deal_price: Decimal,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub quantity_limit: Option<i32>,
    #[serde(default = "crate::users::default_true")]
    pub is_active: bool,
}

impl DealInput {
    fn validate(&self) -> Result<String, RepositoryError> {
        let title = required(&self.title, "title")?;
        if self.deal_price < Decimal::ZERO {
            return Err(RepositoryError::invalid("deal price cannot be negative"));
        }
        if self.ends_at <= self.starts_at {
            return Err(RepositoryError::invalid("end must be after start"));
        }
        if self.quantity_limit.is_some_and(|limit| limit <= 0) {
            return Err(RepositoryError::invalid("quantity limit must be positive"));
        }
        Ok(title)
    }
}

const SELECT: &str = "d.id, d.title, d.product_id, p.name AS product_name, \
                      p.slug AS product_slug, p.price AS regular_price, d.deal_price, \
                      d.starts_at, d.ends_at, d.quantity_limit, d.sold_count, d.is_active, \
                      d.created_at, d.updated_at";

const FROM: &str = "shop.deals d JOIN shop.products p ON p.id = d.product_id";

const LISTING: ListSpec = ListSpec {
    select: SELECT,
    from: FROM,
    search: &["d.title", "p.name", "p.sku"],
    status: StatusColumn::Active("d.is_active"),
    order_by: "d.starts_at DESC, d.id DESC",
};

/// Repository for deal database operations.
pub struct DealRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DealRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<Deal>, RepositoryError> {
        fetch_page(self.pool, &LISTING, query).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: DealId) -> Result<Option<Deal>, RepositoryError> {
        let row = sqlx::query_as::<_, Deal>(&format!("SELECT {SELECT} FROM {FROM} WHERE d.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Deals live at `now` on active products, ending soonest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active(&self, now: DateTime<Utc>) -> Result<Vec<Deal>, RepositoryError> {
        let rows = sqlx::query_as::<_, Deal>(&format!(
            "SELECT {SELECT} FROM {FROM} \
             WHERE d.is_active AND p.status = 'active' \
               AND d.starts_at <= $1 AND d.ends_at > $1 \
               AND (d.quantity_limit IS NULL OR d.sold_count < d.quantity_limit) \
             ORDER BY d.ends_at ASC"
        ))
        .bind(now)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// The cheapest deal live on a product at `now`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_for_product(
        &self,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<Option<Deal>, RepositoryError> {
        let row = sqlx::query_as::<_, Deal>(&format!(
            "SELECT {SELECT} FROM {FROM} \
             WHERE d.product_id = $1 AND d.is_active \
               AND d.starts_at <= $2 AND d.ends_at > $2 \
               AND (d.quantity_limit IS NULL OR d.sold_count < d.quantity_limit) \
             ORDER BY d.deal_price ASC \
             LIMIT 1"
        ))
        .bind(product_id)
        .bind(now)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for bad input or an unknown product.
    pub async fn create(&self, input: &DealInput) -> Result<Deal, RepositoryError> {
        let title = input.validate()?;
        let id = sqlx::query_scalar::<_, DealId>(
            "INSERT INTO shop.deals \
                 (title, product_id, deal_price, starts_at, ends_at, quantity_limit, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id",
        )
        .bind(&title)
        .bind(input.product_id)
        .bind(input.deal_price)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .bind(input.quantity_limit)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::from_write)?;
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Update a deal. The sold counter is kept.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the deal does not exist.
    pub async fn update(&self, id: DealId, input: &DealInput) -> Result<Deal, RepositoryError> {
        let title = input.validate()?;
        let updated = sqlx::query_scalar::<_, DealId>(
            "UPDATE shop.deals \
             SET title = $2, product_id = $3, deal_price = $4, starts_at = $5, ends_at = $6, \
                 quantity_limit = $7, is_active = $8, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING id",
        )
        .bind(id)
        .bind(&title)
        .bind(input.product_id)
        .bind(input.deal_price)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .bind(input.quantity_limit)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::from_write)?;
        if updated.is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the deal does not exist.
    pub async fn set_active(&self, id: DealId, is_active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE shop.deals SET is_active = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(is_active)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the deal does not exist.
    pub async fn delete(&self, id: DealId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.deals WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(RepositoryError::from_write)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Count units sold at the deal price inside an open transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` when the deal sold out in the
    /// meantime.
    pub async fn record_sale(
        conn: &mut PgConnection,
        id: DealId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.deals \
             SET sold_count = sold_count + $2, updated_at = NOW() \
             WHERE id = $1 AND (quantity_limit IS NULL OR sold_count + $2 <= quantity_limit)",
        )
        .bind(id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(
                "flash deal quantity sold out".to_owned(),
            ));
        }
        Ok(())
    }
}
