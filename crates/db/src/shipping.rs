//! Shipping method repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use emporium_core::ShippingMethodId;
use emporium_core::api::{ListQuery, Paginated};
use emporium_core::pricing::ShippingRule;

use crate::listing::{ListSpec, StatusColumn, fetch_page};
use crate::{RepositoryError, non_blank, required};

/// A delivery option offered at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShippingMethod {
    pub id: ShippingMethodId,
    pub name: String,
    pub description: Option<String>,
    pub carrier: Option<String>,
    pub base_rate: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
    pub min_days: i32,
    pub max_days: i32,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShippingMethod {
    #[must_use]
    pub const fn rule(&self) -> ShippingRule {
        ShippingRule {
            base_rate: self.base_rate,
            free_shipping_threshold: self.free_shipping_threshold,
        }
    }

    /// Delivery estimate such as `3-5 business days`.
    #[must_use]
    pub fn delivery_estimate(&self) -> String {
        if self.min_days == self.max_days {
            let unit = if self.min_days == 1 { "day" } else { "days" };
            format!("{} business {unit}", self.min_days)
        } else {
            format!("{}-{} business days", self.min_days, self.max_days)
        }
    }
}

/// Create/update payload for a shipping method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingMethodInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    pub base_rate: Decimal,
    #[serde(default)]
    pub free_shipping_threshold: Option<Decimal>,
    pub min_days: i32,
    pub max_days: i32,
    #[serde(default = "crate::users::default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i32,
}

impl ShippingMethodInput {
    fn validate(&self) -> Result<String, RepositoryError> {
        let name = required(&self.name, "name")?;
        if self.base_rate < Decimal::ZERO {
            return Err(RepositoryError::invalid("rate cannot be negative"));
        }
        if self
            .free_shipping_threshold
            .is_some_and(|t| t < Decimal::ZERO)
        {
            return Err(RepositoryError::invalid(
                "free shipping threshold cannot be negative",
            ));
        }
        if self.min_days < 0 || self.min_days > self.max_days {
            return Err(RepositoryError::invalid(
                "delivery days must satisfy 0 <= min <= max",
            ));
        }
        Ok(name)
    }
}

const LISTING: ListSpec = ListSpec {
    select: "*",
    from: "shop.shipping_methods",
    search: &["name", "carrier"],
    status: StatusColumn::Active("is_active"),
    order_by: "sort_order ASC, name ASC",
};

/// Repository for shipping method database operations.
pub struct ShippingMethodRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShippingMethodRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<ShippingMethod>, RepositoryError> {
        fetch_page(self.pool, &LISTING, query).await
    }

    /// Methods offered at checkout.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<ShippingMethod>, RepositoryError> {
        let rows = sqlx::query_as::<_, ShippingMethod>(
            "SELECT * FROM shop.shipping_methods WHERE is_active ORDER BY sort_order, name",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ShippingMethodId) -> Result<Option<ShippingMethod>, RepositoryError> {
        let row = sqlx::query_as::<_, ShippingMethod>(
            "SELECT * FROM shop.shipping_methods WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create(&self, input: &ShippingMethodInput) -> Result<ShippingMethod, RepositoryError> {
        let name = input.validate()?;
        sqlx::query_as::<_, ShippingMethod>(
            "INSERT INTO shop.shipping_methods \
                 (name, description, carrier, base_rate, free_shipping_threshold, \
                  min_days, max_days, is_active, sort_order) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING *",
        )
        .bind(&name)
        .bind(non_blank(input.description.as_deref()))
        .bind(non_blank(input.carrier.as_deref()))
        .bind(input.base_rate)
        .bind(input.free_shipping_threshold)
        .bind(input.min_days)
        .bind(input.max_days)
        .bind(input.is_active)
        .bind(input.sort_order)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::from_write)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the method does not exist.
    pub async fn update(
        &self,
        id: ShippingMethodId,
        input: &ShippingMethodInput,
    ) -> Result<ShippingMethod, RepositoryError> {
        let name = input.validate()?;
        sqlx::query_as::<_, ShippingMethod>(
            "UPDATE shop.shipping_methods \
             SET name = $2, description = $3, carrier = $4, base_rate = $5, \
                 free_shipping_threshold = $6, min_days = $7, max_days = $8, is_active = $9, \
                 sort_order = $10, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(id)
        .bind(&name)
        .bind(non_blank(input.description.as_deref()))
        .bind(non_blank(input.carrier.as_deref()))
        .bind(input.base_rate)
        .bind(input.free_shipping_threshold)
        .bind(input.min_days)
        .bind(input.max_days)
        .bind(input.is_active)
        .bind(input.sort_order)
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::from_write)?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the method does not exist.
    pub async fn set_active(&self, id: ShippingMethodId, is_active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.shipping_methods SET is_active = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(is_active)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a method. Past orders keep the copied method name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the method does not exist.
    pub async fn delete(&self, id: ShippingMethodId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.shipping_methods WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(RepositoryError::from_write)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Insert or update a method keyed by name. Used by the seeder.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for bad input.
    pub async fn upsert(&self, input: &ShippingMethodInput) -> Result<ShippingMethod, RepositoryError> {
        let name = input.validate()?;
        sqlx::query_as::<_, ShippingMethod>(
            "INSERT INTO shop.shipping_methods \
                 (name, description, carrier, base_rate, free_shipping_threshold, \
                  min_days, max_days, is_active, sort_order) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (name) DO UPDATE SET \
                 description = EXCLUDED.description, \
                 carrier = EXCLUDED.carrier, \
                 base_rate = EXCLUDED.base_rate, \
                 free_shipping_threshold = EXCLUDED.free_shipping_threshold, \
                 min_days = EXCLUDED.min_days, \
                 max_days = EXCLUDED.max_days, \
                 is_active = EXCLUDED.is_active, \
                 sort_order = EXCLUDED.sort_order, \
                 updated_at = NOW() \
             RETURNING *",
        )
        .bind(&name)
        .bind(non_blank(input.description.as_deref()))
        .bind(non_blank(input.carrier.as_deref()))
        .bind(input.base_rate)
        .bind(input.free_shipping_threshold)
        .bind(input.min_days)
        .bind(input.max_days)
        .bind(input.is_active)
        .bind(input.sort_order)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::from_write)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(min_days: i32, max_days: i32) -> ShippingMethodInput {
        ShippingMethodInput {
            name: "Standard".to_owned(),
            description: None,
            carrier: Some("UPS".to_owned()),
            base_rate: "5.95".parse().unwrap(),
            free_shipping_threshold: Some("75".parse().unwrap()),
            min_days,
            max_days,
            is_active: true,
            sort_order: 0,
        }
    }

    #[test]
    fn test_days_ordering() {
        assert!(input(3, 5).validate().is_ok());
        assert!(input(5, 3).validate().is_err());
        assert!(input(-1, 3).validate().is_err());
    }

    #[test]
    fn test_delivery_estimate() {
        let now = Utc::now();
        let method = ShippingMethod {
            id: ShippingMethodId::new(1),
            name: "Express".to_owned(),
            description: None,
            carrier: None,
            base_rate: Decimal::TEN,
            free_shipping_threshold: None,
            min_days: 1,
            max_days: 1,
            is_active: true,
            sort_order: 0,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(method.delivery_estimate(), "1 business day");
        let slower = ShippingMethod {
            min_days: 3,
            max_days: 5,
            ..method
        };
        assert_eq!(slower.delivery_estimate(), "3-5 business days");
    }
}
