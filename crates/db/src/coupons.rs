//! Coupon repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use emporium_core::api::{ListQuery, Paginated};
use emporium_core::pricing::{CouponRule, validate_coupon_value};
use emporium_core::{CouponId, DiscountType};

use crate::listing::{ListSpec, StatusColumn, fetch_page};
use crate::{RepositoryError, non_blank};

/// A discount code.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub min_order_amount: Option<Decimal>,
    pub max_uses: Option<i32>,
    pub used_count: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// The pricing rule for this coupon.
    #[must_use]
    pub fn rule(&self) -> CouponRule {
        CouponRule {
            code: self.code.clone(),
            discount_type: self.discount_type,
            value: self.value,
            min_order_amount: self.min_order_amount,
            max_uses: self.max_uses,
            used_count: self.used_count,
            starts_at: self.starts_at,
            expires_at: self.expires_at,
            is_active: self.is_active,
        }
    }
}

/// Normalize a customer-typed code: trimmed and uppercased.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Create/update payload for a coupon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponInput {
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub value: Decimal,
    #[serde(default)]
    pub min_order_amount: Option<Decimal>,
    #[serde(default)]
    pub max_uses: Option<i32>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "crate::users::default_true")]
    pub is_active: bool,
}

impl CouponInput {
    fn validate(&self) -> Result<String, RepositoryError> {
        let code = normalize_code(&self.code);
        if code.is_empty() {
            return Err(RepositoryError::invalid("code is required"));
        }
        if !code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(RepositoryError::invalid(
                "code may only contain letters, digits, dashes and underscores",
            ));
        }
        validate_coupon_value(self.discount_type, self.value).map_err(RepositoryError::Validation)?;
        if self.min_order_amount.is_some_and(|min| min < Decimal::ZERO) {
            return Err(RepositoryError::invalid("minimum order cannot be negative"));
        }
        if self.max_uses.is_some_and(|max| max <= 0) {
            return Err(RepositoryError::invalid("max uses must be positive"));
        }
        if let (Some(starts), Some(expires)) = (self.starts_at, self.expires_at)
            && expires <= starts
        {
            return Err(RepositoryError::invalid("expiry must be after start"));
        }
        Ok(code)
    }
}

const LISTING: ListSpec = ListSpec {
    select: "*",
    from: "shop.coupons",
    search: &["code", "description"],
    status: StatusColumn::Active("is_active"),
    order_by: "created_at DESC, id DESC",
};

/// Repository for coupon database operations.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<Coupon>, RepositoryError> {
        fetch_page(self.pool, &LISTING, query).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CouponId) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as::<_, Coupon>("SELECT * FROM shop.coupons WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Look up a coupon by code, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as::<_, Coupon>("SELECT * FROM shop.coupons WHERE code = $1")
            .bind(normalize_code(code))
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is taken.
    pub async fn create(&self, input: &CouponInput) -> Result<Coupon, RepositoryError> {
        let code = input.validate()?;
        sqlx::query_as::<_, Coupon>(
            "INSERT INTO shop.coupons \
                 (code, description, discount_type, value, min_order_amount, max_uses, \
                  starts_at, expires_at, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING *",
        )
        .bind(&code)
        .bind(non_blank(input.description.as_deref()))
        .bind(input.discount_type)
        .bind(input.value)
        .bind(input.min_order_amount)
        .bind(input.max_uses)
        .bind(input.starts_at)
        .bind(input.expires_at)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::from_write)
    }

    /// Update a coupon. The usage counter is kept.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    pub async fn update(&self, id: CouponId, input: &CouponInput) -> Result<Coupon, RepositoryError> {
        let code = input.validate()?;
        sqlx::query_as::<_, Coupon>(
            "UPDATE shop.coupons \
             SET code = $2, description = $3, discount_type = $4, value = $5, \
                 min_order_amount = $6, max_uses = $7, starts_at = $8, expires_at = $9, \
                 is_active = $10, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(id)
        .bind(&code)
        .bind(non_blank(input.description.as_deref()))
        .bind(input.discount_type)
        .bind(input.value)
        .bind(input.min_order_amount)
        .bind(input.max_uses)
        .bind(input.starts_at)
        .bind(input.expires_at)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::from_write)?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    pub async fn set_active(&self, id: CouponId, is_active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.coupons SET is_active = $2, updated_at = NOW() WHERE id = $1",
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

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    pub async fn delete(&self, id: CouponId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.coupons WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Count one use of a coupon inside an open transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` when the usage limit has been
    /// reached in the meantime.
    pub async fn increment_usage(conn: &mut PgConnection, id: CouponId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.coupons \
             SET used_count = used_count + 1, updated_at = NOW() \
             WHERE id = $1 AND (max_uses IS NULL OR used_count < max_uses)",
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(
                "coupon usage limit reached".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(code: &str, discount_type: DiscountType, value: &str) -> CouponInput {
        CouponInput {
            code: code.to_owned(),
            description: None,
            discount_type,
            value: value.parse().unwrap(),
            min_order_amount: None,
            max_uses: None,
            starts_at: None,
            expires_at: None,
            is_active: true,
        }
    }

    #[test]
    fn test_code_is_uppercased() {
        let code = input(" summer-10 ", DiscountType::Percentage, "10")
            .validate()
            .unwrap();
        assert_eq!(code, "SUMMER-10");
    }

    #[test]
    fn test_code_charset() {
        assert!(input("BAD CODE", DiscountType::Percentage, "10").validate().is_err());
        assert!(input("", DiscountType::Percentage, "10").validate().is_err());
    }

    #[test]
    fn test_value_bounds() {
        assert!(input("X", DiscountType::Percentage, "150").validate().is_err());
        assert!(input("X", DiscountType::FixedAmount, "150").validate().is_ok());
        assert!(input("X", DiscountType::FixedAmount, "0").validate().is_err());
    }

    #[test]
    fn test_max_uses_positive() {
        let mut coupon = input("X", DiscountType::FixedAmount, "5");
        coupon.max_uses = Some(0);
        assert!(coupon.validate().is_err());
    }
}
