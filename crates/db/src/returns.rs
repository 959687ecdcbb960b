//! Return (RMA) repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use emporium_core::api::{ListQuery, Paginated};
use emporium_core::numbers::{self, DocumentKind};
use emporium_core::{Email, OrderId, OrderStatus, ReturnId, ReturnStatus};

use crate::listing::{ListSpec, StatusColumn, fetch_page};
use crate::{RepositoryError, non_blank, required};

const NUMBER_ATTEMPTS: usize = 5;

/// A return merchandise authorization against an order.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Return {
    pub id: ReturnId,
    pub rma_number: String,
    pub order_id: OrderId,
    pub order_number: String,
    pub order_total: Decimal,
    pub email: String,
    pub reason: String,
    pub details: Option<String>,
    pub status: ReturnStatus,
    pub refund_amount: Option<Decimal>,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A customer's return request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReturn {
    pub order_number: String,
    pub email: String,
    pub reason: String,
    #[serde(default)]
    pub details: Option<String>,
}

/// Back-office edit of a return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnInput {
    pub reason: String,
    #[serde(default)]
    pub details: Option<String>,
    pub status: ReturnStatus,
    #[serde(default)]
    pub refund_amount: Option<Decimal>,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

/// Check a status move and the refund that goes with it.
fn check_transition(
    current: &Return,
    next: ReturnStatus,
    refund_amount: Option<Decimal>,
) -> Result<(), RepositoryError> {
    if next != current.status && !current.status.can_transition_to(next) {
        return Err(RepositoryError::invalid(format!(
            "cannot change return status from {} to {next}",
            current.status
        )));
    }
    if let Some(amount) = refund_amount {
        if amount < Decimal::ZERO {
            return Err(RepositoryError::invalid("refund amount cannot be negative"));
        }
        if amount > current.order_total {
            return Err(RepositoryError::invalid(
                "refund amount cannot exceed the order total",
            ));
        }
    }
    if next == ReturnStatus::Refunded && refund_amount.is_none() {
        return Err(RepositoryError::invalid(
            "a refund amount is required to mark a return as refunded",
        ));
    }
    Ok(())
}

const SELECT: &str = "r.id, r.rma_number, r.order_id, o.order_number, o.total AS order_total, \
                      r.email, r.reason, r.details, r.status, r.refund_amount, r.admin_notes, \
                      r.created_at, r.updated_at";

const FROM: &str = "shop.returns r JOIN shop.orders o ON o.id = r.order_id";

const LISTING: ListSpec = ListSpec {
    select: SELECT,
    from: FROM,
    search: &["r.rma_number", "o.order_number", "r.email", "r.reason"],
    status: StatusColumn::Enum("r.status"),
    order_by: "r.created_at DESC, r.id DESC",
};

/// Repository for return database operations.
pub struct ReturnRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReturnRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<Return>, RepositoryError> {
        fetch_page(self.pool, &LISTING, query).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ReturnId) -> Result<Option<Return>, RepositoryError> {
        let row = sqlx::query_as::<_, Return>(&format!("SELECT {SELECT} FROM {FROM} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_number(&self, number: &str) -> Result<Option<Return>, RepositoryError> {
        let row = sqlx::query_as::<_, Return>(&format!(
            "SELECT {SELECT} FROM {FROM} WHERE r.rma_number = $1"
        ))
        .bind(number.trim().to_uppercase())
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Returns still needing staff action.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_open(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM shop.returns WHERE status IN ('requested', 'approved', 'received')",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Open a return for an order.
    ///
    /// The email must match the order and the order must have shipped.
    /// Only one open return per order is allowed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` when the order number and email
    /// do not match an order, `RepositoryError::Validation` when the order
    /// cannot be returned, `RepositoryError::Conflict` when a return is
    /// already open.
    pub async fn create(&self, request: &NewReturn) -> Result<Return, RepositoryError> {
        let email = Email::parse(&request.email).map_err(|e| RepositoryError::invalid(e.to_string()))?;
        let reason = required(&request.reason, "reason")?;

        let order = sqlx::query_as::<_, (OrderId, String, OrderStatus)>(
            "SELECT id, email, status FROM shop.orders WHERE order_number = $1",
        )
        .bind(request.order_number.trim().to_uppercase())
        .fetch_optional(self.pool)
        .await?;
        // A wrong email reads the same as an unknown order.
        let (order_id, status) = match order {
            Some((id, order_email, status)) if email.matches(&order_email) => (id, status),
            _ => return Err(RepositoryError::NotFound),
        };
        if !status.is_returnable() {
            return Err(RepositoryError::invalid(format!(
                "orders that are {status} cannot be returned"
            )));
        }

        let open = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM shop.returns \
             WHERE order_id = $1 AND status IN ('requested', 'approved', 'received'))",
        )
        .bind(order_id)
        .fetch_one(self.pool)
        .await?;
        if open {
            return Err(RepositoryError::Conflict(ALREADY_OPEN.to_owned()));
        }

        for _ in 0..NUMBER_ATTEMPTS {
            let number = numbers::generate(DocumentKind::Return, Utc::now());
            let inserted = sqlx::query_scalar::<_, ReturnId>(
                "INSERT INTO shop.returns (rma_number, order_id, email, reason, details) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (rma_number) DO NOTHING \
                 RETURNING id",
            )
            .bind(&number)
            .bind(order_id)
            .bind(email.as_str())
            .bind(&reason)
            .bind(non_blank(request.details.as_deref()))
            .fetch_optional(self.pool)
            .await
            .map_err(open_return_conflict)?;
            if let Some(id) = inserted {
                tracing::info!(rma_number = %number, %order_id, "return requested");
                return self.get(id).await?.ok_or(RepositoryError::NotFound);
            }
        }
        Err(RepositoryError::Conflict(
            "could not allocate a return number".to_owned(),
        ))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for a disallowed status change.
    pub async fn update(&self, id: ReturnId, input: &ReturnInput) -> Result<Return, RepositoryError> {
        let current = self.get(id).await?.ok_or(RepositoryError::NotFound)?;
        check_transition(&current, input.status, input.refund_amount)?;
        let reason = required(&input.reason, "reason")?;

        sqlx::query(
            "UPDATE shop.returns \
             SET reason = $2, details = $3, status = $4, refund_amount = $5, admin_notes = $6, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&reason)
        .bind(non_blank(input.details.as_deref()))
        .bind(input.status)
        .bind(input.refund_amount)
        .bind(non_blank(input.admin_notes.as_deref()))
        .execute(self.pool)
        .await?;
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Move a return along its lifecycle.
    ///
    /// Omitted refund amount and notes keep their stored values.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for a disallowed status change
    /// or a refund above the order total.
    pub async fn update_status(
        &self,
        id: ReturnId,
        next: ReturnStatus,
        refund_amount: Option<Decimal>,
        admin_notes: Option<&str>,
    ) -> Result<Return, RepositoryError> {
        let current = self.get(id).await?.ok_or(RepositoryError::NotFound)?;
        let refund = refund_amount.or(current.refund_amount);
        check_transition(&current, next, refund)?;
        let notes = non_blank(admin_notes).or_else(|| current.admin_notes.clone());

        sqlx::query(
            "UPDATE shop.returns \
             SET status = $2, refund_amount = $3, admin_notes = $4, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(next)
        .bind(refund)
        .bind(notes)
        .execute(self.pool)
        .await?;

        tracing::info!(rma_number = %current.rma_number, from = %current.status, to = %next, "return status changed");
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the return does not exist.
    pub async fn delete(&self, id: ReturnId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.returns WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Partial unique index allowing one open return per order.
const OPEN_RETURN_INDEX: &str = "returns_one_open_per_order";

const ALREADY_OPEN: &str = "a return is already open for this order";

/// A concurrent request that opened a return first trips the open-return
/// index; report it the same way as the up-front check.
fn open_return_conflict(err: sqlx::Error) -> RepositoryError {
    let open_index_hit = matches!(
        &err,
        sqlx::Error::Database(db) if db.constraint() == Some(OPEN_RETURN_INDEX)
    );
    if open_index_hit {
        return RepositoryError::Conflict(ALREADY_OPEN.to_owned());
    }
    RepositoryError::from_write(err)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stored(status: ReturnStatus) -> Return {
        let now = Utc::now();
        Return {
            id: ReturnId::new(1),
            rma_number: "RMA-20250601-ABCDEF".to_owned(),
            order_id: OrderId::new(7),
            order_number: "ORD-20250520-XYZ234".to_owned(),
            order_total: "120.00".parse().unwrap(),
            email: "buyer@example.com".to_owned(),
            reason: "Too small".to_owned(),
            details: None,
            status,
            refund_amount: None,
            admin_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_transition_rules_apply() {
        let requested = stored(ReturnStatus::Requested);
        assert!(check_transition(&requested, ReturnStatus::Approved, None).is_ok());
        assert!(check_transition(&requested, ReturnStatus::Received, None).is_err());
        // Saving without a status change is always allowed.
        assert!(check_transition(&requested, ReturnStatus::Requested, None).is_ok());
    }

    #[test]
    fn test_refund_bounds() {
        let received = stored(ReturnStatus::Received);
        assert!(check_transition(&received, ReturnStatus::Refunded, None).is_err());
        assert!(
            check_transition(&received, ReturnStatus::Refunded, Some("120.00".parse().unwrap()))
                .is_ok()
        );
        assert!(
            check_transition(&received, ReturnStatus::Refunded, Some("120.01".parse().unwrap()))
                .is_err()
        );
    }
}
