//! Placed orders. Orders come from checkout; the back-office moves them
//! through fulfillment and payment states.

use sqlx::PgPool;

use emporium_core::api::{ListQuery, Paginated};
use emporium_core::{CurrencyCode, OrderId, OrderStatus, PaymentStatus};
use emporium_db::{Order, OrderRepository, RepositoryError, StatusChange};

use crate::components::{BulkAction, DataTableConfig, TableColumn, TableFilter};
use crate::error::AppError;

use super::{Cell, Ctx, Patch, Resource, csv_time, empty_patch, money, short_time, unknown_action};

pub struct Orders;

pub const fn status_tone(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "warning",
        OrderStatus::Processing | OrderStatus::Shipped => "info",
        OrderStatus::Delivered => "success",
        OrderStatus::Cancelled | OrderStatus::Refunded => "muted",
    }
}

pub const fn payment_tone(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "warning",
        PaymentStatus::Paid => "success",
        PaymentStatus::Failed => "danger",
        PaymentStatus::Refunded => "muted",
    }
}

/// Move an order to `next`, logging the change.
///
/// # Errors
///
/// Returns `RepositoryError::Validation` for a transition the lifecycle
/// does not allow.
pub async fn transition(ctx: Ctx<'_>, id: OrderId, next: OrderStatus) -> Result<Order, AppError> {
    let order = OrderRepository::new(ctx.pool).update_status(id, next).await?;
    tracing::info!(
        order_id = %id,
        order_number = %order.order_number,
        status = %next,
        admin_id = %ctx.admin.id,
        "Order status changed"
    );
    Ok(order)
}

/// Read the order and payment moves out of a patch. Both are applied
/// together or not at all.
fn status_change(patch: &Patch) -> Result<StatusChange, AppError> {
    let status = patch.status_as::<OrderStatus>()?;
    let payment_status = patch
        .payment_status
        .as_deref()
        .map(|s| {
            s.parse::<PaymentStatus>()
                .map_err(|e| AppError::BadRequest(e.to_string()))
        })
        .transpose()?;
    if status.is_none() && payment_status.is_none() {
        return Err(empty_patch());
    }
    Ok(StatusChange {
        status,
        payment_status,
    })
}

impl Resource for Orders {
    type Id = OrderId;
    type Record = Order;

    const PATH: &'static str = "orders";
    const TITLE: &'static str = "Orders";
    const SINGULAR: &'static str = "order";
    const CREATABLE: bool = false;

    fn table() -> DataTableConfig {
        DataTableConfig::new("orders")
            .column(TableColumn::new("number", "Order"))
            .column(TableColumn::new("customer", "Customer"))
            .column(TableColumn::new("email", "Email").visible(false))
            .column(TableColumn::new("total", "Total"))
            .column(TableColumn::new("status", "Status"))
            .column(TableColumn::new("payment", "Payment"))
            .column(TableColumn::new("shipping", "Shipping").visible(false))
            .column(TableColumn::new("created", "Placed"))
            .filter(TableFilter::status(
                "Status",
                OrderStatus::ALL.iter().map(|s| (s.as_str(), s.label())),
            ))
            .bulk_actions([
                BulkAction::new("processing", "Mark processing", "ph-gear"),
                BulkAction::new("shipped", "Mark shipped", "ph-truck"),
                BulkAction::new("delivered", "Mark delivered", "ph-package"),
                BulkAction::new("cancelled", "Cancel", "ph-x-circle").destructive(),
            ])
            .search_placeholder("Search by order number, email or name...")
            .empty_state("ph-receipt", "No orders yet", Some("Orders placed on the storefront appear here."))
    }

    fn id(record: &Order) -> OrderId {
        record.id
    }

    fn label(record: &Order) -> String {
        record.order_number.clone()
    }

    fn href(id: OrderId) -> String {
        format!("/admin/orders/{id}")
    }

    fn cells(record: &Order, currency: CurrencyCode) -> Vec<Cell> {
        vec![
            Cell::text(&record.order_number),
            Cell::text(&record.shipping_address.customer_name),
            Cell::text(&record.email),
            Cell::text(money(record.total, currency)),
            Cell::badge(record.status.label(), status_tone(record.status)),
            Cell::badge(record.payment_status.label(), payment_tone(record.payment_status)),
            Cell::text(&record.shipping_method_name),
            Cell::text(short_time(record.created_at)),
        ]
    }

    fn csv_header() -> &'static [&'static str] {
        &[
            "id",
            "order_number",
            "email",
            "customer_name",
            "shipping_address",
            "shipping_method",
            "coupon_code",
            "subtotal",
            "discount_total",
            "shipping_total",
            "total",
            "status",
            "payment_status",
            "paid_at",
            "created_at",
        ]
    }

    fn csv_row(record: &Order) -> Vec<String> {
        vec![
            record.id.to_string(),
            record.order_number.clone(),
            record.email.clone(),
            record.shipping_address.customer_name.clone(),
            record.shipping_address.one_line(),
            record.shipping_method_name.clone(),
            record.coupon_code.clone().unwrap_or_default(),
            record.subtotal.to_string(),
            record.discount_total.to_string(),
            record.shipping_total.to_string(),
            record.total.to_string(),
            record.status.to_string(),
            record.payment_status.to_string(),
            csv_time(record.paid_at),
            csv_time(Some(record.created_at)),
        ]
    }

    async fn list(pool: &PgPool, query: &ListQuery) -> Result<Paginated<Order>, RepositoryError> {
        OrderRepository::new(pool).list(query).await
    }

    async fn get(pool: &PgPool, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        OrderRepository::new(pool).get(id).await
    }

    async fn patch(ctx: Ctx<'_>, id: OrderId, patch: Patch) -> Result<Order, AppError> {
        let change = status_change(&patch)?;
        let order = OrderRepository::new(ctx.pool)
            .apply_status_change(id, change)
            .await?;
        tracing::info!(
            order_id = %id,
            order_number = %order.order_number,
            status = ?change.status,
            payment_status = ?change.payment_status,
            admin_id = %ctx.admin.id,
            "Order updated"
        );
        Ok(order)
    }

    async fn bulk(ctx: Ctx<'_>, id: OrderId, action: &str) -> Result<(), AppError> {
        let next = match action {
            "processing" => OrderStatus::Processing,
            "shipped" => OrderStatus::Shipped,
            "delivered" => OrderStatus::Delivered,
            "cancelled" => OrderStatus::Cancelled,
            other => return Err(unknown_action(other)),
        };
        transition(ctx, id, next).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order() -> Order {
        serde_json::from_value(serde_json::json!({
            "id": 12,
            "order_number": "ORD-20260301-K7MXQ2",
            "email": "dana@example.org",
            "shipping_address": {
                "customer_name": "Dana Reyes",
                "address_line1": "1 Main St",
                "city": "Springfield",
                "postal_code": "12345",
                "country": "US"
            },
            "shipping_method_id": 1,
            "shipping_method_name": "Standard",
            "coupon_code": "SAVE10",
            "subtotal": "100.00",
            "discount_total": "10.00",
            "shipping_total": "5.00",
            "total": "95.00",
            "status": "processing",
            "payment_status": "paid",
            "notes": null,
            "paid_at": "2026-03-01T10:05:00Z",
            "created_at": "2026-03-01T10:00:00Z",
            "updated_at": "2026-03-01T10:05:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_order_cells_and_csv() {
        let order = order();
        let cells = Orders::cells(&order, CurrencyCode::USD);
        assert_eq!(cells.len(), Orders::table().columns.len());
        assert_eq!(cells[1].text, "Dana Reyes");
        assert_eq!(cells[3].text, "$95.00");
        assert_eq!(cells[5], Cell::badge("Paid", "success"));

        let row = Orders::csv_row(&order);
        assert_eq!(row.len(), Orders::csv_header().len());
        assert_eq!(row[4], "1 Main St, Springfield, 12345, US");
        assert_eq!(row[13], "2026-03-01T10:05:00+00:00");
    }

    #[test]
    fn test_orders_link_to_detail_page() {
        assert_eq!(Orders::href(OrderId::new(12)), "/admin/orders/12");
        assert!(!Orders::CREATABLE);
    }

    #[test]
    fn test_every_bulk_action_is_a_status() {
        for action in Orders::table().bulk_actions {
            assert!(action.key.parse::<OrderStatus>().is_ok(), "{}", action.key);
        }
    }

    #[test]
    fn test_fixture_order_number_is_well_formed() {
        assert!(emporium_core::numbers::is_well_formed(
            emporium_core::numbers::DocumentKind::Order,
            &order().order_number
        ));
    }

    #[test]
    fn test_patch_carries_both_moves() {
        let patch = Patch {
            status: Some("shipped".to_owned()),
            payment_status: Some("refunded".to_owned()),
            ..Patch::default()
        };
        assert_eq!(
            status_change(&patch).unwrap(),
            StatusChange {
                status: Some(OrderStatus::Shipped),
                payment_status: Some(PaymentStatus::Refunded),
            }
        );
        // Rejected as a whole against a processing, unpaid order.
        assert!(
            status_change(&patch)
                .unwrap()
                .check(OrderStatus::Processing, PaymentStatus::Pending)
                .is_err()
        );
    }

    #[test]
    fn test_patch_without_moves_rejected() {
        assert!(status_change(&Patch::default()).is_err());
        let bad = Patch {
            payment_status: Some("lost".to_owned()),
            ..Patch::default()
        };
        assert!(matches!(status_change(&bad), Err(AppError::BadRequest(_))));
    }
}
