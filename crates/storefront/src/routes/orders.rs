//! Order status page.
//!
//! Orders are looked up by their public order number. The number is random
//! enough that it doubles as the customer's access token.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use emporium_core::{OrderStatus, PaymentStatus};
use emporium_db::{Order, OrderItem, OrderRepository};

use crate::error::Result;
use crate::filters;
use crate::routes::checkout::TotalsView;
use crate::routes::layout::Layout;
use crate::state::AppState;

/// Order line display data.
#[derive(Clone)]
pub struct OrderItemView {
    pub name: String,
    pub sku: String,
    pub quantity: i32,
    pub unit_price: String,
    pub line_total: String,
}

/// Order display data.
#[derive(Clone)]
pub struct OrderView {
    pub order_number: String,
    pub placed_on: String,
    pub email: String,
    pub customer_name: String,
    pub address: String,
    pub shipping_method: String,
    pub coupon_code: Option<String>,
    pub notes: Option<String>,
    pub status: &'static str,
    pub status_class: &'static str,
    pub payment_status: &'static str,
    pub is_paid: bool,
    pub items: Vec<OrderItemView>,
    pub totals: TotalsView,
}

impl OrderView {
    #[must_use]
    pub fn new(order: &Order, items: &[OrderItem], layout: &Layout) -> Self {
        Self {
            order_number: order.order_number.clone(),
            placed_on: order.created_at.format("%B %-d, %Y").to_string(),
            email: order.email.clone(),
            customer_name: order.shipping_address.customer_name.clone(),
            address: order.shipping_address.one_line(),
            shipping_method: order.shipping_method_name.clone(),
            coupon_code: order.coupon_code.clone(),
            notes: order.notes.clone(),
            status: order.status.label(),
            status_class: status_class(order.status),
            payment_status: order.payment_status.label(),
            is_paid: order.payment_status == PaymentStatus::Paid,
            items: items
                .iter()
                .map(|item| OrderItemView {
                    name: item.product_name.clone(),
                    sku: item.sku.clone(),
                    quantity: item.quantity,
                    unit_price: layout.money(item.unit_price),
                    line_total: layout.money(item.line_total),
                })
                .collect(),
            totals: TotalsView::new(&order.totals(), layout),
        }
    }
}

const fn status_class(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending | OrderStatus::Processing => "status-open",
        OrderStatus::Shipped | OrderStatus::Delivered => "status-done",
        OrderStatus::Cancelled | OrderStatus::Refunded => "status-closed",
    }
}

/// Fetch an order with its items.
///
/// # Errors
///
/// Returns `AppError::Database` if a query fails.
pub async fn find_order(state: &AppState, number: &str) -> Result<Option<(Order, Vec<OrderItem>)>> {
    let repo = OrderRepository::new(state.pool());
    let Some(order) = repo.get_by_number(number.trim()).await? else {
        return Ok(None);
    };
    let items = repo.items_for(order.id).await?;
    Ok(Some((order, items)))
}

/// Order page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub layout: Layout,
    pub order: OrderView,
}

/// Unknown order number page.
#[derive(Template, WebTemplate)]
#[template(path = "orders/not_found.html")]
pub struct OrderNotFoundTemplate {
    pub layout: Layout,
    pub order_number: String,
}

/// Render the not-found page with a 404.
pub fn not_found(layout: Layout, order_number: String) -> Response {
    (
        StatusCode::NOT_FOUND,
        OrderNotFoundTemplate {
            layout,
            order_number,
        },
    )
        .into_response()
}

/// Display an order.
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    Path(number): Path<String>,
) -> Result<Response> {
    let found = find_order(&state, &number).await?;
    let layout = Layout::load(&state, &session).await;
    let Some((order, items)) = found else {
        return Ok(not_found(layout, number));
    };
    let order = OrderView::new(&order, &items, &layout);
    Ok(OrderShowTemplate { layout, order }.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes_cover_lifecycle() {
        assert_eq!(status_class(OrderStatus::Pending), "status-open");
        assert_eq!(status_class(OrderStatus::Delivered), "status-done");
        assert_eq!(status_class(OrderStatus::Refunded), "status-closed");
    }
}
