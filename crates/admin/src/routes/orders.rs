//! Order detail page and status form.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use emporium_core::{OrderId, OrderStatus, PaymentStatus};
use emporium_db::{Order, OrderItem, OrderRepository};

use crate::error::Result;
use crate::filters;
use crate::middleware::{RequireAdminAuth, RequireWriteAccess};
use crate::resources::orders::{payment_tone, status_tone};
use crate::resources::{Ctx, Orders, Patch, Resource, csv_time, found, short_time};
use crate::routes::layout::{Layout, set_flash};
use crate::state::AppState;

/// An order line for display.
#[derive(Debug, Clone)]
pub struct ItemView {
    pub product_name: String,
    pub sku: String,
    pub unit_price: String,
    pub quantity: i32,
    pub line_total: String,
    pub deal_applied: bool,
}

/// Order detail page.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub layout: Layout,
    pub order: Order,
    pub address: String,
    pub items: Vec<ItemView>,
    pub subtotal: String,
    pub discount_total: String,
    pub shipping_total: String,
    pub total: String,
    pub status_tone: &'static str,
    pub payment_tone: &'static str,
    pub placed: String,
    pub paid_at: String,
    /// `(value, label)` for statuses the order may move to.
    pub next_statuses: Vec<(&'static str, &'static str)>,
    pub next_payment_statuses: Vec<(&'static str, &'static str)>,
}

/// Status form input. Blank fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub payment_status: String,
}

impl StatusForm {
    fn into_patch(self) -> Patch {
        let set = |value: String| Some(value.trim().to_string()).filter(|v| !v.is_empty());
        Patch {
            status: set(self.status),
            payment_status: set(self.payment_status),
            ..Patch::default()
        }
    }
}

/// Statuses an order in `current` may move to.
#[must_use]
pub fn next_statuses(current: OrderStatus) -> Vec<(&'static str, &'static str)> {
    if current.is_terminal() {
        return Vec::new();
    }
    OrderStatus::ALL
        .iter()
        .filter(|next| current.can_transition_to(**next))
        .map(|next| (next.as_str(), next.label()))
        .collect()
}

/// Payment statuses a payment in `current` may move to.
#[must_use]
pub fn next_payment_statuses(current: PaymentStatus) -> Vec<(&'static str, &'static str)> {
    PaymentStatus::ALL
        .iter()
        .filter(|next| current.can_transition_to(**next))
        .map(|next| (next.as_str(), next.label()))
        .collect()
}

#[instrument(skip_all, fields(order_id = %id))]
pub async fn show(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<OrderId>,
) -> Result<OrderShowTemplate> {
    let repo = OrderRepository::new(state.pool());
    let (order, items) = tokio::try_join!(repo.get(id), repo.items_for(id))?;
    let order = found(order)?;
    let layout = Layout::load(&state, &session, &admin, Orders::PATH).await;

    let items = items
        .iter()
        .map(|item: &OrderItem| ItemView {
            product_name: item.product_name.clone(),
            sku: item.sku.clone(),
            unit_price: layout.money(&item.unit_price),
            quantity: item.quantity,
            line_total: layout.money(&item.line_total),
            deal_applied: item.deal_id.is_some(),
        })
        .collect();

    Ok(OrderShowTemplate {
        address: order.shipping_address.one_line(),
        items,
        subtotal: layout.money(&order.subtotal),
        discount_total: layout.money(&order.discount_total),
        shipping_total: layout.money(&order.shipping_total),
        total: layout.money(&order.total),
        status_tone: status_tone(order.status),
        payment_tone: payment_tone(order.payment_status),
        placed: short_time(order.created_at),
        paid_at: csv_time(order.paid_at),
        next_statuses: next_statuses(order.status),
        next_payment_statuses: next_payment_statuses(order.payment_status),
        order,
        layout,
    })
}

#[instrument(skip_all, fields(order_id = %id))]
pub async fn update_status(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<OrderId>,
    Form(form): Form<StatusForm>,
) -> Result<Redirect> {
    let message = match Orders::patch(Ctx::new(state.pool(), &admin), id, form.into_patch()).await {
        Ok(order) => format!(
            "Order {} is now {} / {}",
            order.order_number,
            order.status.label(),
            order.payment_status.label()
        ),
        Err(e) if e.status().is_client_error() && e.status().as_u16() != 404 => e.public_message(),
        Err(e) => return Err(e),
    };
    set_flash(&session, &message).await?;
    Ok(Redirect::to(&Orders::href(id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_statuses_follow_lifecycle() {
        let values: Vec<_> = next_statuses(OrderStatus::Pending).iter().map(|(v, _)| *v).collect();
        assert_eq!(values, vec!["processing", "cancelled"]);
        assert!(next_statuses(OrderStatus::Refunded).is_empty());

        let values: Vec<_> = next_payment_statuses(PaymentStatus::Paid).iter().map(|(v, _)| *v).collect();
        assert_eq!(values, vec!["refunded"]);
    }

    #[test]
    fn test_status_form_blank_fields_are_unchanged() {
        let patch = StatusForm {
            status: "shipped".to_string(),
            payment_status: "  ".to_string(),
        }
        .into_patch();
        assert_eq!(patch.status.as_deref(), Some("shipped"));
        assert_eq!(patch.payment_status, None);
    }
}
