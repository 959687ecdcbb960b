//! Dashboard route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tower_sessions::Session;
use tracing::instrument;

use emporium_core::{CurrencyCode, OrderStatus, format_money};
use emporium_db::{
    InventoryRepository, Order, OrderRepository, ProductRepository, QuoteRepository,
    ReturnRepository,
};

use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::resources::orders::{payment_tone, status_tone};
use crate::resources::short_time;
use crate::routes::layout::Layout;
use crate::state::AppState;

/// Orders shown in the recent list.
const RECENT_ORDERS: i64 = 10;

/// One headline number.
#[derive(Debug, Clone)]
pub struct MetricView {
    pub label: &'static str,
    pub value: String,
    pub href: &'static str,
    pub icon: &'static str,
    /// Highlight when something needs attention.
    pub alert: bool,
}

/// Recent order row.
#[derive(Debug, Clone)]
pub struct RecentOrderView {
    pub id: String,
    pub number: String,
    pub customer_name: String,
    pub total: String,
    pub status: &'static str,
    pub status_tone: &'static str,
    pub payment: &'static str,
    pub payment_tone: &'static str,
    pub placed: String,
}

impl RecentOrderView {
    fn new(order: &Order, currency: CurrencyCode) -> Self {
        Self {
            id: order.id.to_string(),
            number: order.order_number.clone(),
            customer_name: order.shipping_address.customer_name.clone(),
            total: format_money(order.total, currency),
            status: order.status.label(),
            status_tone: status_tone(order.status),
            payment: order.payment_status.label(),
            payment_tone: payment_tone(order.payment_status),
            placed: short_time(order.created_at),
        }
    }
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub layout: Layout,
    pub metrics: Vec<MetricView>,
    pub revenue: String,
    pub recent_orders: Vec<RecentOrderView>,
}

/// Counts shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardCounts {
    pub products: i64,
    pub orders: i64,
    pub pending_orders: i64,
    pub open_quotes: i64,
    pub open_returns: i64,
    pub low_stock: i64,
}

impl DashboardCounts {
    /// Headline cards in display order.
    #[must_use]
    pub fn metrics(self) -> Vec<MetricView> {
        vec![
            MetricView {
                label: "Products",
                value: self.products.to_string(),
                href: "/admin/products",
                icon: "ph-package",
                alert: false,
            },
            MetricView {
                label: "Orders",
                value: self.orders.to_string(),
                href: "/admin/orders",
                icon: "ph-receipt",
                alert: false,
            },
            MetricView {
                label: "Pending orders",
                value: self.pending_orders.to_string(),
                href: "/admin/orders?status=pending",
                icon: "ph-hourglass",
                alert: self.pending_orders > 0,
            },
            MetricView {
                label: "Open quotes",
                value: self.open_quotes.to_string(),
                href: "/admin/quotes",
                icon: "ph-chat-text",
                alert: self.open_quotes > 0,
            },
            MetricView {
                label: "Open returns",
                value: self.open_returns.to_string(),
                href: "/admin/returns",
                icon: "ph-arrow-u-up-left",
                alert: self.open_returns > 0,
            },
            MetricView {
                label: "Low stock",
                value: self.low_stock.to_string(),
                href: "/admin/inventory?status=low",
                icon: "ph-warning",
                alert: self.low_stock > 0,
            },
        ]
    }
}

/// Dashboard page handler.
#[instrument(skip_all)]
pub async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<DashboardTemplate> {
    let pool = state.pool();
    let orders = OrderRepository::new(pool);
    let products = ProductRepository::new(pool);
    let quotes = QuoteRepository::new(pool);
    let returns = ReturnRepository::new(pool);
    let inventory = InventoryRepository::new(pool);

    let (product_count, order_count, pending, open_quotes, open_returns, low_stock, revenue, recent) = tokio::try_join!(
        products.count(),
        orders.count(),
        orders.count_by_status(OrderStatus::Pending),
        quotes.count_open(),
        returns.count_open(),
        inventory.low_stock_count(),
        orders.paid_revenue(),
        orders.recent(RECENT_ORDERS),
    )?;

    let counts = DashboardCounts {
        products: product_count,
        orders: order_count,
        pending_orders: pending,
        open_quotes,
        open_returns,
        low_stock,
    };
    let currency = state.config().currency;

    Ok(DashboardTemplate {
        layout: Layout::load(&state, &session, &admin, "").await,
        metrics: counts.metrics(),
        revenue: format_money(revenue, currency),
        recent_orders: recent
            .iter()
            .map(|order| RecentOrderView::new(order, currency))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_flag_attention() {
        let metrics = DashboardCounts {
            products: 12,
            orders: 40,
            pending_orders: 3,
            low_stock: 0,
            ..DashboardCounts::default()
        }
        .metrics();

        assert_eq!(metrics.len(), 6);
        let pending = metrics.iter().find(|m| m.label == "Pending orders");
        assert!(pending.is_some_and(|m| m.alert && m.value == "3"));
        let low = metrics.iter().find(|m| m.label == "Low stock");
        assert!(low.is_some_and(|m| !m.alert));
        assert!(metrics.iter().all(|m| m.href.starts_with("/admin/")));
    }
}
