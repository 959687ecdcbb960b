//! Order confirmation after checkout.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::routes::layout::Layout;
use crate::routes::orders::{OrderView, find_order, not_found};
use crate::state::AppState;

/// Query for the confirmation page.
#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    #[serde(default)]
    pub order: String,
}

/// Confirmation page template.
#[derive(Template, WebTemplate)]
#[template(path = "payment/success.html")]
pub struct PaymentSuccessTemplate {
    pub layout: Layout,
    pub order: OrderView,
}

/// Display the confirmation for a just-placed order.
#[instrument(skip(state, session))]
pub async fn success(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SuccessQuery>,
) -> Result<Response> {
    let found = if query.order.trim().is_empty() {
        None
    } else {
        find_order(&state, &query.order).await?
    };
    let layout = Layout::load(&state, &session).await;
    let Some((order, items)) = found else {
        return Ok(not_found(layout, query.order));
    };
    let order = OrderView::new(&order, &items, &layout);
    Ok(PaymentSuccessTemplate { layout, order }.into_response())
}
