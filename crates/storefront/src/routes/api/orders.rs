//! Order and payment status endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use emporium_core::api::ApiResponse;
use emporium_core::{Email, OrderStatus, PaymentStatus, ShippingMethodId};
use emporium_db::{Order, OrderItem, OrderRepository, ShippingAddress};

use crate::error::{ApiError, ApiResult, AppError};
use crate::routes::api::{ApiJson, ApiQuery};
use crate::routes::orders::find_order;
use crate::services::pricing::{LineRequest, price_order};
use crate::state::AppState;

/// Order placement request.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub email: String,
    pub items: Vec<LineRequest>,
    pub shipping_address: ShippingAddress,
    pub shipping_method_id: ShippingMethodId,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// An order with its lines.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Place an order. Pricing is the same as the checkout pages.
#[instrument(skip(state, request), fields(items = request.items.len()))]
pub async fn create(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetail>>), ApiError> {
    let email = Email::parse(&request.email)
        .map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;
    let address = request.shipping_address.normalized()?;

    let priced = price_order(
        state.pool(),
        &request.items,
        request.shipping_method_id,
        request.coupon_code.as_deref(),
        Utc::now(),
    )
    .await?;

    let notes = request
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let repo = OrderRepository::new(state.pool());
    let order = repo
        .create_with_items(&priced.into_new_order(email, address, notes))
        .await?;
    let items = repo.items_for(order.id).await?;

    tracing::info!(
        order_number = %order.order_number,
        total = %order.total,
        "Order placed via API"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(OrderDetail { order, items })),
    ))
}

/// Look up an order by number.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(number): Path<String>) -> ApiResult<OrderDetail> {
    let (order, items) = find_order(&state, &number)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {number}")))?;
    Ok(Json(ApiResponse::ok(OrderDetail { order, items })))
}

/// Query for the payment status endpoint.
#[derive(Debug, Deserialize)]
pub struct PaymentStatusQuery {
    pub order: String,
}

/// Payment state of an order.
#[derive(Debug, Serialize)]
pub struct PaymentStatusView {
    pub order_number: String,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<&Order> for PaymentStatusView {
    fn from(order: &Order) -> Self {
        Self {
            order_number: order.order_number.clone(),
            payment_status: order.payment_status,
            status: order.status,
            paid_at: order.paid_at,
        }
    }
}

/// Report whether an order has been paid.
#[instrument(skip(state))]
pub async fn payment_status(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PaymentStatusQuery>,
) -> ApiResult<PaymentStatusView> {
    let order = OrderRepository::new(state.pool())
        .get_by_number(query.order.trim())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {}", query.order)))?;
    Ok(Json(ApiResponse::ok(PaymentStatusView::from(&order))))
}
