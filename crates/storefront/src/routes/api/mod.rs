//! Public JSON API under `/api/v1`.
//!
//! Every response uses the `{ "success": bool, "data" | "error": ... }`
//! envelope, including extractor failures.

pub mod catalog;
pub mod orders;
pub mod products;
pub mod support;

use axum::{
    Router,
    extract::{FromRequest, FromRequestParts},
    routing::{get, post},
};

use crate::error::ApiError;
use crate::state::AppState;

/// JSON body extractor whose rejection uses the API envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejection uses the API envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Read-only endpoints.
pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index))
        .route("/products/{slug}", get(products::show))
        .route("/categories", get(catalog::categories))
        .route("/brands", get(catalog::brands))
        .route("/shipping-methods", get(catalog::shipping_methods))
        .route("/orders/{number}", get(orders::show))
        .route("/payments/status", get(orders::payment_status))
        .route("/quotes/{number}", get(support::show_quote))
        .route("/returns/{number}", get(support::show_return))
        .route("/warranties/{number}", get(support::show_warranty))
}

/// Endpoints that write or probe; these sit behind the rate limiter.
pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/coupons/validate", post(catalog::validate_coupon))
        .route("/orders", post(orders::create))
        .route("/quotes", post(support::create_quote))
        .route("/returns", post(support::create_return))
        .route("/warranties", post(support::create_warranty))
}
