//! Catalog reference data and coupon checks.

use axum::{Json, extract::State};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use emporium_core::api::ApiResponse;
use emporium_core::pricing::CouponRejection;
use emporium_core::types::money::round_cents;
use emporium_db::{Brand, Category, CouponRepository, ShippingMethod};

use crate::error::ApiResult;
use crate::routes::api::ApiJson;
use crate::state::AppState;

/// Active categories.
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> ApiResult<Vec<Category>> {
    let rows = state.catalog().categories(state.pool()).await?;
    Ok(Json(ApiResponse::ok(rows.as_ref().clone())))
}

/// Active brands.
#[instrument(skip(state))]
pub async fn brands(State(state): State<AppState>) -> ApiResult<Vec<Brand>> {
    let rows = state.catalog().brands(state.pool()).await?;
    Ok(Json(ApiResponse::ok(rows.as_ref().clone())))
}

/// Shipping method with its delivery estimate.
#[derive(Debug, Serialize)]
pub struct ShippingMethodView {
    #[serde(flatten)]
    pub method: ShippingMethod,
    pub delivery_estimate: String,
}

/// Active shipping methods.
#[instrument(skip(state))]
pub async fn shipping_methods(State(state): State<AppState>) -> ApiResult<Vec<ShippingMethodView>> {
    let rows = state.catalog().shipping_methods(state.pool()).await?;
    let views = rows
        .iter()
        .map(|m| ShippingMethodView {
            delivery_estimate: m.delivery_estimate(),
            method: m.clone(),
        })
        .collect();
    Ok(Json(ApiResponse::ok(views)))
}

/// Coupon check request.
#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub subtotal: Decimal,
}

/// Coupon check result. A rejected code is a successful check with
/// `valid: false` and the reason.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CouponCheck {
    pub code: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CouponCheck {
    fn accepted(code: String, discount: Decimal) -> Self {
        Self {
            code,
            valid: true,
            discount: Some(discount),
            reason: None,
        }
    }

    fn rejected(code: String, rejection: &CouponRejection) -> Self {
        Self {
            code,
            valid: false,
            discount: None,
            reason: Some(rejection.to_string()),
        }
    }
}

/// Report the discount a coupon would give on `subtotal`.
#[instrument(skip(state))]
pub async fn validate_coupon(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ValidateCouponRequest>,
) -> ApiResult<CouponCheck> {
    let code = emporium_db::coupons::normalize_code(&request.code);
    let subtotal = round_cents(request.subtotal.max(Decimal::ZERO));
    let check = match CouponRepository::new(state.pool()).get_by_code(&code).await? {
        None => CouponCheck::rejected(code, &CouponRejection::NotFound),
        Some(coupon) => match coupon.rule().discount_for(subtotal, Utc::now()) {
            Ok(discount) => CouponCheck::accepted(coupon.code, discount),
            Err(rejection) => CouponCheck::rejected(coupon.code, &rejection),
        },
    };
    Ok(Json(ApiResponse::ok(check)))
}
