//! Quote requests, returns and warranty registration.
//!
//! Lookups are by the public document number. Back-office notes never
//! leave the admin.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use emporium_core::api::ApiResponse;
use emporium_core::{QuoteStatus, ReturnStatus, WarrantyStatus};
use emporium_db::{
    NewQuote, NewReturn, NewWarranty, Quote, QuoteItem, QuoteRepository, Return, ReturnRepository,
    Warranty, WarrantyRepository,
};

use crate::error::{ApiError, ApiResult, AppError};
use crate::routes::api::ApiJson;
use crate::state::AppState;

type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

fn created<T: Serialize>(data: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(data))))
}

// =============================================================================
// Quotes
// =============================================================================

/// Quote as the customer sees it.
#[derive(Debug, Serialize)]
pub struct QuoteView {
    pub quote_number: String,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub message: String,
    pub items: Vec<QuoteItem>,
    pub status: QuoteStatus,
    pub quoted_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl From<Quote> for QuoteView {
    fn from(quote: Quote) -> Self {
        Self {
            quote_number: quote.quote_number,
            name: quote.name,
            email: quote.email,
            company: quote.company,
            message: quote.message,
            items: quote.items.0,
            status: quote.status,
            quoted_amount: quote.quoted_amount,
            created_at: quote.created_at,
        }
    }
}

/// Request a quote.
#[instrument(skip(state, request))]
pub async fn create_quote(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewQuote>,
) -> Created<QuoteView> {
    let quote = QuoteRepository::new(state.pool()).create(&request).await?;
    created(QuoteView::from(quote))
}

/// Look up a quote.
#[instrument(skip(state))]
pub async fn show_quote(State(state): State<AppState>, Path(number): Path<String>) -> ApiResult<QuoteView> {
    let quote = QuoteRepository::new(state.pool())
        .get_by_number(&number)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("quote {number}")))?;
    Ok(Json(ApiResponse::ok(quote.into())))
}

// =============================================================================
// Returns
// =============================================================================

/// Return as the customer sees it.
#[derive(Debug, Serialize)]
pub struct ReturnView {
    pub rma_number: String,
    pub order_number: String,
    pub reason: String,
    pub details: Option<String>,
    pub status: ReturnStatus,
    pub refund_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl From<Return> for ReturnView {
    fn from(ret: Return) -> Self {
        Self {
            rma_number: ret.rma_number,
            order_number: ret.order_number,
            reason: ret.reason,
            details: ret.details,
            status: ret.status,
            refund_amount: ret.refund_amount,
            created_at: ret.created_at,
        }
    }
}

/// Open a return for a shipped or delivered order.
#[instrument(skip(state, request), fields(order_number = %request.order_number))]
pub async fn create_return(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewReturn>,
) -> Created<ReturnView> {
    let ret = ReturnRepository::new(state.pool()).create(&request).await?;
    created(ReturnView::from(ret))
}

/// Look up a return.
#[instrument(skip(state))]
pub async fn show_return(State(state): State<AppState>, Path(number): Path<String>) -> ApiResult<ReturnView> {
    let ret = ReturnRepository::new(state.pool())
        .get_by_number(&number)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("return {number}")))?;
    Ok(Json(ApiResponse::ok(ret.into())))
}

// =============================================================================
// Warranties
// =============================================================================

/// Warranty as the customer sees it, with the status as of today.
#[derive(Debug, Serialize)]
pub struct WarrantyView {
    pub warranty_number: String,
    pub product_name: String,
    pub order_number: Option<String>,
    pub serial_number: Option<String>,
    pub purchase_date: NaiveDate,
    pub expires_on: NaiveDate,
    pub status: WarrantyStatus,
}

impl WarrantyView {
    fn new(warranty: Warranty, today: NaiveDate) -> Self {
        Self {
            status: warranty.effective_status(today),
            warranty_number: warranty.warranty_number,
            product_name: warranty.product_name,
            order_number: warranty.order_number,
            serial_number: warranty.serial_number,
            purchase_date: warranty.purchase_date,
            expires_on: warranty.expires_on,
        }
    }
}

/// Register a product warranty.
#[instrument(skip(state, request), fields(product_id = %request.product_id))]
pub async fn create_warranty(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewWarranty>,
) -> Created<WarrantyView> {
    let warranty = WarrantyRepository::new(state.pool()).create(&request).await?;
    created(WarrantyView::new(warranty, Utc::now().date_naive()))
}

/// Look up a warranty.
#[instrument(skip(state))]
pub async fn show_warranty(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> ApiResult<WarrantyView> {
    let warranty = WarrantyRepository::new(state.pool())
        .get_by_number(&number)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("warranty {number}")))?;
    Ok(Json(ApiResponse::ok(WarrantyView::new(
        warranty,
        Utc::now().date_naive(),
    ))))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emporium_core::{ProductId, WarrantyId};

    use super::*;

    fn warranty(expires_on: NaiveDate) -> Warranty {
        let now = Utc::now();
        Warranty {
            id: WarrantyId::new(1),
            warranty_number: "WAR-20250101-ABC123".to_string(),
            product_id: ProductId::new(1),
            product_name: "Kettle".to_string(),
            order_id: None,
            order_number: None,
            customer_email: "buyer@example.com".to_string(),
            serial_number: None,
            purchase_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            expires_on,
            status: WarrantyStatus::Active,
            claim_description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_lapsed_warranty_reads_expired() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let lapsed = WarrantyView::new(warranty(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()), today);
        assert_eq!(lapsed.status, WarrantyStatus::Expired);

        let current = WarrantyView::new(warranty(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()), today);
        assert_eq!(current.status, WarrantyStatus::Active);
    }
}
