//! Product endpoints.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use emporium_core::api::{ApiResponse, Paginated};
use emporium_core::pricing::effective_price;
use emporium_core::{BrandId, CategoryId, DealId, ProductId, StockStatus};
use emporium_db::{CatalogFilter, Deal, DealRepository, InventoryRepository, Product, ProductRepository};

use crate::error::{ApiResult, AppError};
use crate::routes::api::ApiQuery;
use crate::routes::products::cheapest_deals;
use crate::state::AppState;

/// Product in listings.
#[derive(Debug, Serialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub slug: String,
    pub name: String,
    pub sku: String,
    /// Price the customer pays right now.
    pub price: Decimal,
    pub regular_price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub on_deal: bool,
    pub image_url: Option<String>,
    pub category_id: Option<CategoryId>,
    pub brand_id: Option<BrandId>,
}

impl ProductSummary {
    fn new(product: &Product, deal: Option<&Deal>, now: DateTime<Utc>) -> Self {
        let price = effective_price(product.price, deal.map(Deal::rule).as_ref(), now);
        Self {
            id: product.id,
            slug: product.slug.clone(),
            name: product.name.clone(),
            sku: product.sku.clone(),
            price,
            regular_price: product.price,
            compare_at_price: product.compare_at_price,
            on_deal: price < product.price,
            image_url: product.image_url.clone(),
            category_id: product.category_id,
            brand_id: product.brand_id,
        }
    }
}

/// Live deal on a product.
#[derive(Debug, Serialize)]
pub struct DealSummary {
    pub id: DealId,
    pub title: String,
    pub deal_price: Decimal,
    pub ends_at: DateTime<Utc>,
    pub remaining: Option<i32>,
}

/// Stock as shown to customers. Exact counts stay private.
#[derive(Debug, Serialize)]
pub struct StockSummary {
    pub status: StockStatus,
    pub label: &'static str,
    pub purchasable: bool,
}

/// Product detail.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub summary: ProductSummary,
    pub description: String,
    pub warranty_months: i32,
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub deal: Option<DealSummary>,
    pub stock: StockSummary,
}

/// Paginated active products, filtered like the listing page.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<CatalogFilter>,
) -> ApiResult<Paginated<ProductSummary>> {
    let pool = state.pool();
    let now = Utc::now();
    let page = ProductRepository::new(pool).list_active(&filter).await?;
    let deals = DealRepository::new(pool).active(now).await?;
    let best = cheapest_deals(&deals);
    let page = page.map(|p| ProductSummary::new(&p, best.get(&p.id).copied(), now));
    Ok(Json(ApiResponse::ok(page)))
}

/// One active product with its effective price and stock status.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<ProductDetail> {
    let pool = state.pool();
    let now = Utc::now();
    let product = ProductRepository::new(pool)
        .get_by_slug(&slug)
        .await?
        .filter(Product::is_visible)
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))?;

    let deal = DealRepository::new(pool)
        .active_for_product(product.id, now)
        .await?;
    let stock = InventoryRepository::new(pool)
        .available_for_product(product.id)
        .await?
        .status();

    let summary = ProductSummary::new(&product, deal.as_ref(), now);
    let deal = deal.filter(|_| summary.on_deal).map(|d| DealSummary {
        remaining: d.rule().remaining(),
        id: d.id,
        title: d.title,
        deal_price: d.deal_price,
        ends_at: d.ends_at,
    });

    Ok(Json(ApiResponse::ok(ProductDetail {
        summary,
        description: product.description,
        warranty_months: product.warranty_months,
        attributes: product.attributes.0,
        deal,
        stock: StockSummary {
            status: stock,
            label: stock.label(),
            purchasable: stock.is_purchasable(),
        },
    })))
}
