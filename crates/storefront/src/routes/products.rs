//! Product route handlers.

use std::collections::HashMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tower_sessions::Session;
use tracing::instrument;

use emporium_core::api::Paginated;
use emporium_core::pricing::effective_price;
use emporium_core::{Placement, ProductId, StockStatus};
use emporium_db::{
    CatalogFilter, CatalogSort, ContentBlockRepository, Deal, DealRepository, InventoryRepository,
    Product, ProductRepository,
};

use crate::error::{AppError, Result};
use crate::filters;
use crate::routes::home::ContentBlockView;
use crate::routes::layout::Layout;
use crate::state::AppState;

/// Product card data for listings.
#[derive(Clone)]
pub struct ProductCard {
    pub slug: String,
    pub name: String,
    pub price: String,
    /// Struck-through price when the product is discounted.
    pub was_price: Option<String>,
    pub image_url: Option<String>,
    pub on_deal: bool,
}

impl ProductCard {
    /// Build a card, applying the product's live deal if it undercuts the price.
    #[must_use]
    pub fn new(product: &Product, deal: Option<&Deal>, layout: &Layout) -> Self {
        let now = Utc::now();
        let price = effective_price(product.price, deal.map(Deal::rule).as_ref(), now);
        let on_deal = price < product.price;
        let was_price = if on_deal {
            Some(product.price)
        } else {
            product.compare_at_price
        };
        Self {
            slug: product.slug.clone(),
            name: product.name.clone(),
            price: layout.money(price),
            was_price: was_price.map(|p| layout.money(p)),
            image_url: product.image_url.clone(),
            on_deal,
        }
    }
}

/// The cheapest deal per product.
#[must_use]
pub fn cheapest_deals(deals: &[Deal]) -> HashMap<ProductId, &Deal> {
    let mut best: HashMap<ProductId, &Deal> = HashMap::new();
    for deal in deals {
        best.entry(deal.product_id)
            .and_modify(|current| {
                if deal.deal_price < current.deal_price {
                    *current = deal;
                }
            })
            .or_insert(deal);
    }
    best
}

/// A select option for the filter sidebar.
#[derive(Clone)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub layout: Layout,
    pub products: Vec<ProductCard>,
    pub search: String,
    pub categories: Vec<FilterOption>,
    pub brands: Vec<FilterOption>,
    pub sorts: Vec<FilterOption>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total: i64,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
}

/// Attribute row on the detail page.
#[derive(Clone)]
pub struct AttributeView {
    pub name: String,
    pub value: String,
}

/// Product detail display data.
#[derive(Clone)]
pub struct ProductDetailView {
    pub id: ProductId,
    pub slug: String,
    pub name: String,
    pub sku: String,
    pub description: String,
    pub price: String,
    pub was_price: Option<String>,
    pub image_url: Option<String>,
    pub deal_title: Option<String>,
    pub deal_ends: Option<String>,
    pub deal_remaining: Option<i32>,
    pub stock_label: &'static str,
    pub stock_class: &'static str,
    pub purchasable: bool,
    pub warranty_months: i32,
    pub attributes: Vec<AttributeView>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub layout: Layout,
    pub product: ProductDetailView,
    pub blocks: Vec<ContentBlockView>,
}

/// Product not found page.
#[derive(Template, WebTemplate)]
#[template(path = "products/not_found.html")]
pub struct ProductNotFoundTemplate {
    pub layout: Layout,
    pub slug: String,
}

const fn stock_class(status: StockStatus) -> &'static str {
    match status {
        StockStatus::InStock => "stock-in",
        StockStatus::LowStock => "stock-low",
        StockStatus::OutOfStock => "stock-out",
    }
}

/// Build a listing URL keeping the current filters.
fn listing_url(filter: &CatalogFilter, page: u32) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    if let Some(q) = filter.q.as_deref().filter(|q| !q.trim().is_empty()) {
        query.append_pair("q", q);
    }
    if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
        query.append_pair("category", category);
    }
    if let Some(brand) = filter.brand.as_deref().filter(|b| !b.is_empty()) {
        query.append_pair("brand", brand);
    }
    if filter.sort != CatalogSort::default() {
        query.append_pair("sort", filter.sort.as_str());
    }
    query.append_pair("page", &page.to_string());
    format!("/products?{}", query.finish())
}

fn page_links(filter: &CatalogFilter, page: &Paginated<Product>) -> (Option<String>, Option<String>) {
    let prev = page
        .has_previous()
        .then(|| listing_url(filter, page.page - 1));
    let next = page.has_next().then(|| listing_url(filter, page.page + 1));
    (prev, next)
}

/// Display product listing page.
#[instrument(skip(state, session))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    Query(filter): Query<CatalogFilter>,
) -> Result<impl IntoResponse> {
    let layout = Layout::load(&state, &session).await;
    let pool = state.pool();

    let page = ProductRepository::new(pool).list_active(&filter).await?;
    let deals = DealRepository::new(pool).active(Utc::now()).await?;
    let best = cheapest_deals(&deals);
    let products = page
        .items
        .iter()
        .map(|p| ProductCard::new(p, best.get(&p.id).copied(), &layout))
        .collect();

    let selected_category = filter.category.as_deref().unwrap_or_default();
    let categories = state
        .catalog()
        .categories(pool)
        .await?
        .iter()
        .map(|c| FilterOption {
            value: c.slug.clone(),
            label: c.name.clone(),
            selected: c.slug == selected_category,
        })
        .collect();
    let selected_brand = filter.brand.as_deref().unwrap_or_default();
    let brands = state
        .catalog()
        .brands(pool)
        .await?
        .iter()
        .map(|b| FilterOption {
            value: b.slug.clone(),
            label: b.name.clone(),
            selected: b.slug == selected_brand,
        })
        .collect();
    let sorts = CatalogSort::ALL
        .iter()
        .map(|s| FilterOption {
            value: s.as_str().to_string(),
            label: s.label().to_string(),
            selected: *s == filter.sort,
        })
        .collect();

    let (prev_url, next_url) = page_links(&filter, &page);

    Ok(ProductsIndexTemplate {
        layout,
        products,
        search: filter.q.clone().unwrap_or_default(),
        categories,
        brands,
        sorts,
        current_page: page.page,
        total_pages: page.total_pages.max(1),
        total: page.total,
        prev_url,
        next_url,
    })
}

/// Display product detail page.
///
/// Missing and non-active products render the not-found page with a 404.
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    Path(slug): Path<String>,
) -> Result<Response> {
    let layout = Layout::load(&state, &session).await;
    let pool = state.pool();
    let now = Utc::now();

    let Some(product) = ProductRepository::new(pool)
        .get_by_slug(&slug)
        .await?
        .filter(Product::is_visible)
    else {
        return Ok((
            StatusCode::NOT_FOUND,
            ProductNotFoundTemplate { layout, slug },
        )
            .into_response());
    };

    let deal = DealRepository::new(pool)
        .active_for_product(product.id, now)
        .await?;
    let stock = InventoryRepository::new(pool)
        .available_for_product(product.id)
        .await?;
    let blocks = ContentBlockRepository::new(pool)
        .active_for_placement(Placement::Product, now)
        .await?;

    let view = detail_view(&product, deal.as_ref(), stock.status(), &layout);
    Ok(ProductShowTemplate {
        layout,
        product: view,
        blocks: blocks.iter().map(ContentBlockView::from).collect(),
    }
    .into_response())
}

fn detail_view(
    product: &Product,
    deal: Option<&Deal>,
    stock: StockStatus,
    layout: &Layout,
) -> ProductDetailView {
    let card = ProductCard::new(product, deal, layout);
    let live_deal = deal.filter(|_| card.on_deal);
    ProductDetailView {
        id: product.id,
        slug: product.slug.clone(),
        name: product.name.clone(),
        sku: product.sku.clone(),
        description: product.description.clone(),
        price: card.price,
        was_price: card.was_price,
        image_url: product.image_url.clone(),
        deal_title: live_deal.map(|d| d.title.clone()),
        deal_ends: live_deal.map(|d| d.ends_at.format("%b %-d, %H:%M UTC").to_string()),
        deal_remaining: live_deal.and_then(|d| d.rule().remaining()),
        stock_label: stock.label(),
        stock_class: stock_class(stock),
        purchasable: stock.is_purchasable(),
        warranty_months: product.warranty_months,
        attributes: product
            .attribute_pairs()
            .into_iter()
            .map(|(name, value)| AttributeView { name, value })
            .collect(),
    }
}

/// Look up a product the customer can buy.
///
/// # Errors
///
/// Returns `AppError::NotFound` for unknown or hidden products.
pub async fn visible_product(state: &AppState, id: ProductId) -> Result<Product> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .filter(Product::is_visible)
        .ok_or_else(|| AppError::NotFound("product".to_string()))
}
