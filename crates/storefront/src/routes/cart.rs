//! Cart route handlers.
//!
//! The cart lives in the session as product IDs and quantities. Prices and
//! stock are looked up fresh every time the cart is shown.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use emporium_core::ProductId;

use crate::error::Result;
use crate::filters;
use crate::models::Cart;
use crate::routes::layout::{Layout, load_cart, save_cart, set_flash};
use crate::routes::products::visible_product;
use crate::services::pricing::{LineRequest, QuotedLine, quote_lines};
use crate::state::AppState;

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub product_id: ProductId,
    pub slug: String,
    pub name: String,
    pub sku: String,
    pub quantity: i32,
    pub price: String,
    pub line_price: String,
    pub image_url: Option<String>,
    pub on_deal: bool,
    pub problem: Option<String>,
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: i32,
    /// Every line can be bought as requested.
    pub ready: bool,
}

impl CartView {
    /// Build the view from priced lines.
    #[must_use]
    pub fn new(lines: &[QuotedLine], layout: &Layout) -> Self {
        let items: Vec<CartItemView> = lines
            .iter()
            .map(|line| CartItemView {
                product_id: line.product.id,
                slug: line.product.slug.clone(),
                name: line.product.name.clone(),
                sku: line.product.sku.clone(),
                quantity: line.quantity,
                price: layout.money(line.unit_price),
                line_price: layout.money(line.line_total()),
                image_url: line.product.image_url.clone(),
                on_deal: line.deal_id.is_some(),
                problem: line.problem(),
            })
            .collect();
        let subtotal: Decimal = lines.iter().map(QuotedLine::line_total).sum();
        Self {
            ready: !items.is_empty() && items.iter().all(|i| i.problem.is_none()),
            item_count: lines.iter().map(|l| l.quantity).sum(),
            subtotal: layout.money(subtotal),
            items,
        }
    }
}

/// Requests for every line in the cart.
#[must_use]
pub fn line_requests(cart: &Cart) -> Vec<LineRequest> {
    cart.lines()
        .iter()
        .map(|l| LineRequest {
            product_id: l.product_id,
            quantity: l.quantity,
        })
        .collect()
}

/// Price the session cart. An empty cart is not looked up.
///
/// Lines whose product was deleted are dropped from the session cart.
///
/// # Errors
///
/// Returns `AppError` if a lookup or the session write fails.
pub async fn priced_cart(state: &AppState, session: &Session) -> Result<(Cart, Vec<QuotedLine>)> {
    let mut cart = load_cart(session).await;
    if cart.is_empty() {
        return Ok((cart, Vec::new()));
    }
    let lines = quote_lines(state.pool(), &line_requests(&cart), Utc::now()).await?;
    if lines.len() != cart.lines().len() {
        cart.retain_products(|id| lines.iter().any(|l| l.product.id == id));
        save_cart(session, &cart).await?;
    }
    Ok((cart, lines))
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    pub quantity: Option<i32>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: ProductId,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub layout: Layout,
    pub cart: CartView,
}

/// Display cart page.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<impl IntoResponse> {
    let (_, lines) = priced_cart(&state, &session).await?;
    let layout = Layout::load(&state, &session).await;
    let cart = CartView::new(&lines, &layout);
    Ok(CartShowTemplate { layout, cart })
}

/// Add item to cart.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> Result<impl IntoResponse> {
    let product = visible_product(&state, form.product_id).await?;
    let mut cart = load_cart(&session).await;
    cart.add(product.id, form.quantity.unwrap_or(1));
    save_cart(&session, &cart).await?;
    set_flash(&session, &format!("Added {} to your cart", product.name)).await?;
    Ok(Redirect::to("/cart"))
}

/// Change the quantity of a cart line. Zero removes it.
#[instrument(skip(session))]
pub async fn update(session: Session, Form(form): Form<UpdateCartForm>) -> Result<impl IntoResponse> {
    let mut cart = load_cart(&session).await;
    cart.set_quantity(form.product_id, form.quantity);
    save_cart(&session, &cart).await?;
    Ok(Redirect::to("/cart"))
}

/// Remove item from cart.
#[instrument(skip(session))]
pub async fn remove(
    session: Session,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<impl IntoResponse> {
    let mut cart = load_cart(&session).await;
    cart.remove(form.product_id);
    save_cart(&session, &cart).await?;
    Ok(Redirect::to("/cart"))
}
