//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - Home page
//! GET  /health                    - Liveness check
//! GET  /health/ready              - Readiness check (database)
//!
//! # Products
//! GET  /products                  - Product listing (q, category, brand, sort, page)
//! GET  /products/{slug}           - Product detail
//!
//! # Cart
//! GET  /cart                      - Cart page
//! POST /cart/add                  - Add to cart
//! POST /cart/update               - Set quantity (0 removes)
//! POST /cart/remove               - Remove item
//!
//! # Checkout
//! GET  /checkout?step=            - Contact, shipping or review step
//! POST /checkout/contact          - Save contact details
//! POST /checkout/shipping         - Save address and shipping method
//! POST /checkout/coupon           - Apply or clear a coupon
//! POST /checkout/place            - Place the order
//! GET  /payment/success?order=    - Order confirmation
//! GET  /orders/{number}           - Order status
//!
//! # API (/api/v1, JSON envelope)
//! GET  /products, /products/{slug}, /categories, /brands, /shipping-methods
//! GET  /orders/{number}, /payments/status?order=
//! GET  /quotes/{number}, /returns/{number}, /warranties/{number}
//! POST /orders, /quotes, /returns, /warranties, /coupons/validate (rate limited)
//! ```

pub mod api;
pub mod cart;
pub mod checkout;
pub mod home;
pub mod layout;
pub mod orders;
pub mod payment;
pub mod products;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tower_sessions::Session;

use crate::filters;
use crate::middleware::rate_limit::RateLimiterLayer;
use crate::routes::layout::Layout;
use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route("/contact", post(checkout::submit_contact))
        .route("/shipping", post(checkout::submit_shipping))
        .route("/coupon", post(checkout::apply_coupon))
        .route("/place", post(checkout::place_order))
}

/// Create the public API router. Writes go through `limiter`.
pub fn api_routes(limiter: RateLimiterLayer) -> Router<AppState> {
    api::read_routes().merge(api::write_routes().layer(limiter))
}

/// Create all page and API routes for the storefront.
pub fn routes(limiter: RateLimiterLayer) -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .route("/payment/success", get(payment::success))
        .route("/orders/{number}", get(orders::show))
        .nest("/api/v1", api_routes(limiter))
        .fallback(not_found)
}

/// Generic 404 page.
#[derive(Template, WebTemplate)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub layout: Layout,
}

async fn not_found(State(state): State<AppState>, session: Session) -> impl IntoResponse {
    let layout = Layout::load(&state, &session).await;
    (StatusCode::NOT_FOUND, NotFoundTemplate { layout })
}
