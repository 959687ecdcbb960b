//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness check
//! GET  /health/ready                    - Readiness check (database)
//!
//! # Auth (email + password)
//! GET  /auth/login                      - Login page
//! POST /auth/login                      - Sign in
//! POST /auth/logout                     - Sign out
//!
//! # Dashboard
//! GET  /admin                           - Counts and recent orders
//!
//! # Resources: attributes, brands, categories, content-blocks, coupons,
//! # deals, inventory, products, quotes, returns, shipping-methods, users,
//! # warranties
//! GET  /admin/{resource}                - Table (q, status, page)
//! GET  /admin/{resource}/new            - Create form
//! POST /admin/{resource}                - Create
//! GET  /admin/{resource}/{id}/edit      - Edit form
//! POST /admin/{resource}/{id}           - Update
//! POST /admin/{resource}/{id}/delete    - Delete
//! POST /admin/{resource}/bulk           - Bulk action (ids, action)
//! GET  /admin/{resource}/export.csv     - CSV of the filtered list
//!
//! # Orders
//! GET  /admin/orders                    - Table, bulk and export as above
//! GET  /admin/orders/{id}               - Order detail
//! POST /admin/orders/{id}/status        - Change status / payment status
//!
//! # AI product generator
//! GET  /admin/products/generate         - Request form
//! POST /admin/products/generate         - Generate and pre-fill a product
//!
//! # API (/api/v1/admin, JSON envelope)
//! GET|POST             /{resource}
//! GET|PUT|PATCH|DELETE /{resource}/{id}
//! POST                 /{resource}/bulk
//! GET|PATCH            /orders, /orders/{id}; POST /orders/bulk
//! POST                 /products/generate
//! ```

pub mod api;
pub mod auth;
pub mod dashboard;
pub mod generator;
pub mod layout;
pub mod orders;
pub mod pages;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, post},
};

use crate::resources::{
    Attributes, Brands, Categories, ContentBlocks, Coupons, Deals, Editable, Inventory, Orders,
    Products, Quotes, Returns, ShippingMethods, Users, Warranties,
};
use crate::state::AppState;

/// HTML screens for a resource with forms.
pub fn editable_pages<R: Editable>() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::index::<R>).post(pages::create::<R>))
        .route("/new", get(pages::new::<R>))
        .route("/bulk", post(pages::bulk::<R>))
        .route("/export.csv", get(pages::export::<R>))
        .route("/{id}", post(pages::update::<R>))
        .route("/{id}/edit", get(pages::edit::<R>))
        .route("/{id}/delete", post(pages::delete::<R>))
}

/// JSON endpoints for a resource with forms.
pub fn editable_api<R: Editable>() -> Router<AppState> {
    Router::new()
        .route("/", get(api::list::<R>).post(api::create::<R>))
        .route("/bulk", post(api::bulk::<R>))
        .route(
            "/{id}",
            get(api::show::<R>)
                .put(api::update::<R>)
                .patch(api::patch::<R>)
                .delete(api::delete::<R>),
        )
}

/// Order screens: list, bulk and export, plus the detail page.
fn order_pages() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::index::<Orders>))
        .route("/bulk", post(pages::bulk::<Orders>))
        .route("/export.csv", get(pages::export::<Orders>))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", post(orders::update_status))
}

fn order_api() -> Router<AppState> {
    Router::new()
        .route("/", get(api::list::<Orders>))
        .route("/bulk", post(api::bulk::<Orders>))
        .route("/{id}", get(api::show::<Orders>).patch(api::patch::<Orders>))
}

/// Register `R`'s pages and API under its path.
fn with_resource<R: Editable>(
    pages: Router<AppState>,
    api: Router<AppState>,
) -> (Router<AppState>, Router<AppState>) {
    (
        pages.nest(&format!("/{}", R::PATH), editable_pages::<R>()),
        api.nest(&format!("/{}", R::PATH), editable_api::<R>()),
    )
}

/// All back-office pages under `/admin` and the API under `/api/v1/admin`.
fn resource_routes() -> (Router<AppState>, Router<AppState>) {
    let pages = Router::new()
        .route("/", get(dashboard::index))
        .nest("/orders", order_pages())
        .nest(
            "/products",
            editable_pages::<Products>()
                .route("/generate", get(generator::form).post(generator::generate_page)),
        );
    let api = Router::new()
        .nest("/orders", order_api())
        .nest(
            "/products",
            editable_api::<Products>().route("/generate", post(generator::generate_api)),
        );

    let (pages, api) = with_resource::<Attributes>(pages, api);
    let (pages, api) = with_resource::<Brands>(pages, api);
    let (pages, api) = with_resource::<Categories>(pages, api);
    let (pages, api) = with_resource::<ContentBlocks>(pages, api);
    let (pages, api) = with_resource::<Coupons>(pages, api);
    let (pages, api) = with_resource::<Deals>(pages, api);
    let (pages, api) = with_resource::<Inventory>(pages, api);
    let (pages, api) = with_resource::<Quotes>(pages, api);
    let (pages, api) = with_resource::<Returns>(pages, api);
    let (pages, api) = with_resource::<ShippingMethods>(pages, api);
    let (pages, api) = with_resource::<Users>(pages, api);
    with_resource::<Warranties>(pages, api)
}

/// Create all page and API routes for admin.
pub fn routes() -> Router<AppState> {
    let (pages, api) = resource_routes();
    Router::new()
        .route("/", get(|| async { Redirect::to("/admin") }))
        .route("/auth/login", get(auth::login_page).post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .nest("/admin", pages)
        .nest("/api/v1/admin", api)
        .fallback(not_found)
}

/// Generic 404 page.
#[derive(Template, WebTemplate)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate;

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, NotFoundTemplate)
}
