//! Checkout route handlers.
//!
//! Checkout is three pages backed by [`CheckoutState`] in the session:
//! contact, shipping and review. Placing the order prices the cart again
//! from the database, so nothing shown on an earlier page is trusted.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use emporium_core::pricing::{OrderTotals, PricingError};
use emporium_core::{Email, ShippingMethodId};
use emporium_db::{OrderRepository, RepositoryError, ShippingAddress};

use crate::error::{AppError, Result};
use crate::filters;
use crate::models::session::keys;
use crate::models::{CheckoutState, CheckoutStep, ContactDetails, ShippingDetails};
use crate::routes::cart::{CartView, line_requests, priced_cart};
use crate::routes::layout::{Layout, load_cart, set_flash};
use crate::services::pricing::{PricedOrder, price_order};
use crate::state::AppState;

// =============================================================================
// Session State
// =============================================================================

async fn load_checkout(session: &Session) -> CheckoutState {
    match session.get::<CheckoutState>(keys::CHECKOUT).await {
        Ok(state) => state.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read checkout from session");
            CheckoutState::default()
        }
    }
}

async fn save_checkout(session: &Session, checkout: &CheckoutState) -> Result<()> {
    session.insert(keys::CHECKOUT, checkout).await?;
    Ok(())
}

// =============================================================================
// Form Types
// =============================================================================

/// Query for the checkout page.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutQuery {
    pub step: Option<String>,
}

/// Contact step form data.
#[derive(Debug, Default, Deserialize)]
pub struct ContactForm {
    pub email: String,
    pub customer_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Shipping step form data.
#[derive(Debug, Default, Deserialize)]
pub struct ShippingForm {
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub shipping_method_id: Option<ShippingMethodId>,
}

/// Coupon form on the review step. A blank code removes the coupon.
#[derive(Debug, Deserialize)]
pub struct CouponForm {
    #[serde(default)]
    pub coupon_code: String,
}

/// Place order form data.
#[derive(Debug, Deserialize)]
pub struct PlaceOrderForm {
    #[serde(default)]
    pub notes: Option<String>,
}

// =============================================================================
// View Types
// =============================================================================

/// Progress indicator entry.
#[derive(Clone)]
pub struct StepView {
    pub number: usize,
    pub label: &'static str,
    pub url: String,
    pub current: bool,
    pub reachable: bool,
}

fn step_views(checkout: &CheckoutState, current: CheckoutStep) -> Vec<StepView> {
    CheckoutStep::ALL
        .into_iter()
        .map(|step| StepView {
            number: step.number(),
            label: step.label(),
            url: step.url(),
            current: step == current,
            reachable: checkout.can_enter(step),
        })
        .collect()
}

/// Shipping method choice.
#[derive(Clone)]
pub struct MethodOption {
    pub id: ShippingMethodId,
    pub name: String,
    pub rate: String,
    pub estimate: String,
    pub free_over: Option<String>,
    pub selected: bool,
}

/// Order totals formatted for display.
#[derive(Clone)]
pub struct TotalsView {
    pub subtotal: String,
    pub discount: Option<String>,
    pub shipping: String,
    pub total: String,
}

impl TotalsView {
    #[must_use]
    pub fn new(totals: &OrderTotals, layout: &Layout) -> Self {
        Self {
            subtotal: layout.money(totals.subtotal),
            discount: (!totals.discount_total.is_zero()).then(|| layout.money(totals.discount_total)),
            shipping: layout.money(totals.shipping_total),
            total: layout.money(totals.total),
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Contact step template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/contact.html")]
pub struct ContactTemplate {
    pub layout: Layout,
    pub steps: Vec<StepView>,
    pub error: Option<String>,
    pub email: String,
    pub customer_name: String,
    pub phone: String,
}

/// Shipping step template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/shipping.html")]
pub struct ShippingTemplate {
    pub layout: Layout,
    pub steps: Vec<StepView>,
    pub error: Option<String>,
    pub address: ShippingAddress,
    pub methods: Vec<MethodOption>,
}

/// Review step template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/review.html")]
pub struct ReviewTemplate {
    pub layout: Layout,
    pub steps: Vec<StepView>,
    pub error: Option<String>,
    pub email: String,
    pub customer_name: String,
    pub address: String,
    pub shipping_method: String,
    pub delivery_estimate: String,
    pub cart: CartView,
    pub totals: Option<TotalsView>,
    pub coupon_code: String,
    pub can_place: bool,
}

// =============================================================================
// Page Rendering
// =============================================================================

/// Display the requested checkout step.
///
/// An empty cart goes back to the cart page. A step whose earlier steps are
/// incomplete redirects to the first incomplete one.
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CheckoutQuery>,
) -> Result<Response> {
    if load_cart(&session).await.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }
    let checkout = load_checkout(&session).await;
    let requested = query.step.as_deref().and_then(|s| s.parse().ok());
    let step = checkout.resolve(requested);
    if requested.is_some_and(|r| r != step) {
        return Ok(Redirect::to(&step.url()).into_response());
    }

    match step {
        CheckoutStep::Contact => Ok(contact_page(&state, &session, &checkout, None, None)
            .await
            .into_response()),
        CheckoutStep::Shipping => Ok(shipping_page(&state, &session, &checkout, None, None)
            .await?
            .into_response()),
        CheckoutStep::Review => review_page(&state, &session, &checkout).await,
    }
}

async fn contact_page(
    state: &AppState,
    session: &Session,
    checkout: &CheckoutState,
    form: Option<&ContactForm>,
    error: Option<String>,
) -> ContactTemplate {
    let layout = Layout::load(state, session).await;
    let (email, customer_name, phone) = match (form, &checkout.contact) {
        (Some(f), _) => (
            f.email.clone(),
            f.customer_name.clone(),
            f.phone.clone().unwrap_or_default(),
        ),
        (None, Some(c)) => (
            c.email.to_string(),
            c.customer_name.clone(),
            c.phone.clone().unwrap_or_default(),
        ),
        (None, None) => Default::default(),
    };
    ContactTemplate {
        layout,
        steps: step_views(checkout, CheckoutStep::Contact),
        error,
        email,
        customer_name,
        phone,
    }
}

async fn shipping_page(
    state: &AppState,
    session: &Session,
    checkout: &CheckoutState,
    submitted: Option<(ShippingAddress, Option<ShippingMethodId>)>,
    error: Option<String>,
) -> Result<ShippingTemplate> {
    let layout = Layout::load(state, session).await;
    let (address, selected) = submitted.unwrap_or_else(|| match &checkout.shipping {
        Some(s) => (s.address.clone(), Some(s.shipping_method_id)),
        None => (ShippingAddress::default(), None),
    });
    let methods = state.catalog().shipping_methods(state.pool()).await?;
    let selected = selected.or_else(|| methods.first().map(|m| m.id));
    let methods = methods
        .iter()
        .map(|m| MethodOption {
            id: m.id,
            name: m.name.clone(),
            rate: layout.money(m.base_rate),
            estimate: m.delivery_estimate(),
            free_over: m.free_shipping_threshold.map(|t| layout.money(t)),
            selected: Some(m.id) == selected,
        })
        .collect();
    Ok(ShippingTemplate {
        layout,
        steps: step_views(checkout, CheckoutStep::Shipping),
        error,
        address,
        methods,
    })
}

/// Price the checkout, dropping a coupon that no longer applies.
///
/// Returns the priced order, or `None` with a message when a line cannot be
/// bought. A rejected coupon comes back as a message next to the price
/// without it.
async fn try_price(
    state: &AppState,
    session: &Session,
    checkout: &CheckoutState,
    method: ShippingMethodId,
) -> Result<(Option<PricedOrder>, Option<String>)> {
    let requests = line_requests(&load_cart(session).await);
    let now = Utc::now();
    let coupon = checkout.coupon_code.as_deref();
    match price_order(state.pool(), &requests, method, coupon, now).await {
        Ok(priced) => Ok((Some(priced), None)),
        Err(AppError::Pricing(PricingError::Coupon(rejection))) if coupon.is_some() => {
            let message = format!("Coupon not applied: {rejection}");
            match price_order(state.pool(), &requests, method, None, now).await {
                Ok(priced) => Ok((Some(priced), Some(message))),
                Err(AppError::BadRequest(problem)) => Ok((None, Some(problem))),
                Err(AppError::Pricing(e)) => Ok((None, Some(e.to_string()))),
                Err(e) => Err(e),
            }
        }
        Err(AppError::BadRequest(problem)) => Ok((None, Some(problem))),
        Err(AppError::Pricing(e)) => Ok((None, Some(e.to_string()))),
        Err(e) => Err(e),
    }
}

async fn review_page(state: &AppState, session: &Session, checkout: &CheckoutState) -> Result<Response> {
    let (Some(contact), Some(shipping)) = (&checkout.contact, &checkout.shipping) else {
        return Ok(Redirect::to(&checkout.first_incomplete_step().url()).into_response());
    };

    let (priced, error) = try_price(state, session, checkout, shipping.shipping_method_id).await?;
    let (_, lines) = priced_cart(state, session).await?;
    let layout = Layout::load(state, session).await;

    let (shipping_method, delivery_estimate) = match &priced {
        Some(p) => (p.shipping_method.name.clone(), p.shipping_method.delivery_estimate()),
        None => (String::new(), String::new()),
    };
    let totals = priced.as_ref().map(|p| TotalsView::new(&p.totals, &layout));
    let cart = match &priced {
        Some(p) => CartView::new(&p.lines, &layout),
        None => CartView::new(&lines, &layout),
    };

    Ok(ReviewTemplate {
        steps: step_views(checkout, CheckoutStep::Review),
        error,
        email: contact.email.to_string(),
        customer_name: contact.customer_name.clone(),
        address: shipping.address.one_line(),
        shipping_method,
        delivery_estimate,
        can_place: totals.is_some(),
        cart,
        totals,
        coupon_code: checkout.coupon_code.clone().unwrap_or_default(),
        layout,
    }
    .into_response())
}

// =============================================================================
// Step Submissions
// =============================================================================

/// Save the contact step.
#[instrument(skip(state, session, form))]
pub async fn submit_contact(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ContactForm>,
) -> Result<Response> {
    let mut checkout = load_checkout(&session).await;
    let name = form.customer_name.trim();
    let contact = match Email::parse(&form.email) {
        Ok(_) if name.is_empty() => Err("Please enter your name.".to_string()),
        Ok(email) => Ok(ContactDetails {
            email,
            customer_name: name.to_string(),
            phone: form
                .phone
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        }),
        Err(e) => Err(format!("Please enter a valid email address ({e}).")),
    };

    match contact {
        Ok(contact) => {
            if let Some(shipping) = checkout.shipping.as_mut() {
                shipping.address.customer_name.clone_from(&contact.customer_name);
                shipping.address.phone.clone_from(&contact.phone);
            }
            checkout.contact = Some(contact);
            save_checkout(&session, &checkout).await?;
            Ok(Redirect::to(&CheckoutStep::Shipping.url()).into_response())
        }
        Err(message) => {
            let page = contact_page(&state, &session, &checkout, Some(&form), Some(message)).await;
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
    }
}

/// Save the shipping step.
#[instrument(skip(state, session, form))]
pub async fn submit_shipping(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ShippingForm>,
) -> Result<Response> {
    let mut checkout = load_checkout(&session).await;
    let Some(contact) = checkout.contact.clone() else {
        return Ok(Redirect::to(&CheckoutStep::Contact.url()).into_response());
    };

    let address = ShippingAddress {
        customer_name: contact.customer_name,
        phone: contact.phone,
        address_line1: form.address_line1,
        address_line2: form.address_line2,
        city: form.city,
        region: form.region,
        postal_code: form.postal_code,
        country: form.country,
    };

    let methods = state.catalog().shipping_methods(state.pool()).await?;
    let method = form
        .shipping_method_id
        .filter(|id| methods.iter().any(|m| m.id == *id));

    let checked = match (address.normalized(), method) {
        (Ok(normalized), Some(method)) => Ok((normalized, method)),
        (Err(e), _) => Err(e.to_string()),
        (Ok(_), None) => Err("Please choose a shipping method.".to_string()),
    };

    match checked {
        Ok((address, shipping_method_id)) => {
            checkout.shipping = Some(ShippingDetails {
                address,
                shipping_method_id,
            });
            save_checkout(&session, &checkout).await?;
            Ok(Redirect::to(&CheckoutStep::Review.url()).into_response())
        }
        Err(message) => {
            let page = shipping_page(
                &state,
                &session,
                &checkout,
                Some((address, form.shipping_method_id)),
                Some(message),
            )
            .await?;
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
    }
}

/// Apply or remove a coupon code on the review step.
#[instrument(skip(session))]
pub async fn apply_coupon(session: Session, Form(form): Form<CouponForm>) -> Result<impl IntoResponse> {
    let mut checkout = load_checkout(&session).await;
    let code = form.coupon_code.trim();
    checkout.coupon_code = (!code.is_empty()).then(|| code.to_uppercase());
    save_checkout(&session, &checkout).await?;
    Ok(Redirect::to(&CheckoutStep::Review.url()))
}

/// Place the order.
///
/// The cart is priced again here. If anything changed in a way that stops
/// the order, the customer goes back to review with the reason.
#[instrument(skip(state, session, form))]
pub async fn place_order(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<PlaceOrderForm>,
) -> Result<Response> {
    let cart = load_cart(&session).await;
    if cart.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }
    let checkout = load_checkout(&session).await;
    let (Some(contact), Some(shipping)) = (checkout.contact.clone(), checkout.shipping.clone())
    else {
        return Ok(Redirect::to(&checkout.first_incomplete_step().url()).into_response());
    };

    let priced = match price_order(
        state.pool(),
        &line_requests(&cart),
        shipping.shipping_method_id,
        checkout.coupon_code.as_deref(),
        Utc::now(),
    )
    .await
    {
        Ok(priced) => priced,
        Err(e) => return recover_to_review(&session, e).await,
    };

    let notes = form
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let new_order = priced.into_new_order(contact.email, shipping.address, notes);
    // Stock, a deal or the coupon can run out between review and commit.
    let order = match OrderRepository::new(state.pool())
        .create_with_items(&new_order)
        .await
    {
        Ok(order) => order,
        Err(e) => return recover_to_review(&session, e.into()).await,
    };

    tracing::info!(
        order_number = %order.order_number,
        total = %order.total,
        "Order placed"
    );
    crate::error::add_breadcrumb(
        "checkout",
        "order placed",
        Some(&[("order_number", order.order_number.as_str())][..]),
    );

    session.remove::<serde_json::Value>(keys::CART).await?;
    session.remove::<serde_json::Value>(keys::CHECKOUT).await?;

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("order", &order.order_number);
    Ok(Redirect::to(&format!("/payment/success?{}", query.finish())).into_response())
}

async fn back_to_review(session: &Session, message: &str) -> Result<Response> {
    set_flash(session, message).await?;
    Ok(Redirect::to(&CheckoutStep::Review.url()).into_response())
}

/// Send the customer back to review for errors they can act on; anything
/// else propagates.
async fn recover_to_review(session: &Session, err: AppError) -> Result<Response> {
    match review_message(&err) {
        Some(message) => {
            tracing::info!(reason = %message, "Order sent back to review");
            back_to_review(session, &message).await
        }
        None => Err(err),
    }
}

/// The message shown on the review page for a recoverable failure.
fn review_message(err: &AppError) -> Option<String> {
    match err {
        AppError::BadRequest(message)
        | AppError::Database(RepositoryError::Conflict(message)) => Some(message.clone()),
        AppError::Pricing(e) => Some(e.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sold_out_at_commit_goes_back_to_review() {
        let err = AppError::from(RepositoryError::Conflict(
            "not enough stock for product 4 (requested 5)".to_string(),
        ));
        assert_eq!(
            review_message(&err).unwrap(),
            "not enough stock for product 4 (requested 5)"
        );
        let err = AppError::from(RepositoryError::Conflict("coupon usage limit reached".to_string()));
        assert_eq!(review_message(&err).unwrap(), "coupon usage limit reached");
    }

    #[test]
    fn test_pricing_errors_go_back_to_review() {
        assert_eq!(
            review_message(&AppError::Pricing(PricingError::EmptyOrder)).unwrap(),
            "order has no items"
        );
        assert_eq!(
            review_message(&AppError::BadRequest("shipping method unavailable".to_string())).unwrap(),
            "shipping method unavailable"
        );
    }

    #[test]
    fn test_other_errors_propagate() {
        assert!(review_message(&AppError::from(RepositoryError::NotFound)).is_none());
        assert!(review_message(&AppError::Internal("boom".to_string())).is_none());
    }
}
