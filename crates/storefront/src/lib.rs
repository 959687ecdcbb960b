//! Emporium storefront library.
//!
//! The public shop: catalog pages, session cart, checkout and the public
//! JSON API. Built as a library so the router can be tested without a
//! listener.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, extract::State, http::StatusCode, middleware::from_fn, routing::get};
use thiserror::Error;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::middleware::{
    InvalidRateLimit, create_session_layer, request_id_middleware, security_headers_middleware,
    write_rate_limiter,
};
use crate::state::AppState;

/// Directory served under `/static`.
pub const STATIC_DIR: &str = "crates/storefront/static";

/// The router could not be assembled.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Session store: {0}")]
    SessionStore(String),
    #[error(transparent)]
    RateLimit(#[from] InvalidRateLimit),
}

/// Build the full application router.
///
/// # Errors
///
/// Returns [`BuildError`] if the session store or rate limiter cannot be
/// configured.
pub fn app(state: AppState) -> Result<Router, BuildError> {
    let session_layer =
        create_session_layer(state.pool(), state.config()).map_err(BuildError::SessionStore)?;
    let limiter = write_rate_limiter()?;

    Ok(Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes(limiter))
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction()))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match emporium_db::ping(state.pool()).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, header},
    };
    use secrecy::SecretString;
    use tower::ServiceExt;
    use url::Url;

    use emporium_core::CurrencyCode;

    use super::*;
    use crate::config::StorefrontConfig;

    fn test_app() -> Router {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/emporium_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: Url::parse("http://localhost:3000").unwrap(),
            store_name: "Test Shop".to_string(),
            currency: CurrencyCode::USD,
            sentry_dsn: None,
            sentry_environment: None,
        };
        let pool = emporium_db::create_lazy_pool(&config.database_url).unwrap();
        app(AppState::new(config, pool)).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn test_empty_cart_page() {
        let response = test_app().oneshot(get("/cart")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Your cart is empty"));
        assert!(body.contains("Test Shop"));
    }

    #[tokio::test]
    async fn test_checkout_with_empty_cart_redirects_to_cart() {
        let response = test_app()
            .oneshot(get("/checkout?step=review"))
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/cart");
    }

    #[tokio::test]
    async fn test_unknown_page_is_404() {
        let response = test_app().oneshot(get("/no-such-page")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("Page not found"));
    }

    #[tokio::test]
    async fn test_security_headers_on_pages() {
        let response = test_app().oneshot(get("/cart")).await.unwrap();
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_api_rejects_malformed_json_with_envelope() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/orders")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::from("{\"email\":"))
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().is_some());
    }
}
