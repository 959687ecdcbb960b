//! Emporium back-office library.
//!
//! Resource screens, the admin REST API and the AI product generator.
//! Built as a library so the router can be tested without a listener.
//!
//! # Security
//!
//! Every page and endpoint except sign-in and the health checks requires a
//! signed-in user; writes additionally require a role that can write.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod claude;
pub mod components;
pub mod config;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod resources;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, extract::State, http::StatusCode, middleware::from_fn, routing::get};
use thiserror::Error;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::middleware::{create_session_layer, request_id_middleware, security_headers_middleware};
use crate::state::AppState;

/// Directory served under `/static`.
pub const STATIC_DIR: &str = "crates/admin/static";

/// The router could not be assembled.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Session store: {0}")]
    SessionStore(String),
}

/// Build the full application router.
///
/// # Errors
///
/// Returns [`BuildError`] if the session store cannot be configured.
pub fn app(state: AppState) -> Result<Router, BuildError> {
    let session_layer =
        create_session_layer(state.pool(), state.config()).map_err(BuildError::SessionStore)?;

    Ok(Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
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
    use crate::config::AdminConfig;
    use crate::services::ProductGenerator;

    fn test_app() -> Router {
        let config = AdminConfig {
            database_url: SecretString::from("postgres://localhost/emporium_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3001,
            base_url: Url::parse("http://localhost:3001").unwrap(),
            currency: CurrencyCode::USD,
            claude: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };
        let pool = emporium_db::create_lazy_pool(&config.database_url).unwrap();
        let generator = ProductGenerator::new(None, config.currency);
        app(AppState::new(config, pool, generator)).unwrap()
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
    async fn test_login_page_renders() {
        let response = test_app().oneshot(get("/auth/login")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("name=\"password\""));
    }

    #[tokio::test]
    async fn test_pages_redirect_to_login() {
        for uri in ["/admin", "/admin/products", "/admin/orders/1", "/admin/products/generate"] {
            let response = test_app().oneshot(get(uri)).await.unwrap();
            assert!(response.status().is_redirection(), "{uri}");
            assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/auth/login");
        }
    }

    #[tokio::test]
    async fn test_api_requires_sign_in_with_envelope() {
        let response = test_app()
            .oneshot(get("/api/v1/admin/brands"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_unknown_page_is_404() {
        let response = test_app().oneshot(get("/admin/no-such-thing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("Page not found"));
    }

    #[tokio::test]
    async fn test_security_headers() {
        let response = test_app().oneshot(get("/auth/login")).await.unwrap();
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert!(response.headers().contains_key("x-request-id"));
    }
}
