//! Authentication extractors for admin.
//!
//! Page routes redirect anonymous visitors to the login form; `/api/`
//! routes answer with a JSON envelope instead.

use axum::{
    Json,
    extract::{FromRequestParts, OriginalUri},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use emporium_core::api::ApiResponse;

use crate::models::{CurrentAdmin, session_keys};

/// Login page path.
pub const LOGIN_PATH: &str = "/auth/login";

/// Extractor that requires a signed-in back-office user (staff or admin).
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAdminAuth(admin): RequireAdminAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", admin.name)
/// }
/// ```
pub struct RequireAdminAuth(pub CurrentAdmin);

/// Extractor that requires a signed-in user allowed to write (`admin` role).
pub struct RequireWriteAccess(pub CurrentAdmin);

/// Why an authenticated route refused the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// 401 envelope (for API requests).
    Unauthorized,
    /// Signed in, but the role may not do this.
    Forbidden { api: bool },
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::<()>::error("Authentication required")),
            )
                .into_response(),
            Self::Forbidden { api: true } => (
                StatusCode::FORBIDDEN,
                Json(ApiResponse::<()>::error("Your role is read-only")),
            )
                .into_response(),
            Self::Forbidden { api: false } => {
                (StatusCode::FORBIDDEN, "Your role is read-only").into_response()
            }
        }
    }
}

/// Nested routers strip their prefix from `uri`, so prefer the original.
fn is_api(parts: &Parts) -> bool {
    parts
        .extensions
        .get::<OriginalUri>()
        .map_or(&parts.uri, |original| &original.0)
        .path()
        .starts_with("/api/")
}

async fn current_admin(parts: &Parts) -> Result<CurrentAdmin, AuthRejection> {
    let missing = if is_api(parts) {
        AuthRejection::Unauthorized
    } else {
        AuthRejection::RedirectToLogin
    };

    // Set by SessionManagerLayer
    let session = parts.extensions.get::<Session>().ok_or(missing)?;

    session
        .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await
        .ok()
        .flatten()
        .filter(|admin| admin.role.can_access_admin())
        .ok_or(missing)
}

impl<S> FromRequestParts<S> for RequireAdminAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_admin(parts).await.map(Self)
    }
}

impl<S> FromRequestParts<S> for RequireWriteAccess
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let admin = current_admin(parts).await?;
        if !admin.can_write() {
            tracing::warn!(user_id = %admin.id, path = %parts.uri.path(), "Write refused for read-only role");
            return Err(AuthRejection::Forbidden { api: is_api(parts) });
        }
        Ok(Self(admin))
    }
}

/// Store the signed-in user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_admin(
    session: &Session,
    admin: &CurrentAdmin,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CURRENT_ADMIN, admin).await
}

/// Remove the signed-in user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, header},
        routing::get,
    };
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    use emporium_core::{Email, UserId, UserRole};

    use super::*;

    fn admin(role: UserRole) -> CurrentAdmin {
        CurrentAdmin {
            id: UserId::new(7),
            email: Email::parse("ops@example.org").unwrap(),
            name: "Ops".to_string(),
            role,
        }
    }

    /// Router whose `/login-as/{role}` route signs the caller in.
    fn app() -> Router {
        async fn login_as(
            session: Session,
            axum::extract::Path(role): axum::extract::Path<UserRole>,
        ) -> StatusCode {
            set_current_admin(&session, &admin(role)).await.unwrap();
            StatusCode::NO_CONTENT
        }

        Router::new()
            .route("/login-as/{role}", get(login_as))
            .route("/admin", get(|RequireAdminAuth(a): RequireAdminAuth| async move { a.name }))
            .route("/admin/write", get(|RequireWriteAccess(a): RequireWriteAccess| async move { a.name }))
            .route("/api/v1/admin/write", get(|RequireWriteAccess(a): RequireWriteAccess| async move { a.name }))
            .layer(SessionManagerLayer::new(MemoryStore::default()))
    }

    async fn cookie_for(app: &Router, role: &str) -> String {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(format!("/login-as/{role}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let set_cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    fn get_with(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_anonymous_page_redirects_to_login() {
        let response = app().oneshot(get_with("/admin", None)).await.unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), LOGIN_PATH);
    }

    #[tokio::test]
    async fn test_anonymous_api_gets_401_envelope() {
        let response = app().oneshot(get_with("/api/v1/admin/write", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_staff_can_read_but_not_write() {
        let app = app();
        let cookie = cookie_for(&app, "staff").await;

        let response = app.clone().oneshot(get_with("/admin", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.clone().oneshot(get_with("/admin/write", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app.oneshot(get_with("/api/v1/admin/write", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_can_write() {
        let app = app();
        let cookie = cookie_for(&app, "admin").await;
        let response = app.oneshot(get_with("/admin/write", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_customer_session_is_not_admin() {
        let app = app();
        let cookie = cookie_for(&app, "customer").await;
        let response = app.oneshot(get_with("/admin", Some(&cookie))).await.unwrap();
        assert!(response.status().is_redirection());
    }
}
