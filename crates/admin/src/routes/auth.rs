//! Sign-in and sign-out for the back-office.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{clear_current_admin, set_current_admin};
use crate::models::{CurrentAdmin, session_keys};
use crate::services::{AdminAuthService, AuthError};
use crate::state::AppState;

/// Shown for every failed sign-in so accounts cannot be probed.
const LOGIN_FAILED: &str = "Invalid email or password";

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub email: String,
}

/// Login form input.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Login page. Signed-in users go straight to the dashboard.
pub async fn login_page(session: Session) -> Response {
    let signed_in = session
        .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await
        .ok()
        .flatten()
        .is_some();
    if signed_in {
        return Redirect::to("/admin").into_response();
    }
    LoginTemplate {
        error: None,
        email: String::new(),
    }
    .into_response()
}

/// Verify credentials and start a session.
#[instrument(skip_all, fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let user = match AdminAuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await
    {
        Ok(user) => user,
        Err(AuthError::InvalidCredentials | AuthError::AccessDenied) => {
            tracing::warn!("Failed admin login");
            let page = LoginTemplate {
                error: Some(LOGIN_FAILED.to_string()),
                email: form.email.trim().to_string(),
            };
            return Ok((StatusCode::UNAUTHORIZED, page).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    // New session id on privilege change
    session.cycle_id().await?;
    let admin = CurrentAdmin::from(&user);
    set_current_admin(&session, &admin).await?;
    set_sentry_user(admin.id.as_i32(), Some(admin.email.as_str()));

    tracing::info!(user_id = %admin.id, role = %admin.role, "Admin signed in");
    Ok(Redirect::to("/admin").into_response())
}

/// End the session.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<Redirect> {
    clear_current_admin(&session).await?;
    session.flush().await?;
    clear_sentry_user();
    Ok(Redirect::to("/auth/login"))
}
