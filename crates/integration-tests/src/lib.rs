//! End-to-end tests for Emporium.
//!
//! The tests talk HTTP to running servers and are `#[ignore]`d by default.
//!
//! # Running Tests
//!
//! ```bash
//! emporium migrate
//! emporium user create -e e2e@example.org -n "E2E" -r admin --password e2e-password-1
//! cargo run -p emporium-storefront &
//! cargo run -p emporium-admin &
//! EMPORIUM_TEST_EMAIL=e2e@example.org EMPORIUM_TEST_PASSWORD=e2e-password-1 \
//!     cargo test -p emporium-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_BASE_URL` - defaults to `http://localhost:3000`
//! - `ADMIN_BASE_URL` - defaults to `http://localhost:3001`
//! - `EMPORIUM_TEST_EMAIL`, `EMPORIUM_TEST_PASSWORD` - an active admin account

use reqwest::{Client, StatusCode, redirect::Policy};
use serde_json::Value;

/// Base URL of the storefront.
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Base URL of the admin panel.
#[must_use]
pub fn admin_base_url() -> String {
    std::env::var("ADMIN_BASE_URL").unwrap_or_else(|_| "http://localhost:3001".to_string())
}

/// Admin API URL for `path` (no leading slash).
#[must_use]
pub fn admin_api(path: &str) -> String {
    format!("{}/api/v1/admin/{path}", admin_base_url())
}

/// Storefront API URL for `path` (no leading slash).
#[must_use]
pub fn storefront_api(path: &str) -> String {
    format!("{}/api/v1/{path}", storefront_base_url())
}

/// Client with a cookie jar that does not follow redirects, so tests can
/// assert on them.
///
/// # Errors
///
/// Returns the builder error if the TLS backend cannot initialize.
pub fn client() -> reqwest::Result<Client> {
    Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
}

/// Failure while setting up a test session.
#[derive(Debug)]
pub enum SetupError {
    MissingCredentials,
    Http(reqwest::Error),
    LoginRejected(StatusCode),
}

impl From<reqwest::Error> for SetupError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

/// Client signed in to the admin panel with the test account.
///
/// # Errors
///
/// Returns `SetupError` if the credentials are unset or refused.
pub async fn admin_client() -> Result<Client, SetupError> {
    let email = std::env::var("EMPORIUM_TEST_EMAIL").map_err(|_| SetupError::MissingCredentials)?;
    let password =
        std::env::var("EMPORIUM_TEST_PASSWORD").map_err(|_| SetupError::MissingCredentials)?;

    let client = client()?;
    let response = client
        .post(format!("{}/auth/login", admin_base_url()))
        .form(&[("email", email.as_str()), ("password", password.as_str())])
        .send()
        .await?;
    if response.status() != StatusCode::SEE_OTHER {
        return Err(SetupError::LoginRejected(response.status()));
    }
    Ok(client)
}

/// Split an API envelope into `(success, data, error)`.
#[must_use]
pub fn envelope(body: &Value) -> (bool, &Value, Option<&str>) {
    (
        body["success"].as_bool().unwrap_or(false),
        &body["data"],
        body["error"].as_str(),
    )
}

/// Unique suffix for records created by a test run.
#[must_use]
pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}
