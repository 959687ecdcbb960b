//! AI product generator: an HTML form that pre-fills the product create
//! form, and the JSON endpoint behind it.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use emporium_core::api::ApiResponse;

use crate::error::{ApiResult, Result};
use crate::filters;
use crate::middleware::RequireWriteAccess;
use crate::resources::{Editable, FormField, Products, Resource};
use crate::routes::api::ApiJson;
use crate::routes::layout::Layout;
use crate::services::{GenerateRequest, GeneratedProduct};
use crate::state::AppState;

/// Generator page: the request form and, after a run, the result.
#[derive(Template, WebTemplate)]
#[template(path = "products/generate.html")]
pub struct GenerateTemplate {
    pub layout: Layout,
    pub configured: bool,
    pub model: String,
    pub request: GenerateRequest,
    pub result: Option<GeneratedProduct>,
    pub error: Option<String>,
    /// Product create form pre-filled from `result`.
    pub product_fields: Vec<FormField>,
}

impl GenerateTemplate {
    fn keywords(&self) -> &str {
        self.request.keywords.as_deref().unwrap_or_default()
    }

    fn category(&self) -> &str {
        self.request.category.as_deref().unwrap_or_default()
    }

    fn tone(&self) -> &str {
        self.request.tone.as_deref().unwrap_or_default()
    }

    fn suggested_price(&self) -> String {
        self.result
            .as_ref()
            .and_then(|p| p.suggested_price)
            .map(|price| self.layout.money(&price))
            .unwrap_or_default()
    }
}

/// Product create fields pre-filled from generated copy.
#[must_use]
pub fn prefilled_product_fields(product: &GeneratedProduct) -> Vec<FormField> {
    let attributes = serde_json::to_string_pretty(&product.attributes).unwrap_or_default();
    let price = product.suggested_price.map(|p| p.to_string());
    Products::fields()
        .iter()
        .map(|field| {
            let value = match field.name {
                "name" => Some(product.name.clone()),
                "description" => Some(product.description.clone()),
                "price" => price.clone(),
                "attributes" => Some(attributes.clone()),
                "status" => Some("draft".to_string()),
                _ => None,
            };
            FormField::new(field, value.as_deref())
        })
        .collect()
}

async fn page(
    state: &AppState,
    session: &Session,
    admin: &crate::models::CurrentAdmin,
    request: GenerateRequest,
) -> GenerateTemplate {
    let generator = state.generator();
    GenerateTemplate {
        layout: Layout::load(state, session, admin, Products::PATH).await,
        configured: generator.is_configured(),
        model: generator.model().unwrap_or_default().to_string(),
        request,
        result: None,
        error: None,
        product_fields: Vec::new(),
    }
}

/// `GET /admin/products/generate`
#[instrument(skip_all)]
pub async fn form(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    session: Session,
) -> GenerateTemplate {
    page(&state, &session, &admin, GenerateRequest::default()).await
}

/// `POST /admin/products/generate`: run the generator and show the result.
#[instrument(skip_all, fields(name = %request.name))]
pub async fn generate_page(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    session: Session,
    Form(request): Form<GenerateRequest>,
) -> Result<Response> {
    let outcome = state.generator().generate(&request).await;
    let mut template = page(&state, &session, &admin, request).await;
    match outcome {
        Ok(product) => {
            template.product_fields = prefilled_product_fields(&product);
            template.result = Some(product);
            Ok(template.into_response())
        }
        Err(e) => {
            let status = e.status();
            if status.is_server_error() {
                tracing::error!(error = %e, "Product generation failed");
            }
            template.error = Some(e.public_message());
            let status = if status == StatusCode::BAD_REQUEST {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                status
            };
            Ok((status, template).into_response())
        }
    }
}

/// `POST /api/v1/admin/products/generate`
#[instrument(skip_all, fields(name = %request.name))]
pub async fn generate_api(
    RequireWriteAccess(_admin): RequireWriteAccess,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<GenerateRequest>,
) -> ApiResult<GeneratedProduct> {
    let product = state.generator().generate(&request).await?;
    Ok(Json(ApiResponse::ok(product)))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_prefilled_product_fields() {
        let product = GeneratedProduct {
            name: "Oak Desk Lamp".to_string(),
            description: "A lamp.".to_string(),
            short_description: "A lamp.".to_string(),
            suggested_price: Some(Decimal::new(4999, 2)),
            tags: vec!["lighting".to_string()],
            attributes: BTreeMap::from([("material".to_string(), "oak".to_string())]),
            seo_title: "Oak Desk Lamp".to_string(),
            seo_description: "A lamp.".to_string(),
        };
        let fields = prefilled_product_fields(&product);
        let value = |name: &str| {
            fields
                .iter()
                .find(|f| f.name == name)
                .map(|f| f.value.clone())
                .unwrap_or_default()
        };
        assert_eq!(value("name"), "Oak Desk Lamp");
        assert_eq!(value("price"), "49.99");
        assert_eq!(value("sku"), "");
        assert!(value("attributes").contains("\"material\": \"oak\""));
        let status = fields.iter().find(|f| f.name == "status");
        assert!(status.is_some_and(|f| f.options.iter().any(|&(v, _, selected)| v == "draft" && selected)));
    }
}
