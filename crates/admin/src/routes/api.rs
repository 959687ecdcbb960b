//! Admin REST API under `/api/v1/admin`.
//!
//! The same operations as the HTML screens, answered in the
//! `{ "success": bool, "data" | "error": ... }` envelope. Extractor
//! failures use the envelope too.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use emporium_core::api::{ApiResponse, BulkOutcome, ListQuery, Paginated};

use crate::error::{ApiError, ApiResult};
use crate::middleware::{RequireAdminAuth, RequireWriteAccess};
use crate::resources::{Ctx, Editable, Patch, Resource, found, run_bulk};
use crate::state::AppState;

/// JSON body extractor whose rejection uses the API envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejection uses the API envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Path extractor whose rejection uses the API envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Body of `POST /api/v1/admin/{resource}/bulk`.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkRequest {
    pub ids: Vec<i32>,
    pub action: String,
}

/// Data returned by a successful delete.
#[derive(Debug, Clone, Serialize)]
pub struct Deleted<Id> {
    pub id: Id,
    pub deleted: bool,
}

#[instrument(skip_all, fields(resource = R::PATH))]
pub async fn list<R: Resource>(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Paginated<R::Record>> {
    let page = R::list(state.pool(), &query).await?;
    Ok(Json(ApiResponse::ok(page)))
}

#[instrument(skip_all, fields(resource = R::PATH, id = %id))]
pub async fn show<R: Resource>(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<R::Id>,
) -> ApiResult<R::Record> {
    let record = found(R::get(state.pool(), id).await?)?;
    Ok(Json(ApiResponse::ok(record)))
}

#[instrument(skip_all, fields(resource = R::PATH))]
pub async fn create<R: Editable>(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<R::Input>,
) -> Result<(StatusCode, Json<ApiResponse<R::Record>>), ApiError> {
    let record = R::create(Ctx::new(state.pool(), &admin), input).await?;
    tracing::info!(resource = R::PATH, id = %R::id(&record), admin_id = %admin.id, "Record created via API");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(record))))
}

#[instrument(skip_all, fields(resource = R::PATH, id = %id))]
pub async fn update<R: Editable>(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<R::Id>,
    ApiJson(input): ApiJson<R::Input>,
) -> ApiResult<R::Record> {
    let record = R::update(Ctx::new(state.pool(), &admin), id, input).await?;
    tracing::info!(resource = R::PATH, %id, admin_id = %admin.id, "Record updated via API");
    Ok(Json(ApiResponse::ok(record)))
}

#[instrument(skip_all, fields(resource = R::PATH, id = %id))]
pub async fn patch<R: Resource>(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<R::Id>,
    ApiJson(patch): ApiJson<Patch>,
) -> ApiResult<R::Record> {
    let record = R::patch(Ctx::new(state.pool(), &admin), id, patch).await?;
    Ok(Json(ApiResponse::ok(record)))
}

#[instrument(skip_all, fields(resource = R::PATH, id = %id))]
pub async fn delete<R: Editable>(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<R::Id>,
) -> ApiResult<Deleted<R::Id>> {
    R::delete(Ctx::new(state.pool(), &admin), id).await?;
    tracing::info!(resource = R::PATH, %id, admin_id = %admin.id, "Record deleted via API");
    Ok(Json(ApiResponse::ok(Deleted { id, deleted: true })))
}

#[instrument(skip_all, fields(resource = R::PATH, action = %request.action))]
pub async fn bulk<R: Resource>(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<BulkRequest>,
) -> ApiResult<BulkOutcome> {
    let ids = request.ids.into_iter().map(R::Id::from).collect();
    let outcome = run_bulk::<R>(Ctx::new(state.pool(), &admin), ids, &request.action).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}
