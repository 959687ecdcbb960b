//! HTML screens shared by every back-office resource.
//!
//! Each handler is generic over [`Resource`] or [`Editable`]; the router
//! instantiates them once per entity.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use tower_sessions::Session;
use tracing::instrument;
use url::form_urlencoded;

use emporium_core::api::ListQuery;

use crate::components::DataTableConfig;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{RequireAdminAuth, RequireWriteAccess};
use crate::resources::fields::{form_values, pair_map, parse_form};
use crate::resources::{
    Cell, Ctx, Editable, Field, FormField, Resource, export_csv, found, run_bulk,
};
use crate::routes::layout::{Layout, set_flash};
use crate::state::AppState;

/// One table row.
#[derive(Debug, Clone)]
pub struct RowView {
    pub id: String,
    pub href: String,
    pub cells: Vec<Cell>,
}

/// Resource list page.
#[derive(Template, WebTemplate)]
#[template(path = "resources/list.html")]
pub struct ListTemplate {
    pub layout: Layout,
    pub title: &'static str,
    pub path: &'static str,
    pub singular: &'static str,
    pub creatable: bool,
    pub table: DataTableConfig,
    pub rows: Vec<RowView>,
    pub search: String,
    pub status: String,
    pub page: u32,
    pub total_pages: u32,
    pub total: i64,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub export_href: String,
}

/// Create and edit form page.
#[derive(Template, WebTemplate)]
#[template(path = "resources/form.html")]
pub struct FormTemplate {
    pub layout: Layout,
    pub title: &'static str,
    pub heading: String,
    pub path: &'static str,
    pub action: String,
    pub submit_label: &'static str,
    pub fields: Vec<FormField>,
    pub error: Option<String>,
    pub delete_action: Option<String>,
}

/// `/admin/{path}?q=..&status=..&page=..`, keeping only the set filters.
#[must_use]
pub fn list_href(base: &str, query: &ListQuery, page: Option<u32>) -> String {
    let mut params = form_urlencoded::Serializer::new(String::new());
    if let Some(q) = query.search() {
        params.append_pair("q", q);
    }
    if let Some(status) = query.status_filter() {
        params.append_pair("status", status);
    }
    if let Some(page) = page.filter(|&p| p > 1) {
        params.append_pair("page", &page.to_string());
    }
    let params = params.finish();
    if params.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{params}")
    }
}

fn list_path<R: Resource>() -> String {
    format!("/admin/{}", R::PATH)
}

/// Read a submitted form into the resource's input type.
///
/// # Errors
///
/// Returns `AppError::BadRequest` naming the field that could not be read.
pub fn read_input<T: DeserializeOwned>(fields: &[Field], pairs: &[(String, String)]) -> Result<T> {
    let value = parse_form(fields, pairs).map_err(|e| AppError::BadRequest(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| AppError::BadRequest(format!("Invalid input: {e}")))
}

/// Errors shown next to the form instead of as an error page.
fn is_form_error(err: &AppError) -> bool {
    let status = err.status();
    status == StatusCode::BAD_REQUEST || status == StatusCode::CONFLICT
}

/// Form fields pre-filled from `values`.
fn form_fields(fields: &[Field], value_of: impl Fn(&str) -> Option<String>) -> Vec<FormField> {
    fields
        .iter()
        .map(|field| FormField::new(field, value_of(field.name).as_deref()))
        .collect()
}

/// Fields re-filled from a rejected submission.
fn submitted_fields(fields: &[Field], pairs: &[(String, String)]) -> Vec<FormField> {
    let submitted = pair_map(pairs);
    form_fields(fields, |name| {
        if name == "password" {
            return None;
        }
        submitted.get(name).map(|v| (*v).to_string())
    })
}

#[instrument(skip_all, fields(resource = R::PATH))]
pub async fn index<R: Resource>(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ListQuery>,
) -> Result<ListTemplate> {
    let page = R::list(state.pool(), &query).await?;
    let currency = state.config().currency;
    let base = list_path::<R>();

    let table = if admin.can_write() {
        R::table()
    } else {
        R::table().read_only()
    };
    let rows = page
        .items
        .iter()
        .map(|record| {
            let id = R::id(record);
            RowView {
                id: id.to_string(),
                href: R::href(id),
                cells: R::cells(record, currency),
            }
        })
        .collect();

    Ok(ListTemplate {
        layout: Layout::load(&state, &session, &admin, R::PATH).await,
        title: R::TITLE,
        path: R::PATH,
        singular: R::SINGULAR,
        creatable: R::CREATABLE && admin.can_write(),
        table,
        rows,
        search: query.search().unwrap_or_default().to_string(),
        status: query.status_filter().unwrap_or_default().to_string(),
        page: page.page,
        total_pages: page.total_pages,
        total: page.total,
        previous_href: page
            .has_previous()
            .then(|| list_href(&base, &query, Some(page.page - 1))),
        next_href: page
            .has_next()
            .then(|| list_href(&base, &query, Some(page.page + 1))),
        export_href: list_href(&format!("{base}/export.csv"), &query, None),
    })
}

#[instrument(skip_all, fields(resource = R::PATH))]
pub async fn new<R: Editable>(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    session: Session,
) -> Result<FormTemplate> {
    if !R::CREATABLE {
        return Err(AppError::NotFound(format!("New {}", R::SINGULAR)));
    }
    let fields = form_fields(&R::fields(), |name| {
        (name == "is_active").then(|| "on".to_string())
    });
    Ok(FormTemplate {
        layout: Layout::load(&state, &session, &admin, R::PATH).await,
        title: R::TITLE,
        heading: format!("New {}", R::SINGULAR),
        path: R::PATH,
        action: list_path::<R>(),
        submit_label: "Create",
        fields,
        error: None,
        delete_action: None,
    })
}

#[instrument(skip_all, fields(resource = R::PATH))]
pub async fn create<R: Editable>(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    session: Session,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response> {
    if !R::CREATABLE {
        return Err(AppError::NotFound(format!("New {}", R::SINGULAR)));
    }
    let fields = R::fields();
    let ctx = Ctx::new(state.pool(), &admin);
    let result = match read_input::<R::Input>(&fields, &pairs) {
        Ok(input) => R::create(ctx, input).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(record) => {
            tracing::info!(resource = R::PATH, id = %R::id(&record), admin_id = %admin.id, "Record created");
            set_flash(&session, &format!("Created {} {}", R::SINGULAR, R::label(&record))).await?;
            Ok(Redirect::to(&list_path::<R>()).into_response())
        }
        Err(e) if is_form_error(&e) => {
            let page = FormTemplate {
                layout: Layout::load(&state, &session, &admin, R::PATH).await,
                title: R::TITLE,
                heading: format!("New {}", R::SINGULAR),
                path: R::PATH,
                action: list_path::<R>(),
                submit_label: "Create",
                fields: submitted_fields(&fields, &pairs),
                error: Some(e.public_message()),
                delete_action: None,
            };
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(e) => Err(e),
    }
}

#[instrument(skip_all, fields(resource = R::PATH, id = %id))]
pub async fn edit<R: Editable>(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<R::Id>,
) -> Result<FormTemplate> {
    let record = found(R::get(state.pool(), id).await?)?;
    let fields = R::fields();
    let json = serde_json::to_value(&record).map_err(|e| AppError::Internal(e.to_string()))?;
    let values = form_values(&fields, &json);

    Ok(FormTemplate {
        layout: Layout::load(&state, &session, &admin, R::PATH).await,
        title: R::TITLE,
        heading: format!("Edit {} {}", R::SINGULAR, R::label(&record)),
        path: R::PATH,
        action: format!("/admin/{}/{id}", R::PATH),
        submit_label: "Save",
        fields: form_fields(&fields, |name| values.get(name).cloned()),
        error: None,
        delete_action: admin
            .can_write()
            .then(|| format!("/admin/{}/{id}/delete", R::PATH)),
    })
}

#[instrument(skip_all, fields(resource = R::PATH, id = %id))]
pub async fn update<R: Editable>(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<R::Id>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response> {
    let fields = R::fields();
    let ctx = Ctx::new(state.pool(), &admin);
    let result = match read_input::<R::Input>(&fields, &pairs) {
        Ok(input) => R::update(ctx, id, input).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(record) => {
            tracing::info!(resource = R::PATH, %id, admin_id = %admin.id, "Record updated");
            set_flash(&session, &format!("Saved {} {}", R::SINGULAR, R::label(&record))).await?;
            Ok(Redirect::to(&list_path::<R>()).into_response())
        }
        Err(e) if is_form_error(&e) => {
            let page = FormTemplate {
                layout: Layout::load(&state, &session, &admin, R::PATH).await,
                title: R::TITLE,
                heading: format!("Edit {}", R::SINGULAR),
                path: R::PATH,
                action: format!("/admin/{}/{id}", R::PATH),
                submit_label: "Save",
                fields: submitted_fields(&fields, &pairs),
                error: Some(e.public_message()),
                delete_action: Some(format!("/admin/{}/{id}/delete", R::PATH)),
            };
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(e) => Err(e),
    }
}

#[instrument(skip_all, fields(resource = R::PATH, id = %id))]
pub async fn delete<R: Editable>(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<R::Id>,
) -> Result<Redirect> {
    let message = match R::delete(Ctx::new(state.pool(), &admin), id).await {
        Ok(()) => {
            tracing::info!(resource = R::PATH, %id, admin_id = %admin.id, "Record deleted");
            format!("Deleted {} {id}", R::SINGULAR)
        }
        Err(e) if is_form_error(&e) => format!("Could not delete {} {id}: {}", R::SINGULAR, e.public_message()),
        Err(e) => return Err(e),
    };
    set_flash(&session, &message).await?;
    Ok(Redirect::to(&list_path::<R>()))
}

/// Ids and action from a bulk form. Ids may repeat or be comma-separated.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a missing action or a malformed id.
pub fn bulk_selection<Id: From<i32>>(pairs: &[(String, String)]) -> Result<(Vec<Id>, String)> {
    let mut ids = Vec::new();
    let mut action = None;
    for (key, value) in pairs {
        match key.as_str() {
            "ids" | "ids[]" => {
                for raw in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    let id = raw
                        .parse::<i32>()
                        .map_err(|_| AppError::BadRequest(format!("Invalid id: {raw}")))?;
                    ids.push(Id::from(id));
                }
            }
            "action" => action = Some(value.trim().to_string()),
            _ => {}
        }
    }
    let action = action
        .filter(|a| !a.is_empty())
        .ok_or_else(|| AppError::BadRequest("Choose a bulk action".to_string()))?;
    Ok((ids, action))
}

#[instrument(skip_all, fields(resource = R::PATH))]
pub async fn bulk<R: Resource>(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    session: Session,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Redirect> {
    let message = match bulk_selection::<R::Id>(&pairs) {
        Ok((ids, action)) => match run_bulk::<R>(Ctx::new(state.pool(), &admin), ids, &action).await {
            Ok(outcome) => {
                let summary = outcome.summary(&filters::humanize_text(&action));
                match outcome.errors.first() {
                    Some(first) => format!("{summary} ({first})"),
                    None => summary,
                }
            }
            Err(e) => e.public_message(),
        },
        Err(e) => e.public_message(),
    };
    set_flash(&session, &message).await?;
    Ok(Redirect::to(&list_path::<R>()))
}

#[instrument(skip_all, fields(resource = R::PATH))]
pub async fn export<R: Resource>(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response> {
    let (body, rows) = export_csv::<R>(state.pool(), &query).await?;
    tracing::info!(resource = R::PATH, rows, admin_id = %admin.id, "CSV exported");

    let filename = format!("{}-{}.csv", R::PATH, Utc::now().format("%Y%m%d"));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emporium_core::BrandId;

    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn test_list_href_keeps_filters() {
        let query = ListQuery {
            q: Some("oak desk".to_string()),
            status: Some("all".to_string()),
            page: Some(3),
            per_page: None,
        };
        assert_eq!(list_href("/admin/products", &query, Some(4)), "/admin/products?q=oak+desk&page=4");
        assert_eq!(list_href("/admin/products", &query, Some(1)), "/admin/products?q=oak+desk");
        assert_eq!(list_href("/admin/brands", &ListQuery::default(), None), "/admin/brands");
    }

    #[test]
    fn test_bulk_selection() {
        let (ids, action) = bulk_selection::<BrandId>(&pairs(&[
            ("ids", "1"),
            ("ids", "2,3"),
            ("action", "deactivate"),
            ("csrf", "x"),
        ]))
        .unwrap();
        assert_eq!(ids, vec![BrandId::new(1), BrandId::new(2), BrandId::new(3)]);
        assert_eq!(action, "deactivate");
    }

    #[test]
    fn test_bulk_selection_errors() {
        assert!(bulk_selection::<BrandId>(&pairs(&[("ids", "1")])).is_err());
        assert!(bulk_selection::<BrandId>(&pairs(&[("ids", "x"), ("action", "delete")])).is_err());
    }

    #[test]
    fn test_form_errors_are_client_errors() {
        assert!(is_form_error(&AppError::BadRequest("bad".to_string())));
        assert!(is_form_error(&AppError::Database(
            emporium_db::RepositoryError::Conflict("dup".to_string())
        )));
        assert!(!is_form_error(&AppError::Internal("boom".to_string())));
    }
}
