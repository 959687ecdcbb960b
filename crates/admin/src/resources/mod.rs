//! Back-office resources.
//!
//! Every admin screen is a table of records with the same operations: list,
//! create, edit, delete, bulk actions and CSV export. [`Resource`] describes
//! how one entity is listed and patched; [`Editable`] adds form-driven
//! create and update. The HTML pages and the JSON API in
//! [`crate::routes`] are generic over these traits, so each entity only
//! says what is different about it.

pub mod catalog;
pub mod fields;
pub mod marketing;
pub mod operations;
pub mod orders;
pub mod support;
pub mod users;

use std::fmt::Display;
use std::future::Future;

use futures::{StreamExt, stream};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sqlx::PgPool;

use emporium_core::CurrencyCode;
use emporium_core::api::{BulkOutcome, ListQuery, Paginated};
use emporium_core::csv::CsvWriter;
use emporium_db::RepositoryError;

use crate::components::DataTableConfig;
use crate::error::AppError;
use crate::models::CurrentAdmin;

pub use catalog::{Attributes, Brands, Categories, Products};
pub use fields::{Field, FieldKind, FormField};
pub use marketing::{ContentBlocks, Coupons, Deals};
pub use operations::{Inventory, ShippingMethods};
pub use orders::Orders;
pub use support::{Quotes, Returns, Warranties};
pub use users::Users;

/// Who is acting and where to find the database.
#[derive(Clone, Copy)]
pub struct Ctx<'a> {
    pub pool: &'a PgPool,
    pub admin: &'a CurrentAdmin,
}

impl<'a> Ctx<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, admin: &'a CurrentAdmin) -> Self {
        Self { pool, admin }
    }
}

/// One table cell. `tone` renders the text as a colored badge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub tone: Option<&'static str>,
}

impl Cell {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tone: None,
        }
    }

    #[must_use]
    pub fn badge(text: impl Into<String>, tone: &'static str) -> Self {
        Self {
            text: text.into(),
            tone: Some(tone),
        }
    }

    /// `Yes`/`No` badge for a flag.
    #[must_use]
    pub fn flag(on: bool) -> Self {
        if on {
            Self::badge("Yes", "success")
        } else {
            Self::badge("No", "muted")
        }
    }

    /// `Active`/`Inactive` badge.
    #[must_use]
    pub fn active(on: bool) -> Self {
        if on {
            Self::badge("Active", "success")
        } else {
            Self::badge("Inactive", "muted")
        }
    }

    /// Empty for `None`.
    #[must_use]
    pub fn optional(value: Option<impl Display>) -> Self {
        Self::text(value.map(|v| v.to_string()).unwrap_or_default())
    }
}

/// Partial update accepted by `PATCH /api/v1/admin/{resource}/{id}`.
///
/// Each resource reads the keys that apply to it and rejects an empty patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Patch {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_featured: Option<bool>,
    /// Inventory only: change on-hand quantity by this many units.
    #[serde(default)]
    pub adjust: Option<i32>,
    #[serde(default)]
    pub quoted_amount: Option<Decimal>,
    #[serde(default)]
    pub refund_amount: Option<Decimal>,
    #[serde(default)]
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub claim_description: Option<String>,
}

impl Patch {
    /// Parse `status` into the resource's status enum.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an unknown value.
    pub fn status_as<T>(&self) -> Result<Option<T>, AppError>
    where
        T: std::str::FromStr,
        T::Err: Display,
    {
        self.status
            .as_deref()
            .map(|s| s.parse::<T>().map_err(|e| AppError::BadRequest(e.to_string())))
            .transpose()
    }

    /// The requested active flag, from `is_active` or `status: active|inactive`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for any other status value.
    pub fn activation(&self) -> Result<Option<bool>, AppError> {
        if let Some(flag) = self.is_active {
            return Ok(Some(flag));
        }
        match self.status.as_deref() {
            None => Ok(None),
            Some("active") => Ok(Some(true)),
            Some("inactive") => Ok(Some(false)),
            Some(other) => Err(AppError::BadRequest(format!(
                "status must be active or inactive, not {other}"
            ))),
        }
    }
}

/// The error for a patch with nothing this resource understands.
#[must_use]
pub fn empty_patch() -> AppError {
    AppError::BadRequest("Nothing to update".to_string())
}

/// The error for a bulk action this resource does not offer.
#[must_use]
pub fn unknown_action(action: &str) -> AppError {
    AppError::BadRequest(format!("Unknown action: {action}"))
}

/// `activate` / `deactivate` as a flag.
#[must_use]
pub fn activation_action(action: &str) -> Option<bool> {
    match action {
        "activate" => Some(true),
        "deactivate" => Some(false),
        _ => None,
    }
}

/// Turn a missing row into a 404.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` for `None`.
pub fn found<T>(row: Option<T>) -> Result<T, AppError> {
    row.ok_or(AppError::Database(RepositoryError::NotFound))
}

/// A listable, patchable back-office entity.
pub trait Resource: Send + Sync + 'static {
    /// Typed primary key.
    type Id: Copy + Display + From<i32> + Serialize + DeserializeOwned + Send + Sync + 'static;
    /// Row shape returned by the repository.
    type Record: Serialize + Send + Sync + 'static;

    /// URL segment under `/admin` and `/api/v1/admin`.
    const PATH: &'static str;
    /// Page heading.
    const TITLE: &'static str;
    /// One record, lowercase ("brand", "shipping method").
    const SINGULAR: &'static str;
    /// Whether records can be created from the back-office.
    const CREATABLE: bool = true;

    /// Columns, filters and bulk actions for the list page.
    fn table() -> DataTableConfig;

    fn id(record: &Self::Record) -> Self::Id;

    /// Short human name for flash messages.
    fn label(record: &Self::Record) -> String;

    /// Cell values in `table()` column order.
    fn cells(record: &Self::Record, currency: CurrencyCode) -> Vec<Cell>;

    fn csv_header() -> &'static [&'static str];

    fn csv_row(record: &Self::Record) -> Vec<String>;

    /// Where a row links to.
    fn href(id: Self::Id) -> String {
        format!("/admin/{}/{id}/edit", Self::PATH)
    }

    fn list(
        pool: &PgPool,
        query: &ListQuery,
    ) -> impl Future<Output = Result<Paginated<Self::Record>, RepositoryError>> + Send;

    fn get(
        pool: &PgPool,
        id: Self::Id,
    ) -> impl Future<Output = Result<Option<Self::Record>, RepositoryError>> + Send;

    /// Apply a partial update and return the fresh record.
    fn patch(
        ctx: Ctx<'_>,
        id: Self::Id,
        patch: Patch,
    ) -> impl Future<Output = Result<Self::Record, AppError>> + Send;

    /// Run one bulk action against one record.
    fn bulk(
        ctx: Ctx<'_>,
        id: Self::Id,
        action: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A resource with create, update and delete forms.
pub trait Editable: Resource {
    /// Body of create and update requests.
    type Input: DeserializeOwned + Send + Sync + 'static;

    /// Form inputs, in display order.
    fn fields() -> Vec<Field>;

    fn create(
        ctx: Ctx<'_>,
        input: Self::Input,
    ) -> impl Future<Output = Result<Self::Record, AppError>> + Send;

    fn update(
        ctx: Ctx<'_>,
        id: Self::Id,
        input: Self::Input,
    ) -> impl Future<Output = Result<Self::Record, AppError>> + Send;

    fn delete(ctx: Ctx<'_>, id: Self::Id) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Most bulk actions running at once.
pub const BULK_CONCURRENCY: usize = 8;

/// Run `action` against every id, at most [`BULK_CONCURRENCY`] at a time.
///
/// Failures are tallied per record; one failing record does not stop the
/// others.
///
/// # Errors
///
/// Returns `AppError::BadRequest` if the resource does not offer `action`
/// or no ids were given.
pub async fn run_bulk<R: Resource>(
    ctx: Ctx<'_>,
    ids: Vec<R::Id>,
    action: &str,
) -> Result<BulkOutcome, AppError> {
    if !R::table().offers_action(action) {
        return Err(unknown_action(action));
    }
    if ids.is_empty() {
        return Err(AppError::BadRequest("Select at least one record".to_string()));
    }

    let results: Vec<_> = stream::iter(ids)
        .map(|id| async move { (id, R::bulk(ctx, id, action).await) })
        .buffer_unordered(BULK_CONCURRENCY)
        .collect()
        .await;

    let mut outcome = BulkOutcome::default();
    for (id, result) in results {
        if let Err(e) = &result {
            tracing::warn!(resource = R::PATH, %id, action, error = %e, "Bulk action failed");
        }
        outcome.record(id, result.map_err(|e| e.public_message()));
    }
    tracing::info!(
        resource = R::PATH,
        action,
        succeeded = outcome.succeeded,
        failed = outcome.failed,
        admin_id = %ctx.admin.id,
        "Bulk action finished"
    );
    Ok(outcome)
}

/// Every record matching `query`'s filters as CSV.
///
/// # Errors
///
/// Returns the repository error if a page cannot be loaded.
pub async fn export_csv<R: Resource>(pool: &PgPool, query: &ListQuery) -> Result<(String, usize), RepositoryError> {
    let mut writer = CsvWriter::with_header(R::csv_header().iter().copied());
    let mut query = query.unpaged();
    loop {
        let page = R::list(pool, &query).await?;
        for record in &page.items {
            writer.write_row(R::csv_row(record));
        }
        if !page.has_next() {
            break;
        }
        query = query.with_page(page.page + 1);
    }
    let rows = writer.body_rows();
    Ok((writer.finish(), rows))
}

/// Render a money amount for a table cell or CSV.
#[must_use]
pub fn money(amount: Decimal, currency: CurrencyCode) -> String {
    emporium_core::format_money(amount, currency)
}

/// RFC 3339 timestamp for CSV, empty for `None`.
#[must_use]
pub fn csv_time(value: Option<chrono::DateTime<chrono::Utc>>) -> String {
    value.map(|t| t.to_rfc3339()).unwrap_or_default()
}

/// Short date for table cells.
#[must_use]
pub fn short_time(value: chrono::DateTime<chrono::Utc>) -> String {
    value.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emporium_core::ProductStatus;

    use super::*;

    #[test]
    fn test_patch_rejects_unknown_keys() {
        let err = serde_json::from_str::<Patch>(r#"{"colour": "red"}"#).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn test_patch_status_as() {
        let patch: Patch = serde_json::from_str(r#"{"status": "archived"}"#).unwrap();
        assert_eq!(patch.status_as::<ProductStatus>().unwrap(), Some(ProductStatus::Archived));

        let patch: Patch = serde_json::from_str(r#"{"status": "gone"}"#).unwrap();
        assert!(matches!(patch.status_as::<ProductStatus>(), Err(AppError::BadRequest(_))));

        assert_eq!(Patch::default().status_as::<ProductStatus>().unwrap(), None);
    }

    #[test]
    fn test_patch_activation() {
        let patch: Patch = serde_json::from_str(r#"{"status": "inactive"}"#).unwrap();
        assert_eq!(patch.activation().unwrap(), Some(false));

        let patch: Patch = serde_json::from_str(r#"{"is_active": true, "status": "ignored"}"#).unwrap();
        assert_eq!(patch.activation().unwrap(), Some(true));

        let patch: Patch = serde_json::from_str(r#"{"status": "shipped"}"#).unwrap();
        assert!(patch.activation().is_err());
    }

    #[test]
    fn test_patch_amounts_parse_from_strings() {
        let patch: Patch = serde_json::from_str(r#"{"quoted_amount": "1250.00"}"#).unwrap();
        assert_eq!(patch.quoted_amount, Some(Decimal::new(125_000, 2)));
    }

    #[test]
    fn test_activation_action() {
        assert_eq!(activation_action("activate"), Some(true));
        assert_eq!(activation_action("deactivate"), Some(false));
        assert_eq!(activation_action("delete"), None);
    }

    #[test]
    fn test_cell_helpers() {
        assert_eq!(Cell::active(false), Cell::badge("Inactive", "muted"));
        assert_eq!(Cell::optional(None::<&str>).text, "");
        assert_eq!(Cell::optional(Some(3)).text, "3");
    }
}
