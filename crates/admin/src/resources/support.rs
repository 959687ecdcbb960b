//! After-sales resources: quote requests, returns and warranties.

use chrono::Utc;
use sqlx::PgPool;

use emporium_core::api::{ListQuery, Paginated};
use emporium_core::{CurrencyCode, QuoteId, QuoteStatus, ReturnId, ReturnStatus, WarrantyId, WarrantyStatus};
use emporium_db::{
    NewQuote, Quote, QuoteInput, QuoteRepository, RepositoryError, Return, ReturnInput,
    ReturnRepository, Warranty, WarrantyInput, WarrantyRepository,
};

use crate::components::{BulkAction, DataTableConfig, TableColumn, TableFilter};
use crate::error::AppError;

use super::{
    Cell, Ctx, Editable, Field, FieldKind, Patch, Resource, csv_time, empty_patch, found, money,
    short_time, unknown_action,
};

// =============================================================================
// Quotes
// =============================================================================

pub struct Quotes;

const fn quote_tone(status: QuoteStatus) -> &'static str {
    match status {
        QuoteStatus::New => "info",
        QuoteStatus::Reviewing => "warning",
        QuoteStatus::Quoted => "primary",
        QuoteStatus::Accepted => "success",
        QuoteStatus::Rejected => "muted",
    }
}

impl Resource for Quotes {
    type Id = QuoteId;
    type Record = Quote;

    const PATH: &'static str = "quotes";
    const TITLE: &'static str = "Quote requests";
    const SINGULAR: &'static str = "quote";

    fn table() -> DataTableConfig {
        DataTableConfig::new("quotes")
            .column(TableColumn::new("number", "Number"))
            .column(TableColumn::new("name", "Name"))
            .column(TableColumn::new("email", "Email"))
            .column(TableColumn::new("company", "Company").visible(false))
            .column(TableColumn::new("quantity", "Units"))
            .column(TableColumn::new("amount", "Quoted"))
            .column(TableColumn::new("status", "Status"))
            .column(TableColumn::new("created", "Received"))
            .filter(TableFilter::status(
                "Status",
                QuoteStatus::ALL.iter().map(|s| (s.as_str(), s.label())),
            ))
            .bulk_actions([
                BulkAction::new("reviewing", "Mark reviewing", "ph-magnifying-glass"),
                BulkAction::new("rejected", "Reject", "ph-x-circle"),
                BulkAction::delete(),
            ])
            .search_placeholder("Search by number, name, email or company...")
            .empty_state("ph-chat-text", "No quote requests", None)
    }

    fn id(record: &Quote) -> QuoteId {
        record.id
    }

    fn label(record: &Quote) -> String {
        record.quote_number.clone()
    }

    fn cells(record: &Quote, currency: CurrencyCode) -> Vec<Cell> {
        vec![
            Cell::text(&record.quote_number),
            Cell::text(&record.name),
            Cell::text(&record.email),
            Cell::optional(record.company.as_deref()),
            Cell::text(record.total_quantity().to_string()),
            Cell::optional(record.quoted_amount.map(|a| money(a, currency))),
            Cell::badge(record.status.label(), quote_tone(record.status)),
            Cell::text(short_time(record.created_at)),
        ]
    }

    fn csv_header() -> &'static [&'static str] {
        &[
            "id",
            "quote_number",
            "name",
            "email",
            "company",
            "phone",
            "units",
            "status",
            "quoted_amount",
            "created_at",
        ]
    }

    fn csv_row(record: &Quote) -> Vec<String> {
        vec![
            record.id.to_string(),
            record.quote_number.clone(),
            record.name.clone(),
            record.email.clone(),
            record.company.clone().unwrap_or_default(),
            record.phone.clone().unwrap_or_default(),
            record.total_quantity().to_string(),
            record.status.to_string(),
            record.quoted_amount.map(|a| a.to_string()).unwrap_or_default(),
            csv_time(Some(record.created_at)),
        ]
    }

    async fn list(pool: &PgPool, query: &ListQuery) -> Result<Paginated<Quote>, RepositoryError> {
        QuoteRepository::new(pool).list(query).await
    }

    async fn get(pool: &PgPool, id: QuoteId) -> Result<Option<Quote>, RepositoryError> {
        QuoteRepository::new(pool).get(id).await
    }

    async fn patch(ctx: Ctx<'_>, id: QuoteId, patch: Patch) -> Result<Quote, AppError> {
        let status = patch.status_as::<QuoteStatus>()?;
        if status.is_none() && patch.quoted_amount.is_none() && patch.admin_notes.is_none() {
            return Err(empty_patch());
        }
        let repo = QuoteRepository::new(ctx.pool);
        let current = found(repo.get(id).await?)?;
        Ok(repo
            .update_status(
                id,
                status.unwrap_or(current.status),
                patch.quoted_amount,
                patch.admin_notes.as_deref(),
            )
            .await?)
    }

    async fn bulk(ctx: Ctx<'_>, id: QuoteId, action: &str) -> Result<(), AppError> {
        let repo = QuoteRepository::new(ctx.pool);
        match action {
            "reviewing" => {
                repo.update_status(id, QuoteStatus::Reviewing, None, None).await?;
            }
            "rejected" => {
                repo.update_status(id, QuoteStatus::Rejected, None, None).await?;
            }
            "delete" => repo.delete(id).await?,
            other => return Err(unknown_action(other)),
        }
        Ok(())
    }
}

impl Editable for Quotes {
    type Input = QuoteInput;

    fn fields() -> Vec<Field> {
        vec![
            Field::new("name", "Name", FieldKind::Text).required(),
            Field::new("email", "Email", FieldKind::Email).required(),
            Field::new("company", "Company", FieldKind::Text),
            Field::new("phone", "Phone", FieldKind::Text),
            Field::new("message", "Message", FieldKind::Textarea).required(),
            Field::new("items", "Items", FieldKind::Json)
                .help(r#"JSON array, e.g. [{"description": "Oak desk", "quantity": 10}]"#),
            Field::new(
                "status",
                "Status",
                FieldKind::select(QuoteStatus::ALL, QuoteStatus::as_str, QuoteStatus::label),
            ),
            Field::new("quoted_amount", "Quoted amount", FieldKind::Decimal)
                .help("Required when the status is Quoted"),
            Field::new("admin_notes", "Internal notes", FieldKind::Textarea),
        ]
    }

    async fn create(ctx: Ctx<'_>, input: QuoteInput) -> Result<Quote, AppError> {
        let repo = QuoteRepository::new(ctx.pool);
        let quote = repo
            .create(&NewQuote {
                name: input.name.clone(),
                email: input.email.clone(),
                company: input.company.clone(),
                phone: input.phone.clone(),
                message: input.message.clone(),
                items: input.items.clone(),
            })
            .await?;

        let needs_update = input.status != QuoteStatus::New
            || input.quoted_amount.is_some()
            || input.admin_notes.is_some();
        if needs_update {
            return Ok(repo.update(quote.id, &input).await?);
        }
        Ok(quote)
    }

    async fn update(ctx: Ctx<'_>, id: QuoteId, input: QuoteInput) -> Result<Quote, AppError> {
        Ok(QuoteRepository::new(ctx.pool).update(id, &input).await?)
    }

    async fn delete(ctx: Ctx<'_>, id: QuoteId) -> Result<(), AppError> {
        Ok(QuoteRepository::new(ctx.pool).delete(id).await?)
    }
}

// =============================================================================
// Returns
// =============================================================================

pub struct Returns;

const fn return_tone(status: ReturnStatus) -> &'static str {
    match status {
        ReturnStatus::Requested => "info",
        ReturnStatus::Approved | ReturnStatus::Received => "warning",
        ReturnStatus::Refunded => "success",
        ReturnStatus::Rejected => "muted",
    }
}

impl Resource for Returns {
    type Id = ReturnId;
    type Record = Return;

    const PATH: &'static str = "returns";
    const TITLE: &'static str = "Returns";
    const SINGULAR: &'static str = "return";
    const CREATABLE: bool = false;

    fn table() -> DataTableConfig {
        DataTableConfig::new("returns")
            .column(TableColumn::new("rma", "RMA"))
            .column(TableColumn::new("order", "Order"))
            .column(TableColumn::new("email", "Email"))
            .column(TableColumn::new("reason", "Reason"))
            .column(TableColumn::new("refund", "Refund"))
            .column(TableColumn::new("status", "Status"))
            .column(TableColumn::new("created", "Opened").visible(false))
            .filter(TableFilter::status(
                "Status",
                ReturnStatus::ALL.iter().map(|s| (s.as_str(), s.label())),
            ))
            .bulk_actions([
                BulkAction::new("approved", "Approve", "ph-check"),
                BulkAction::new("rejected", "Reject", "ph-x-circle"),
                BulkAction::new("received", "Mark received", "ph-package"),
                BulkAction::delete(),
            ])
            .search_placeholder("Search by RMA, order, email or reason...")
            .empty_state("ph-arrow-u-up-left", "No returns", Some("Customers open returns from the storefront."))
    }

    fn id(record: &Return) -> ReturnId {
        record.id
    }

    fn label(record: &Return) -> String {
        record.rma_number.clone()
    }

    fn cells(record: &Return, currency: CurrencyCode) -> Vec<Cell> {
        vec![
            Cell::text(&record.rma_number),
            Cell::text(&record.order_number),
            Cell::text(&record.email),
            Cell::text(&record.reason),
            Cell::optional(record.refund_amount.map(|a| money(a, currency))),
            Cell::badge(record.status.label(), return_tone(record.status)),
            Cell::text(short_time(record.created_at)),
        ]
    }

    fn csv_header() -> &'static [&'static str] {
        &[
            "id",
            "rma_number",
            "order_number",
            "email",
            "reason",
            "status",
            "refund_amount",
            "created_at",
        ]
    }

    fn csv_row(record: &Return) -> Vec<String> {
        vec![
            record.id.to_string(),
            record.rma_number.clone(),
            record.order_number.clone(),
            record.email.clone(),
            record.reason.clone(),
            record.status.to_string(),
            record.refund_amount.map(|a| a.to_string()).unwrap_or_default(),
            csv_time(Some(record.created_at)),
        ]
    }

    async fn list(pool: &PgPool, query: &ListQuery) -> Result<Paginated<Return>, RepositoryError> {
        ReturnRepository::new(pool).list(query).await
    }

    async fn get(pool: &PgPool, id: ReturnId) -> Result<Option<Return>, RepositoryError> {
        ReturnRepository::new(pool).get(id).await
    }

    async fn patch(ctx: Ctx<'_>, id: ReturnId, patch: Patch) -> Result<Return, AppError> {
        let status = patch.status_as::<ReturnStatus>()?;
        if status.is_none() && patch.refund_amount.is_none() && patch.admin_notes.is_none() {
            return Err(empty_patch());
        }
        let repo = ReturnRepository::new(ctx.pool);
        let current = found(repo.get(id).await?)?;
        Ok(repo
            .update_status(
                id,
                status.unwrap_or(current.status),
                patch.refund_amount,
                patch.admin_notes.as_deref(),
            )
            .await?)
    }

    async fn bulk(ctx: Ctx<'_>, id: ReturnId, action: &str) -> Result<(), AppError> {
        let repo = ReturnRepository::new(ctx.pool);
        let next = match action {
            "delete" => return Ok(repo.delete(id).await?),
            "approved" => ReturnStatus::Approved,
            "rejected" => ReturnStatus::Rejected,
            "received" => ReturnStatus::Received,
            other => return Err(unknown_action(other)),
        };
        repo.update_status(id, next, None, None).await?;
        Ok(())
    }
}

impl Editable for Returns {
    type Input = ReturnInput;

    fn fields() -> Vec<Field> {
        vec![
            Field::new("reason", "Reason", FieldKind::Text).required(),
            Field::new("details", "Details", FieldKind::Textarea),
            Field::new(
                "status",
                "Status",
                FieldKind::select(ReturnStatus::ALL, ReturnStatus::as_str, ReturnStatus::label),
            )
            .required(),
            Field::new("refund_amount", "Refund amount", FieldKind::Decimal)
                .help("Required to mark refunded; at most the order total"),
            Field::new("admin_notes", "Internal notes", FieldKind::Textarea),
        ]
    }

    async fn create(_ctx: Ctx<'_>, _input: ReturnInput) -> Result<Return, AppError> {
        Err(AppError::BadRequest(
            "Returns are opened by customers from the storefront".to_string(),
        ))
    }

    async fn update(ctx: Ctx<'_>, id: ReturnId, input: ReturnInput) -> Result<Return, AppError> {
        Ok(ReturnRepository::new(ctx.pool).update(id, &input).await?)
    }

    async fn delete(ctx: Ctx<'_>, id: ReturnId) -> Result<(), AppError> {
        Ok(ReturnRepository::new(ctx.pool).delete(id).await?)
    }
}

// =============================================================================
// Warranties
// =============================================================================

pub struct Warranties;

const fn warranty_tone(status: WarrantyStatus) -> &'static str {
    match status {
        WarrantyStatus::Active => "success",
        WarrantyStatus::Claimed => "warning",
        WarrantyStatus::Expired | WarrantyStatus::Void => "muted",
    }
}

impl Resource for Warranties {
    type Id = WarrantyId;
    type Record = Warranty;

    const PATH: &'static str = "warranties";
    const TITLE: &'static str = "Warranties";
    const SINGULAR: &'static str = "warranty";

    fn table() -> DataTableConfig {
        DataTableConfig::new("warranties")
            .column(TableColumn::new("number", "Number"))
            .column(TableColumn::new("product", "Product"))
            .column(TableColumn::new("email", "Customer"))
            .column(TableColumn::new("serial", "Serial").visible(false))
            .column(TableColumn::new("purchased", "Purchased").visible(false))
            .column(TableColumn::new("expires", "Expires"))
            .column(TableColumn::new("status", "Status"))
            .filter(TableFilter::status(
                "Status",
                WarrantyStatus::ALL.iter().map(|s| (s.as_str(), s.label())),
            ))
            .bulk_actions([
                BulkAction::new("void", "Void", "ph-prohibit").destructive(),
                BulkAction::delete(),
            ])
            .search_placeholder("Search by number, email, serial or product...")
            .empty_state("ph-shield-check", "No warranties registered", None)
    }

    fn id(record: &Warranty) -> WarrantyId {
        record.id
    }

    fn label(record: &Warranty) -> String {
        record.warranty_number.clone()
    }

    fn cells(record: &Warranty, _currency: CurrencyCode) -> Vec<Cell> {
        let status = record.effective_status(Utc::now().date_naive());
        vec![
            Cell::text(&record.warranty_number),
            Cell::text(&record.product_name),
            Cell::text(&record.customer_email),
            Cell::optional(record.serial_number.as_deref()),
            Cell::text(record.purchase_date.to_string()),
            Cell::text(record.expires_on.to_string()),
            Cell::badge(status.label(), warranty_tone(status)),
        ]
    }

    fn csv_header() -> &'static [&'static str] {
        &[
            "id",
            "warranty_number",
            "product_id",
            "product_name",
            "customer_email",
            "serial_number",
            "order_number",
            "purchase_date",
            "expires_on",
            "status",
        ]
    }

    fn csv_row(record: &Warranty) -> Vec<String> {
        vec![
            record.id.to_string(),
            record.warranty_number.clone(),
            record.product_id.to_string(),
            record.product_name.clone(),
            record.customer_email.clone(),
            record.serial_number.clone().unwrap_or_default(),
            record.order_number.clone().unwrap_or_default(),
            record.purchase_date.to_string(),
            record.expires_on.to_string(),
            record.effective_status(Utc::now().date_naive()).to_string(),
        ]
    }

    async fn list(pool: &PgPool, query: &ListQuery) -> Result<Paginated<Warranty>, RepositoryError> {
        WarrantyRepository::new(pool).list(query).await
    }

    async fn get(pool: &PgPool, id: WarrantyId) -> Result<Option<Warranty>, RepositoryError> {
        WarrantyRepository::new(pool).get(id).await
    }

    async fn patch(ctx: Ctx<'_>, id: WarrantyId, patch: Patch) -> Result<Warranty, AppError> {
        let status = patch.status_as::<WarrantyStatus>()?;
        if status.is_none() && patch.claim_description.is_none() {
            return Err(empty_patch());
        }
        let repo = WarrantyRepository::new(ctx.pool);
        let current = found(repo.get(id).await?)?;
        Ok(repo
            .update_status(
                id,
                status.unwrap_or(current.status),
                patch.claim_description.as_deref(),
            )
            .await?)
    }

    async fn bulk(ctx: Ctx<'_>, id: WarrantyId, action: &str) -> Result<(), AppError> {
        let repo = WarrantyRepository::new(ctx.pool);
        match action {
            "void" => {
                repo.update_status(id, WarrantyStatus::Void, None).await?;
            }
            "delete" => repo.delete(id).await?,
            other => return Err(unknown_action(other)),
        }
        Ok(())
    }
}

impl Editable for Warranties {
    type Input = WarrantyInput;

    fn fields() -> Vec<Field> {
        vec![
            Field::new("product_id", "Product ID", FieldKind::Reference).required(),
            Field::new("customer_email", "Customer email", FieldKind::Email).required(),
            Field::new("serial_number", "Serial number", FieldKind::Text),
            Field::new("purchase_date", "Purchase date", FieldKind::Date)
                .required()
                .help("Expiry is computed from the product's warranty months"),
            Field::new("order_number", "Order number", FieldKind::Text),
            Field::new(
                "status",
                "Status",
                FieldKind::select(WarrantyStatus::ALL, WarrantyStatus::as_str, WarrantyStatus::label),
            ),
            Field::new("claim_description", "Claim description", FieldKind::Textarea)
                .help("Required when the status is Claimed"),
        ]
    }

    async fn create(ctx: Ctx<'_>, input: WarrantyInput) -> Result<Warranty, AppError> {
        Ok(WarrantyRepository::new(ctx.pool).create_from_input(&input).await?)
    }

    async fn update(ctx: Ctx<'_>, id: WarrantyId, input: WarrantyInput) -> Result<Warranty, AppError> {
        Ok(WarrantyRepository::new(ctx.pool).update(id, &input).await?)
    }

    async fn delete(ctx: Ctx<'_>, id: WarrantyId) -> Result<(), AppError> {
        Ok(WarrantyRepository::new(ctx.pool).delete(id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::super::fields::parse_form;
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn test_quote_cells() {
        let quote: Quote = serde_json::from_value(serde_json::json!({
            "id": 4,
            "quote_number": "Q-20260301-ABCD",
            "name": "Dana",
            "email": "dana@example.org",
            "company": "Acme",
            "phone": null,
            "message": "Desks for an office",
            "items": [
                {"description": "Oak desk", "quantity": 10},
                {"product_id": 3, "description": "Lamp", "quantity": 5}
            ],
            "status": "quoted",
            "quoted_amount": "4200.00",
            "admin_notes": null,
            "created_at": "2026-03-01T10:00:00Z",
            "updated_at": "2026-03-01T10:00:00Z"
        }))
        .unwrap();
        let cells = Quotes::cells(&quote, CurrencyCode::USD);
        assert_eq!(cells.len(), Quotes::table().columns.len());
        assert_eq!(cells[4].text, "15");
        assert_eq!(cells[5].text, "$4,200.00");
        assert_eq!(cells[6], Cell::badge("Quoted", "primary"));
        assert_eq!(Quotes::csv_row(&quote).len(), Quotes::csv_header().len());
    }

    #[test]
    fn test_quote_form_items_json() {
        let json = parse_form(
            &Quotes::fields(),
            &pairs(&[
                ("name", "Dana"),
                ("email", "dana@example.org"),
                ("message", "Desks"),
                ("items", r#"[{"description": "Oak desk", "quantity": 10}]"#),
                ("status", "quoted"),
                ("quoted_amount", "4200"),
            ]),
        )
        .unwrap();
        let input: QuoteInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.items.len(), 1);
        assert_eq!(input.items[0].quantity, 10);
        assert_eq!(input.status, QuoteStatus::Quoted);
        assert_eq!(input.quoted_amount, Some(Decimal::new(4200, 0)));
    }

    #[test]
    fn test_returns_are_not_creatable() {
        assert!(!Returns::CREATABLE);
        assert!(Quotes::CREATABLE);
        assert!(Returns::table().offers_action("received"));
    }

    #[test]
    fn test_warranty_shows_effective_status() {
        let warranty: Warranty = serde_json::from_value(serde_json::json!({
            "id": 8,
            "warranty_number": "W-20200101-ZZZZ",
            "product_id": 3,
            "product_name": "Oak Lamp",
            "order_id": null,
            "order_number": null,
            "customer_email": "dana@example.org",
            "serial_number": "SN-1",
            "purchase_date": "2020-01-01",
            "expires_on": "2021-01-01",
            "status": "active",
            "claim_description": null,
            "created_at": "2020-01-01T00:00:00Z",
            "updated_at": "2020-01-01T00:00:00Z"
        }))
        .unwrap();
        let cells = Warranties::cells(&warranty, CurrencyCode::USD);
        assert_eq!(cells[6], Cell::badge("Expired", "muted"));
        assert_eq!(Warranties::csv_row(&warranty)[9], "expired");
    }

    #[test]
    fn test_warranty_form_date() {
        let err = parse_form(
            &Warranties::fields(),
            &pairs(&[
                ("product_id", "3"),
                ("customer_email", "dana@example.org"),
                ("purchase_date", "03/01/2026"),
            ]),
        )
        .unwrap_err();
        assert_eq!(err.label, "Purchase date");
    }
}
