//! Marketing resources: coupons, flash deals and content blocks.

use sqlx::PgPool;

use emporium_core::api::{ListQuery, Paginated};
use emporium_core::{
    ContentBlockId, ContentBlockType, CouponId, CurrencyCode, DealId, DiscountType, Placement,
};
use emporium_db::{
    ContentBlock, ContentBlockInput, ContentBlockRepository, Coupon, CouponInput, CouponRepository,
    Deal, DealInput, DealRepository, RepositoryError,
};

use crate::components::{BulkAction, DataTableConfig, TableColumn, TableFilter};
use crate::error::AppError;

use super::{
    Cell, Ctx, Editable, Field, FieldKind, Patch, Resource, activation_action, csv_time,
    empty_patch, found, money, short_time, unknown_action,
};

fn active_filter() -> TableFilter {
    TableFilter::status("Status", [("active", "Active"), ("inactive", "Inactive")])
}

fn activation_bulk() -> [BulkAction; 3] {
    let [activate, deactivate] = BulkAction::activation();
    [activate, deactivate, BulkAction::delete()]
}

// =============================================================================
// Coupons
// =============================================================================

pub struct Coupons;

fn discount_text(coupon: &Coupon, currency: CurrencyCode) -> String {
    match coupon.discount_type {
        DiscountType::Percentage => format!("{}%", coupon.value.normalize()),
        DiscountType::FixedAmount => money(coupon.value, currency),
    }
}

fn usage_text(used: i32, limit: Option<i32>) -> String {
    limit.map_or_else(|| used.to_string(), |max| format!("{used} / {max}"))
}

impl Resource for Coupons {
    type Id = CouponId;
    type Record = Coupon;

    const PATH: &'static str = "coupons";
    const TITLE: &'static str = "Coupons";
    const SINGULAR: &'static str = "coupon";

    fn table() -> DataTableConfig {
        DataTableConfig::new("coupons")
            .column(TableColumn::new("code", "Code"))
            .column(TableColumn::new("discount", "Discount"))
            .column(TableColumn::new("minimum", "Minimum order").visible(false))
            .column(TableColumn::new("usage", "Used"))
            .column(TableColumn::new("expires", "Expires"))
            .column(TableColumn::new("status", "Status"))
            .filter(active_filter())
            .bulk_actions(activation_bulk())
            .search_placeholder("Search by code or description...")
            .empty_state("ph-ticket", "No coupons yet", None)
    }

    fn id(record: &Coupon) -> CouponId {
        record.id
    }

    fn label(record: &Coupon) -> String {
        record.code.clone()
    }

    fn cells(record: &Coupon, currency: CurrencyCode) -> Vec<Cell> {
        vec![
            Cell::text(&record.code),
            Cell::text(discount_text(record, currency)),
            Cell::optional(record.min_order_amount.map(|m| money(m, currency))),
            Cell::text(usage_text(record.used_count, record.max_uses)),
            Cell::optional(record.expires_at.map(short_time)),
            Cell::active(record.is_active),
        ]
    }

    fn csv_header() -> &'static [&'static str] {
        &[
            "id",
            "code",
            "discount_type",
            "value",
            "min_order_amount",
            "max_uses",
            "used_count",
            "starts_at",
            "expires_at",
            "is_active",
        ]
    }

    fn csv_row(record: &Coupon) -> Vec<String> {
        vec![
            record.id.to_string(),
            record.code.clone(),
            record.discount_type.to_string(),
            record.value.to_string(),
            record.min_order_amount.map(|m| m.to_string()).unwrap_or_default(),
            record.max_uses.map(|m| m.to_string()).unwrap_or_default(),
            record.used_count.to_string(),
            csv_time(record.starts_at),
            csv_time(record.expires_at),
            record.is_active.to_string(),
        ]
    }

    async fn list(pool: &PgPool, query: &ListQuery) -> Result<Paginated<Coupon>, RepositoryError> {
        CouponRepository::new(pool).list(query).await
    }

    async fn get(pool: &PgPool, id: CouponId) -> Result<Option<Coupon>, RepositoryError> {
        CouponRepository::new(pool).get(id).await
    }

    async fn patch(ctx: Ctx<'_>, id: CouponId, patch: Patch) -> Result<Coupon, AppError> {
        let active = patch.activation()?.ok_or_else(empty_patch)?;
        let repo = CouponRepository::new(ctx.pool);
        repo.set_active(id, active).await?;
        found(repo.get(id).await?)
    }

    async fn bulk(ctx: Ctx<'_>, id: CouponId, action: &str) -> Result<(), AppError> {
        let repo = CouponRepository::new(ctx.pool);
        match (action, activation_action(action)) {
            (_, Some(active)) => repo.set_active(id, active).await?,
            ("delete", None) => repo.delete(id).await?,
            (other, None) => return Err(unknown_action(other)),
        }
        Ok(())
    }
}

impl Editable for Coupons {
    type Input = CouponInput;

    fn fields() -> Vec<Field> {
        vec![
            Field::new("code", "Code", FieldKind::Text)
                .required()
                .help("Stored uppercase"),
            Field::new("description", "Description", FieldKind::Textarea),
            Field::new(
                "discount_type",
                "Discount type",
                FieldKind::select(DiscountType::ALL, DiscountType::as_str, DiscountType::label),
            )
            .required(),
            Field::new("value", "Value", FieldKind::Decimal)
                .required()
                .help("Percent (0-100) or fixed amount"),
            Field::new("min_order_amount", "Minimum order", FieldKind::Decimal),
            Field::new("max_uses", "Maximum uses", FieldKind::Integer),
            Field::new("starts_at", "Starts (UTC)", FieldKind::DateTime),
            Field::new("expires_at", "Expires (UTC)", FieldKind::DateTime),
            Field::new("is_active", "Active", FieldKind::Checkbox),
        ]
    }

    async fn create(ctx: Ctx<'_>, input: CouponInput) -> Result<Coupon, AppError> {
        Ok(CouponRepository::new(ctx.pool).create(&input).await?)
    }

    async fn update(ctx: Ctx<'_>, id: CouponId, input: CouponInput) -> Result<Coupon, AppError> {
        Ok(CouponRepository::new(ctx.pool).update(id, &input).await?)
    }

    async fn delete(ctx: Ctx<'_>, id: CouponId) -> Result<(), AppError> {
        Ok(CouponRepository::new(ctx.pool).delete(id).await?)
    }
}

// =============================================================================
// Flash deals
// =============================================================================

pub struct Deals;

impl Resource for Deals {
    type Id = DealId;
    type Record = Deal;

    const PATH: &'static str = "deals";
    const TITLE: &'static str = "Flash deals";
    const SINGULAR: &'static str = "deal";

    fn table() -> DataTableConfig {
        DataTableConfig::new("deals")
            .column(TableColumn::new("title", "Title"))
            .column(TableColumn::new("product", "Product"))
            .column(TableColumn::new("deal_price", "Deal price"))
            .column(TableColumn::new("regular_price", "Regular price").visible(false))
            .column(TableColumn::new("window", "Runs"))
            .column(TableColumn::new("sold", "Sold"))
            .column(TableColumn::new("status", "Status"))
            .filter(active_filter())
            .bulk_actions(activation_bulk())
            .search_placeholder("Search by title, product or SKU...")
            .empty_state("ph-lightning", "No flash deals yet", None)
    }

    fn id(record: &Deal) -> DealId {
        record.id
    }

    fn label(record: &Deal) -> String {
        record.title.clone()
    }

    fn cells(record: &Deal, currency: CurrencyCode) -> Vec<Cell> {
        vec![
            Cell::text(&record.title),
            Cell::text(&record.product_name),
            Cell::text(money(record.deal_price, currency)),
            Cell::text(money(record.regular_price, currency)),
            Cell::text(format!(
                "{} to {}",
                short_time(record.starts_at),
                short_time(record.ends_at)
            )),
            Cell::text(usage_text(record.sold_count, record.quantity_limit)),
            Cell::active(record.is_active),
        ]
    }

    fn csv_header() -> &'static [&'static str] {
        &[
            "id",
            "title",
            "product_id",
            "product_name",
            "regular_price",
            "deal_price",
            "starts_at",
            "ends_at",
            "quantity_limit",
            "sold_count",
            "is_active",
        ]
    }

    fn csv_row(record: &Deal) -> Vec<String> {
        vec![
            record.id.to_string(),
            record.title.clone(),
            record.product_id.to_string(),
            record.product_name.clone(),
            record.regular_price.to_string(),
            record.deal_price.to_string(),
            csv_time(Some(record.starts_at)),
            csv_time(Some(record.ends_at)),
            record.quantity_limit.map(|q| q.to_string()).unwrap_or_default(),
            record.sold_count.to_string(),
            record.is_active.to_string(),
        ]
    }

    async fn list(pool: &PgPool, query: &ListQuery) -> Result<Paginated<Deal>, RepositoryError> {
        DealRepository::new(pool).list(query).await
    }

    async fn get(pool: &PgPool, id: DealId) -> Result<Option<Deal>, RepositoryError> {
        DealRepository::new(pool).get(id).await
    }

    async fn patch(ctx: Ctx<'_>, id: DealId, patch: Patch) -> Result<Deal, AppError> {
        let active = patch.activation()?.ok_or_else(empty_patch)?;
        let repo = DealRepository::new(ctx.pool);
        repo.set_active(id, active).await?;
        found(repo.get(id).await?)
    }

    async fn bulk(ctx: Ctx<'_>, id: DealId, action: &str) -> Result<(), AppError> {
        let repo = DealRepository::new(ctx.pool);
        match (action, activation_action(action)) {
            (_, Some(active)) => repo.set_active(id, active).await?,
            ("delete", None) => repo.delete(id).await?,
            (other, None) => return Err(unknown_action(other)),
        }
        Ok(())
    }
}

impl Editable for Deals {
    type Input = DealInput;

    fn fields() -> Vec<Field> {
        vec![
            Field::new("title", "Title", FieldKind::Text).required(),
            Field::new("product_id", "Product ID", FieldKind::Reference).required(),
            Field::new("deal_price", "Deal price", FieldKind::Decimal)
                .required()
                .help("Must be below the product price"),
            Field::new("starts_at", "Starts (UTC)", FieldKind::DateTime).required(),
            Field::new("ends_at", "Ends (UTC)", FieldKind::DateTime).required(),
            Field::new("quantity_limit", "Quantity limit", FieldKind::Integer),
            Field::new("is_active", "Active", FieldKind::Checkbox),
        ]
    }

    async fn create(ctx: Ctx<'_>, input: DealInput) -> Result<Deal, AppError> {
        Ok(DealRepository::new(ctx.pool).create(&input).await?)
    }

    async fn update(ctx: Ctx<'_>, id: DealId, input: DealInput) -> Result<Deal, AppError> {
        Ok(DealRepository::new(ctx.pool).update(id, &input).await?)
    }

    async fn delete(ctx: Ctx<'_>, id: DealId) -> Result<(), AppError> {
        Ok(DealRepository::new(ctx.pool).delete(id).await?)
    }
}

// =============================================================================
// Content blocks
// =============================================================================

pub struct ContentBlocks;

impl Resource for ContentBlocks {
    type Id = ContentBlockId;
    type Record = ContentBlock;

    const PATH: &'static str = "content-blocks";
    const TITLE: &'static str = "Content blocks";
    const SINGULAR: &'static str = "content block";

    fn table() -> DataTableConfig {
        DataTableConfig::new("content-blocks")
            .column(TableColumn::new("title", "Title"))
            .column(TableColumn::new("key", "Key").visible(false))
            .column(TableColumn::new("type", "Type"))
            .column(TableColumn::new("placement", "Placement"))
            .column(TableColumn::new("position", "Position"))
            .column(TableColumn::new("status", "Status"))
            .filter(active_filter())
            .bulk_actions(activation_bulk())
            .search_placeholder("Search by key, title or body...")
            .empty_state("ph-layout", "No content blocks yet", None)
    }

    fn id(record: &ContentBlock) -> ContentBlockId {
        record.id
    }

    fn label(record: &ContentBlock) -> String {
        record.title.clone()
    }

    fn cells(record: &ContentBlock, _currency: CurrencyCode) -> Vec<Cell> {
        vec![
            Cell::text(&record.title),
            Cell::text(&record.key),
            Cell::badge(record.block_type.label(), "info"),
            Cell::text(record.placement.label()),
            Cell::text(record.position.to_string()),
            Cell::active(record.is_active),
        ]
    }

    fn csv_header() -> &'static [&'static str] {
        &[
            "id",
            "key",
            "title",
            "block_type",
            "placement",
            "position",
            "is_active",
            "starts_at",
            "ends_at",
        ]
    }

    fn csv_row(record: &ContentBlock) -> Vec<String> {
        vec![
            record.id.to_string(),
            record.key.clone(),
            record.title.clone(),
            record.block_type.to_string(),
            record.placement.to_string(),
            record.position.to_string(),
            record.is_active.to_string(),
            csv_time(record.starts_at),
            csv_time(record.ends_at),
        ]
    }

    async fn list(pool: &PgPool, query: &ListQuery) -> Result<Paginated<ContentBlock>, RepositoryError> {
        ContentBlockRepository::new(pool).list(query).await
    }

    async fn get(pool: &PgPool, id: ContentBlockId) -> Result<Option<ContentBlock>, RepositoryError> {
        ContentBlockRepository::new(pool).get(id).await
    }

    async fn patch(ctx: Ctx<'_>, id: ContentBlockId, patch: Patch) -> Result<ContentBlock, AppError> {
        let active = patch.activation()?.ok_or_else(empty_patch)?;
        let repo = ContentBlockRepository::new(ctx.pool);
        repo.set_active(id, active).await?;
        found(repo.get(id).await?)
    }

    async fn bulk(ctx: Ctx<'_>, id: ContentBlockId, action: &str) -> Result<(), AppError> {
        let repo = ContentBlockRepository::new(ctx.pool);
        match (action, activation_action(action)) {
            (_, Some(active)) => repo.set_active(id, active).await?,
            ("delete", None) => repo.delete(id).await?,
            (other, None) => return Err(unknown_action(other)),
        }
        Ok(())
    }
}

impl Editable for ContentBlocks {
    type Input = ContentBlockInput;

    fn fields() -> Vec<Field> {
        vec![
            Field::new("title", "Title", FieldKind::Text).required(),
            Field::new("key", "Key", FieldKind::Text).help("Generated from the title when blank"),
            Field::new("body", "Body", FieldKind::Textarea).help("HTML blocks are rendered unescaped"),
            Field::new(
                "block_type",
                "Type",
                FieldKind::select(
                    ContentBlockType::ALL,
                    ContentBlockType::as_str,
                    ContentBlockType::label,
                ),
            )
            .required(),
            Field::new(
                "placement",
                "Placement",
                FieldKind::select(Placement::ALL, Placement::as_str, Placement::label),
            )
            .required(),
            Field::new("position", "Position", FieldKind::Integer),
            Field::new("is_active", "Active", FieldKind::Checkbox),
            Field::new("starts_at", "Show from (UTC)", FieldKind::DateTime),
            Field::new("ends_at", "Show until (UTC)", FieldKind::DateTime),
        ]
    }

    async fn create(ctx: Ctx<'_>, input: ContentBlockInput) -> Result<ContentBlock, AppError> {
        Ok(ContentBlockRepository::new(ctx.pool).create(&input).await?)
    }

    async fn update(
        ctx: Ctx<'_>,
        id: ContentBlockId,
        input: ContentBlockInput,
    ) -> Result<ContentBlock, AppError> {
        Ok(ContentBlockRepository::new(ctx.pool).update(id, &input).await?)
    }

    async fn delete(ctx: Ctx<'_>, id: ContentBlockId) -> Result<(), AppError> {
        Ok(ContentBlockRepository::new(ctx.pool).delete(id).await?)
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

    fn coupon(discount_type: &str, value: &str) -> Coupon {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "code": "SPRING",
            "description": null,
            "discount_type": discount_type,
            "value": value,
            "min_order_amount": "50.00",
            "max_uses": 100,
            "used_count": 7,
            "starts_at": null,
            "expires_at": null,
            "is_active": true,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_coupon_cells() {
        let cells = Coupons::cells(&coupon("percentage", "15.00"), CurrencyCode::USD);
        assert_eq!(cells.len(), Coupons::table().columns.len());
        assert_eq!(cells[1].text, "15%");
        assert_eq!(cells[2].text, "$50.00");
        assert_eq!(cells[3].text, "7 / 100");
        assert_eq!(cells[4].text, "");

        let cells = Coupons::cells(&coupon("fixed_amount", "5"), CurrencyCode::GBP);
        assert_eq!(cells[1].text, "£5.00");
        assert_eq!(Coupons::csv_row(&coupon("fixed_amount", "5")).len(), Coupons::csv_header().len());
    }

    #[test]
    fn test_coupon_form() {
        let json = parse_form(
            &Coupons::fields(),
            &pairs(&[
                ("code", "spring"),
                ("discount_type", "percentage"),
                ("value", "15"),
                ("expires_at", "2026-06-30T23:59"),
                ("is_active", "on"),
            ]),
        )
        .unwrap();
        let input: CouponInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.value, Decimal::new(15, 0));
        assert_eq!(input.discount_type, DiscountType::Percentage);
        assert!(input.expires_at.is_some());
        assert_eq!(input.max_uses, None);
    }

    #[test]
    fn test_deal_form_requires_window() {
        let err = parse_form(
            &Deals::fields(),
            &pairs(&[("title", "Lamp day"), ("product_id", "4"), ("deal_price", "49")]),
        )
        .unwrap_err();
        assert_eq!(err.label, "Starts (UTC)");
    }

    #[test]
    fn test_content_block_form() {
        let json = parse_form(
            &ContentBlocks::fields(),
            &pairs(&[
                ("title", "Summer sale"),
                ("body", "<b>20% off</b>"),
                ("block_type", "html"),
                ("placement", "home"),
            ]),
        )
        .unwrap();
        let input: ContentBlockInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.block_type, ContentBlockType::Html);
        assert_eq!(input.key, None);
        assert_eq!(input.position, 0);
        assert!(!input.is_active);
    }

    #[test]
    fn test_usage_text() {
        assert_eq!(usage_text(3, None), "3");
        assert_eq!(usage_text(3, Some(10)), "3 / 10");
    }
}
