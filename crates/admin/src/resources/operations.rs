//! Operations resources: inventory and shipping methods.

use sqlx::PgPool;

use emporium_core::api::{ListQuery, Paginated};
use emporium_core::{CurrencyCode, InventoryItemId, ShippingMethodId, StockStatus};
use emporium_db::{
    InventoryInput, InventoryItem, InventoryRepository, RepositoryError, ShippingMethod,
    ShippingMethodInput, ShippingMethodRepository,
};

use crate::components::{BulkAction, DataTableConfig, FilterOption, TableColumn, TableFilter};
use crate::error::AppError;

use super::{
    Cell, Ctx, Editable, Field, FieldKind, Patch, Resource, activation_action, empty_patch, found,
    money, unknown_action,
};

// =============================================================================
// Inventory
// =============================================================================

pub struct Inventory;

const fn stock_tone(status: StockStatus) -> &'static str {
    match status {
        StockStatus::InStock => "success",
        StockStatus::LowStock => "warning",
        StockStatus::OutOfStock => "danger",
    }
}

impl Resource for Inventory {
    type Id = InventoryItemId;
    type Record = InventoryItem;

    const PATH: &'static str = "inventory";
    const TITLE: &'static str = "Inventory";
    const SINGULAR: &'static str = "inventory item";

    fn table() -> DataTableConfig {
        DataTableConfig::new("inventory")
            .column(TableColumn::new("product", "Product"))
            .column(TableColumn::new("sku", "SKU"))
            .column(TableColumn::new("location", "Location"))
            .column(TableColumn::new("quantity", "On hand"))
            .column(TableColumn::new("reserved", "Reserved").visible(false))
            .column(TableColumn::new("available", "Available"))
            .column(TableColumn::new("reorder_level", "Reorder at").visible(false))
            .column(TableColumn::new("stock", "Stock"))
            .filter(TableFilter::select(
                "status",
                "Stock",
                vec![FilterOption::new("low", "Low or out of stock")],
            ))
            .bulk_action(BulkAction::delete())
            .search_placeholder("Search by product, SKU or location...")
            .empty_state("ph-warehouse", "No inventory rows", Some("Products without stock rows are out of stock."))
    }

    fn id(record: &InventoryItem) -> InventoryItemId {
        record.id
    }

    fn label(record: &InventoryItem) -> String {
        format!("{} @ {}", record.product_name, record.location)
    }

    fn cells(record: &InventoryItem, _currency: CurrencyCode) -> Vec<Cell> {
        let stock = record.stock_status();
        vec![
            Cell::text(&record.product_name),
            Cell::text(&record.product_sku),
            Cell::text(&record.location),
            Cell::text(record.quantity.to_string()),
            Cell::text(record.reserved.to_string()),
            Cell::text(record.available().to_string()),
            Cell::text(record.reorder_level.to_string()),
            Cell::badge(stock.label(), stock_tone(stock)),
        ]
    }

    fn csv_header() -> &'static [&'static str] {
        &[
            "id",
            "product_id",
            "product_name",
            "sku",
            "location",
            "quantity",
            "reserved",
            "available",
            "reorder_level",
        ]
    }

    fn csv_row(record: &InventoryItem) -> Vec<String> {
        vec![
            record.id.to_string(),
            record.product_id.to_string(),
            record.product_name.clone(),
            record.product_sku.clone(),
            record.location.clone(),
            record.quantity.to_string(),
            record.reserved.to_string(),
            record.available().to_string(),
            record.reorder_level.to_string(),
        ]
    }

    async fn list(pool: &PgPool, query: &ListQuery) -> Result<Paginated<InventoryItem>, RepositoryError> {
        InventoryRepository::new(pool).list(query).await
    }

    async fn get(pool: &PgPool, id: InventoryItemId) -> Result<Option<InventoryItem>, RepositoryError> {
        InventoryRepository::new(pool).get(id).await
    }

    async fn patch(ctx: Ctx<'_>, id: InventoryItemId, patch: Patch) -> Result<InventoryItem, AppError> {
        let delta = patch.adjust.ok_or_else(empty_patch)?;
        let item = InventoryRepository::new(ctx.pool).adjust(id, delta).await?;
        tracing::info!(
            inventory_item_id = %id,
            delta,
            quantity = item.quantity,
            user_id = %ctx.admin.id,
            "Stock adjusted"
        );
        Ok(item)
    }

    async fn bulk(ctx: Ctx<'_>, id: InventoryItemId, action: &str) -> Result<(), AppError> {
        match action {
            "delete" => Ok(InventoryRepository::new(ctx.pool).delete(id).await?),
            other => Err(unknown_action(other)),
        }
    }
}

impl Editable for Inventory {
    type Input = InventoryInput;

    fn fields() -> Vec<Field> {
        vec![
            Field::new("product_id", "Product ID", FieldKind::Reference).required(),
            Field::new("location", "Location", FieldKind::Text).help("Defaults to main"),
            Field::new("quantity", "On hand", FieldKind::Integer).required(),
            Field::new("reorder_level", "Reorder level", FieldKind::Integer),
        ]
    }

    async fn create(ctx: Ctx<'_>, input: InventoryInput) -> Result<InventoryItem, AppError> {
        Ok(InventoryRepository::new(ctx.pool).create(&input).await?)
    }

    async fn update(
        ctx: Ctx<'_>,
        id: InventoryItemId,
        input: InventoryInput,
    ) -> Result<InventoryItem, AppError> {
        Ok(InventoryRepository::new(ctx.pool).update(id, &input).await?)
    }

    async fn delete(ctx: Ctx<'_>, id: InventoryItemId) -> Result<(), AppError> {
        Ok(InventoryRepository::new(ctx.pool).delete(id).await?)
    }
}

// =============================================================================
// Shipping methods
// =============================================================================

pub struct ShippingMethods;

impl Resource for ShippingMethods {
    type Id = ShippingMethodId;
    type Record = ShippingMethod;

    const PATH: &'static str = "shipping-methods";
    const TITLE: &'static str = "Shipping methods";
    const SINGULAR: &'static str = "shipping method";

    fn table() -> DataTableConfig {
        let [activate, deactivate] = BulkAction::activation();
        DataTableConfig::new("shipping-methods")
            .column(TableColumn::new("name", "Name"))
            .column(TableColumn::new("carrier", "Carrier"))
            .column(TableColumn::new("rate", "Rate"))
            .column(TableColumn::new("free_over", "Free over"))
            .column(TableColumn::new("delivery", "Delivery"))
            .column(TableColumn::new("sort_order", "Order").visible(false))
            .column(TableColumn::new("status", "Status"))
            .filter(TableFilter::status(
                "Status",
                [("active", "Active"), ("inactive", "Inactive")],
            ))
            .bulk_actions([activate, deactivate, BulkAction::delete()])
            .search_placeholder("Search by name or carrier...")
            .empty_state("ph-truck", "No shipping methods", Some("Checkout needs at least one active method."))
    }

    fn id(record: &ShippingMethod) -> ShippingMethodId {
        record.id
    }

    fn label(record: &ShippingMethod) -> String {
        record.name.clone()
    }

    fn cells(record: &ShippingMethod, currency: CurrencyCode) -> Vec<Cell> {
        vec![
            Cell::text(&record.name),
            Cell::optional(record.carrier.as_deref()),
            Cell::text(money(record.base_rate, currency)),
            Cell::optional(record.free_shipping_threshold.map(|t| money(t, currency))),
            Cell::text(record.delivery_estimate()),
            Cell::text(record.sort_order.to_string()),
            Cell::active(record.is_active),
        ]
    }

    fn csv_header() -> &'static [&'static str] {
        &[
            "id",
            "name",
            "carrier",
            "base_rate",
            "free_shipping_threshold",
            "min_days",
            "max_days",
            "sort_order",
            "is_active",
        ]
    }

    fn csv_row(record: &ShippingMethod) -> Vec<String> {
        vec![
            record.id.to_string(),
            record.name.clone(),
            record.carrier.clone().unwrap_or_default(),
            record.base_rate.to_string(),
            record
                .free_shipping_threshold
                .map(|t| t.to_string())
                .unwrap_or_default(),
            record.min_days.to_string(),
            record.max_days.to_string(),
            record.sort_order.to_string(),
            record.is_active.to_string(),
        ]
    }

    async fn list(pool: &PgPool, query: &ListQuery) -> Result<Paginated<ShippingMethod>, RepositoryError> {
        ShippingMethodRepository::new(pool).list(query).await
    }

    async fn get(pool: &PgPool, id: ShippingMethodId) -> Result<Option<ShippingMethod>, RepositoryError> {
        ShippingMethodRepository::new(pool).get(id).await
    }

    async fn patch(ctx: Ctx<'_>, id: ShippingMethodId, patch: Patch) -> Result<ShippingMethod, AppError> {
        let active = patch.activation()?.ok_or_else(empty_patch)?;
        let repo = ShippingMethodRepository::new(ctx.pool);
        repo.set_active(id, active).await?;
        found(repo.get(id).await?)
    }

    async fn bulk(ctx: Ctx<'_>, id: ShippingMethodId, action: &str) -> Result<(), AppError> {
        let repo = ShippingMethodRepository::new(ctx.pool);
        match (action, activation_action(action)) {
            (_, Some(active)) => repo.set_active(id, active).await?,
            ("delete", None) => repo.delete(id).await?,
            (other, None) => return Err(unknown_action(other)),
        }
        Ok(())
    }
}

impl Editable for ShippingMethods {
    type Input = ShippingMethodInput;

    fn fields() -> Vec<Field> {
        vec![
            Field::new("name", "Name", FieldKind::Text).required(),
            Field::new("description", "Description", FieldKind::Textarea),
            Field::new("carrier", "Carrier", FieldKind::Text),
            Field::new("base_rate", "Rate", FieldKind::Decimal).required(),
            Field::new("free_shipping_threshold", "Free shipping over", FieldKind::Decimal)
                .help("Compared with the subtotal after discounts"),
            Field::new("min_days", "Minimum days", FieldKind::Integer).required(),
            Field::new("max_days", "Maximum days", FieldKind::Integer).required(),
            Field::new("sort_order", "Sort order", FieldKind::Integer),
            Field::new("is_active", "Active", FieldKind::Checkbox),
        ]
    }

    async fn create(ctx: Ctx<'_>, input: ShippingMethodInput) -> Result<ShippingMethod, AppError> {
        Ok(ShippingMethodRepository::new(ctx.pool).create(&input).await?)
    }

    async fn update(
        ctx: Ctx<'_>,
        id: ShippingMethodId,
        input: ShippingMethodInput,
    ) -> Result<ShippingMethod, AppError> {
        Ok(ShippingMethodRepository::new(ctx.pool).update(id, &input).await?)
    }

    async fn delete(ctx: Ctx<'_>, id: ShippingMethodId) -> Result<(), AppError> {
        Ok(ShippingMethodRepository::new(ctx.pool).delete(id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::fields::parse_form;
    use super::*;

    fn item(quantity: i32, reserved: i32, reorder_level: i32) -> InventoryItem {
        serde_json::from_value(serde_json::json!({
            "id": 5,
            "product_id": 2,
            "product_name": "Oak Lamp",
            "product_sku": "LAMP-1",
            "location": "main",
            "quantity": quantity,
            "reserved": reserved,
            "reorder_level": reorder_level,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_inventory_cells_show_availability() {
        let cells = Inventory::cells(&item(10, 8, 3), CurrencyCode::USD);
        assert_eq!(cells.len(), Inventory::table().columns.len());
        assert_eq!(cells[5].text, "2");
        assert_eq!(cells[7], Cell::badge("Low stock", "warning"));

        let cells = Inventory::cells(&item(4, 4, 0), CurrencyCode::USD);
        assert_eq!(cells[7].tone, Some("danger"));
        assert_eq!(Inventory::label(&item(1, 0, 0)), "Oak Lamp @ main");
    }

    #[test]
    fn test_inventory_form_defaults_location() {
        let pairs = vec![
            ("product_id".to_string(), "2".to_string()),
            ("quantity".to_string(), "12".to_string()),
        ];
        let json = parse_form(&Inventory::fields(), &pairs).unwrap();
        let input: InventoryInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.location, "main");
        assert_eq!(input.quantity, 12);
        assert_eq!(input.reorder_level, 0);
    }

    #[test]
    fn test_shipping_form() {
        let pairs = vec![
            ("name".to_string(), "Express".to_string()),
            ("base_rate".to_string(), "12.5".to_string()),
            ("min_days".to_string(), "1".to_string()),
            ("max_days".to_string(), "2".to_string()),
            ("is_active".to_string(), "on".to_string()),
        ];
        let json = parse_form(&ShippingMethods::fields(), &pairs).unwrap();
        let input: ShippingMethodInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.base_rate, rust_decimal::Decimal::new(125, 1));
        assert_eq!(input.free_shipping_threshold, None);
        assert!(input.is_active);
    }
}
