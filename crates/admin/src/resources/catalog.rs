//! Catalog resources: products, brands, categories and attributes.

use sqlx::PgPool;

use emporium_core::api::{ListQuery, Paginated};
use emporium_core::{AttributeId, AttributeKind, BrandId, CategoryId, CurrencyCode, ProductId, ProductStatus};
use emporium_db::{
    Attribute, AttributeInput, AttributeRepository, Brand, BrandInput, BrandRepository, Category,
    CategoryInput, CategoryRepository, Product, ProductInput, ProductRepository, RepositoryError,
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

// =============================================================================
// Products
// =============================================================================

pub struct Products;

const fn product_tone(status: ProductStatus) -> &'static str {
    match status {
        ProductStatus::Active => "success",
        ProductStatus::Draft => "warning",
        ProductStatus::Archived => "muted",
    }
}

impl Resource for Products {
    type Id = ProductId;
    type Record = Product;

    const PATH: &'static str = "products";
    const TITLE: &'static str = "Products";
    const SINGULAR: &'static str = "product";

    fn table() -> DataTableConfig {
        DataTableConfig::new("products")
            .column(TableColumn::new("name", "Name"))
            .column(TableColumn::new("sku", "SKU"))
            .column(TableColumn::new("price", "Price"))
            .column(TableColumn::new("status", "Status"))
            .column(TableColumn::new("featured", "Featured"))
            .column(TableColumn::new("warranty", "Warranty").visible(false))
            .column(TableColumn::new("updated", "Updated").visible(false))
            .filter(TableFilter::status(
                "Status",
                ProductStatus::ALL.iter().map(|s| (s.as_str(), s.label())),
            ))
            .bulk_actions([
                BulkAction::new("activate", "Publish", "ph-eye"),
                BulkAction::new("draft", "Move to draft", "ph-pencil-simple"),
                BulkAction::new("archive", "Archive", "ph-archive"),
                BulkAction::new("feature", "Feature", "ph-star"),
                BulkAction::new("unfeature", "Unfeature", "ph-star-half"),
                BulkAction::delete(),
            ])
            .search_placeholder("Search by name, SKU or slug...")
            .empty_state("ph-package", "No products yet", Some("Create one or use the AI generator."))
    }

    fn id(record: &Product) -> ProductId {
        record.id
    }

    fn label(record: &Product) -> String {
        record.name.clone()
    }

    fn cells(record: &Product, currency: CurrencyCode) -> Vec<Cell> {
        vec![
            Cell::text(&record.name),
            Cell::text(&record.sku),
            Cell::text(money(record.price, currency)),
            Cell::badge(record.status.label(), product_tone(record.status)),
            Cell::flag(record.is_featured),
            Cell::text(format!("{} months", record.warranty_months)),
            Cell::text(short_time(record.updated_at)),
        ]
    }

    fn csv_header() -> &'static [&'static str] {
        &[
            "id",
            "name",
            "slug",
            "sku",
            "price",
            "compare_at_price",
            "status",
            "is_featured",
            "warranty_months",
            "updated_at",
        ]
    }

    fn csv_row(record: &Product) -> Vec<String> {
        vec![
            record.id.to_string(),
            record.name.clone(),
            record.slug.clone(),
            record.sku.clone(),
            record.price.to_string(),
            record.compare_at_price.map(|p| p.to_string()).unwrap_or_default(),
            record.status.to_string(),
            record.is_featured.to_string(),
            record.warranty_months.to_string(),
            csv_time(Some(record.updated_at)),
        ]
    }

    async fn list(pool: &PgPool, query: &ListQuery) -> Result<Paginated<Product>, RepositoryError> {
        ProductRepository::new(pool).list(query).await
    }

    async fn get(pool: &PgPool, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        ProductRepository::new(pool).get(id).await
    }

    async fn patch(ctx: Ctx<'_>, id: ProductId, patch: Patch) -> Result<Product, AppError> {
        let status = patch.status_as::<ProductStatus>()?;
        if status.is_none() && patch.is_featured.is_none() {
            return Err(empty_patch());
        }
        let repo = ProductRepository::new(ctx.pool);
        if let Some(status) = status {
            repo.set_status(id, status).await?;
        }
        if let Some(featured) = patch.is_featured {
            repo.set_featured(id, featured).await?;
        }
        found(repo.get(id).await?)
    }

    async fn bulk(ctx: Ctx<'_>, id: ProductId, action: &str) -> Result<(), AppError> {
        let repo = ProductRepository::new(ctx.pool);
        match action {
            "activate" => repo.set_status(id, ProductStatus::Active).await?,
            "draft" => repo.set_status(id, ProductStatus::Draft).await?,
            "archive" => repo.set_status(id, ProductStatus::Archived).await?,
            "feature" => repo.set_featured(id, true).await?,
            "unfeature" => repo.set_featured(id, false).await?,
            "delete" => repo.delete(id).await?,
            other => return Err(unknown_action(other)),
        }
        Ok(())
    }
}

impl Editable for Products {
    type Input = ProductInput;

    fn fields() -> Vec<Field> {
        vec![
            Field::new("name", "Name", FieldKind::Text).required(),
            Field::new("slug", "Slug", FieldKind::Text).help("Generated from the name when blank"),
            Field::new("sku", "SKU", FieldKind::Text).required(),
            Field::new("description", "Description", FieldKind::Textarea),
            Field::new("price", "Price", FieldKind::Decimal).required(),
            Field::new("compare_at_price", "Compare-at price", FieldKind::Decimal),
            Field::new("brand_id", "Brand ID", FieldKind::Reference),
            Field::new("category_id", "Category ID", FieldKind::Reference),
            Field::new(
                "status",
                "Status",
                FieldKind::select(ProductStatus::ALL, ProductStatus::as_str, ProductStatus::label),
            ),
            Field::new("is_featured", "Featured", FieldKind::Checkbox),
            Field::new("image_url", "Image URL", FieldKind::Url),
            Field::new("warranty_months", "Warranty (months)", FieldKind::Integer),
            Field::new("attributes", "Attributes", FieldKind::Json)
                .help(r#"JSON object, e.g. {"material": "oak"}"#),
        ]
    }

    async fn create(ctx: Ctx<'_>, input: ProductInput) -> Result<Product, AppError> {
        Ok(ProductRepository::new(ctx.pool).create(&input).await?)
    }

    async fn update(ctx: Ctx<'_>, id: ProductId, input: ProductInput) -> Result<Product, AppError> {
        Ok(ProductRepository::new(ctx.pool).update(id, &input).await?)
    }

    async fn delete(ctx: Ctx<'_>, id: ProductId) -> Result<(), AppError> {
        Ok(ProductRepository::new(ctx.pool).delete(id).await?)
    }
}

// =============================================================================
// Brands
// =============================================================================

pub struct Brands;

impl Resource for Brands {
    type Id = BrandId;
    type Record = Brand;

    const PATH: &'static str = "brands";
    const TITLE: &'static str = "Brands";
    const SINGULAR: &'static str = "brand";

    fn table() -> DataTableConfig {
        DataTableConfig::new("brands")
            .column(TableColumn::new("name", "Name"))
            .column(TableColumn::new("slug", "Slug"))
            .column(TableColumn::new("website", "Website").visible(false))
            .column(TableColumn::new("status", "Status"))
            .filter(active_filter())
            .bulk_actions(BulkAction::activation())
            .bulk_action(BulkAction::delete())
            .search_placeholder("Search brands...")
            .empty_state("ph-tag", "No brands yet", None)
    }

    fn id(record: &Brand) -> BrandId {
        record.id
    }

    fn label(record: &Brand) -> String {
        record.name.clone()
    }

    fn cells(record: &Brand, _currency: CurrencyCode) -> Vec<Cell> {
        vec![
            Cell::text(&record.name),
            Cell::text(&record.slug),
            Cell::optional(record.website.as_deref()),
            Cell::active(record.is_active),
        ]
    }

    fn csv_header() -> &'static [&'static str] {
        &["id", "name", "slug", "website", "is_active"]
    }

    fn csv_row(record: &Brand) -> Vec<String> {
        vec![
            record.id.to_string(),
            record.name.clone(),
            record.slug.clone(),
            record.website.clone().unwrap_or_default(),
            record.is_active.to_string(),
        ]
    }

    async fn list(pool: &PgPool, query: &ListQuery) -> Result<Paginated<Brand>, RepositoryError> {
        BrandRepository::new(pool).list(query).await
    }

    async fn get(pool: &PgPool, id: BrandId) -> Result<Option<Brand>, RepositoryError> {
        BrandRepository::new(pool).get(id).await
    }

    async fn patch(ctx: Ctx<'_>, id: BrandId, patch: Patch) -> Result<Brand, AppError> {
        let active = patch.activation()?.ok_or_else(empty_patch)?;
        let repo = BrandRepository::new(ctx.pool);
        repo.set_active(id, active).await?;
        found(repo.get(id).await?)
    }

    async fn bulk(ctx: Ctx<'_>, id: BrandId, action: &str) -> Result<(), AppError> {
        let repo = BrandRepository::new(ctx.pool);
        match (action, activation_action(action)) {
            (_, Some(active)) => repo.set_active(id, active).await?,
            ("delete", None) => repo.delete(id).await?,
            (other, None) => return Err(unknown_action(other)),
        }
        Ok(())
    }
}

impl Editable for Brands {
    type Input = BrandInput;

    fn fields() -> Vec<Field> {
        vec![
            Field::new("name", "Name", FieldKind::Text).required(),
            Field::new("slug", "Slug", FieldKind::Text).help("Generated from the name when blank"),
            Field::new("description", "Description", FieldKind::Textarea),
            Field::new("logo_url", "Logo URL", FieldKind::Url),
            Field::new("website", "Website", FieldKind::Url),
            Field::new("is_active", "Active", FieldKind::Checkbox),
        ]
    }

    async fn create(ctx: Ctx<'_>, input: BrandInput) -> Result<Brand, AppError> {
        Ok(BrandRepository::new(ctx.pool).create(&input).await?)
    }

    async fn update(ctx: Ctx<'_>, id: BrandId, input: BrandInput) -> Result<Brand, AppError> {
        Ok(BrandRepository::new(ctx.pool).update(id, &input).await?)
    }

    async fn delete(ctx: Ctx<'_>, id: BrandId) -> Result<(), AppError> {
        Ok(BrandRepository::new(ctx.pool).delete(id).await?)
    }
}

// =============================================================================
// Categories
// =============================================================================

pub struct Categories;

impl Resource for Categories {
    type Id = CategoryId;
    type Record = Category;

    const PATH: &'static str = "categories";
    const TITLE: &'static str = "Categories";
    const SINGULAR: &'static str = "category";

    fn table() -> DataTableConfig {
        DataTableConfig::new("categories")
            .column(TableColumn::new("name", "Name"))
            .column(TableColumn::new("slug", "Slug"))
            .column(TableColumn::new("parent", "Parent ID").visible(false))
            .column(TableColumn::new("sort_order", "Order"))
            .column(TableColumn::new("status", "Status"))
            .filter(active_filter())
            .bulk_actions(BulkAction::activation())
            .bulk_action(BulkAction::delete())
            .search_placeholder("Search categories...")
            .empty_state("ph-folders", "No categories yet", None)
    }

    fn id(record: &Category) -> CategoryId {
        record.id
    }

    fn label(record: &Category) -> String {
        record.name.clone()
    }

    fn cells(record: &Category, _currency: CurrencyCode) -> Vec<Cell> {
        vec![
            Cell::text(&record.name),
            Cell::text(&record.slug),
            Cell::optional(record.parent_id),
            Cell::text(record.sort_order.to_string()),
            Cell::active(record.is_active),
        ]
    }

    fn csv_header() -> &'static [&'static str] {
        &["id", "name", "slug", "parent_id", "sort_order", "is_active"]
    }

    fn csv_row(record: &Category) -> Vec<String> {
        vec![
            record.id.to_string(),
            record.name.clone(),
            record.slug.clone(),
            record.parent_id.map(|p| p.to_string()).unwrap_or_default(),
            record.sort_order.to_string(),
            record.is_active.to_string(),
        ]
    }

    async fn list(pool: &PgPool, query: &ListQuery) -> Result<Paginated<Category>, RepositoryError> {
        CategoryRepository::new(pool).list(query).await
    }

    async fn get(pool: &PgPool, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        CategoryRepository::new(pool).get(id).await
    }

    async fn patch(ctx: Ctx<'_>, id: CategoryId, patch: Patch) -> Result<Category, AppError> {
        let active = patch.activation()?.ok_or_else(empty_patch)?;
        let repo = CategoryRepository::new(ctx.pool);
        repo.set_active(id, active).await?;
        found(repo.get(id).await?)
    }

    async fn bulk(ctx: Ctx<'_>, id: CategoryId, action: &str) -> Result<(), AppError> {
        let repo = CategoryRepository::new(ctx.pool);
        match (action, activation_action(action)) {
            (_, Some(active)) => repo.set_active(id, active).await?,
            ("delete", None) => repo.delete(id).await?,
            (other, None) => return Err(unknown_action(other)),
        }
        Ok(())
    }
}

impl Editable for Categories {
    type Input = CategoryInput;

    fn fields() -> Vec<Field> {
        vec![
            Field::new("name", "Name", FieldKind::Text).required(),
            Field::new("slug", "Slug", FieldKind::Text).help("Generated from the name when blank"),
            Field::new("description", "Description", FieldKind::Textarea),
            Field::new("parent_id", "Parent category ID", FieldKind::Reference),
            Field::new("sort_order", "Sort order", FieldKind::Integer),
            Field::new("is_active", "Active", FieldKind::Checkbox),
        ]
    }

    async fn create(ctx: Ctx<'_>, input: CategoryInput) -> Result<Category, AppError> {
        Ok(CategoryRepository::new(ctx.pool).create(&input).await?)
    }

    async fn update(ctx: Ctx<'_>, id: CategoryId, input: CategoryInput) -> Result<Category, AppError> {
        if input.parent_id == Some(id) {
            return Err(AppError::BadRequest(
                "A category cannot be its own parent".to_string(),
            ));
        }
        Ok(CategoryRepository::new(ctx.pool).update(id, &input).await?)
    }

    async fn delete(ctx: Ctx<'_>, id: CategoryId) -> Result<(), AppError> {
        Ok(CategoryRepository::new(ctx.pool).delete(id).await?)
    }
}

// =============================================================================
// Attributes
// =============================================================================

pub struct Attributes;

impl Resource for Attributes {
    type Id = AttributeId;
    type Record = Attribute;

    const PATH: &'static str = "attributes";
    const TITLE: &'static str = "Attributes";
    const SINGULAR: &'static str = "attribute";

    fn table() -> DataTableConfig {
        DataTableConfig::new("attributes")
            .column(TableColumn::new("name", "Name"))
            .column(TableColumn::new("slug", "Slug"))
            .column(TableColumn::new("kind", "Type"))
            .column(TableColumn::new("options", "Options"))
            .column(TableColumn::new("filterable", "Filterable"))
            .filter(TableFilter::status(
                "Type",
                AttributeKind::ALL.iter().map(|k| (k.as_str(), k.label())),
            ))
            .bulk_action(BulkAction::delete())
            .search_placeholder("Search attributes...")
            .empty_state("ph-sliders", "No attributes yet", None)
    }

    fn id(record: &Attribute) -> AttributeId {
        record.id
    }

    fn label(record: &Attribute) -> String {
        record.name.clone()
    }

    fn cells(record: &Attribute, _currency: CurrencyCode) -> Vec<Cell> {
        vec![
            Cell::text(&record.name),
            Cell::text(&record.slug),
            Cell::badge(record.kind.label(), "info"),
            Cell::text(record.options.join(", ")),
            Cell::flag(record.is_filterable),
        ]
    }

    fn csv_header() -> &'static [&'static str] {
        &["id", "name", "slug", "kind", "options", "is_filterable"]
    }

    fn csv_row(record: &Attribute) -> Vec<String> {
        vec![
            record.id.to_string(),
            record.name.clone(),
            record.slug.clone(),
            record.kind.to_string(),
            record.options.join("|"),
            record.is_filterable.to_string(),
        ]
    }

    async fn list(pool: &PgPool, query: &ListQuery) -> Result<Paginated<Attribute>, RepositoryError> {
        AttributeRepository::new(pool).list(query).await
    }

    async fn get(pool: &PgPool, id: AttributeId) -> Result<Option<Attribute>, RepositoryError> {
        AttributeRepository::new(pool).get(id).await
    }

    async fn patch(_ctx: Ctx<'_>, _id: AttributeId, _patch: Patch) -> Result<Attribute, AppError> {
        Err(empty_patch())
    }

    async fn bulk(ctx: Ctx<'_>, id: AttributeId, action: &str) -> Result<(), AppError> {
        match action {
            "delete" => Ok(AttributeRepository::new(ctx.pool).delete(id).await?),
            other => Err(unknown_action(other)),
        }
    }
}

impl Editable for Attributes {
    type Input = AttributeInput;

    fn fields() -> Vec<Field> {
        vec![
            Field::new("name", "Name", FieldKind::Text).required(),
            Field::new("slug", "Slug", FieldKind::Text).help("Generated from the name when blank"),
            Field::new(
                "kind",
                "Type",
                FieldKind::select(AttributeKind::ALL, AttributeKind::as_str, AttributeKind::label),
            )
            .required(),
            Field::new("options", "Options", FieldKind::List).help("Comma-separated; select attributes only"),
            Field::new("is_filterable", "Show as storefront filter", FieldKind::Checkbox),
        ]
    }

    async fn create(ctx: Ctx<'_>, input: AttributeInput) -> Result<Attribute, AppError> {
        Ok(AttributeRepository::new(ctx.pool).create(&input).await?)
    }

    async fn update(ctx: Ctx<'_>, id: AttributeId, input: AttributeInput) -> Result<Attribute, AppError> {
        Ok(AttributeRepository::new(ctx.pool).update(id, &input).await?)
    }

    async fn delete(ctx: Ctx<'_>, id: AttributeId) -> Result<(), AppError> {
        Ok(AttributeRepository::new(ctx.pool).delete(id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn assert_table_matches_cells<R: Resource>(record: &R::Record) {
        let table = R::table();
        assert_eq!(table.columns.len(), R::cells(record, CurrencyCode::USD).len());
        assert_eq!(R::csv_header().len(), R::csv_row(record).len());
    }

    fn brand() -> Brand {
        serde_json::from_value(serde_json::json!({
            "id": 3,
            "name": "Acme",
            "slug": "acme",
            "description": null,
            "logo_url": null,
            "website": "https://acme.example",
            "is_active": false,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-02T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_brand_row() {
        let brand = brand();
        assert_table_matches_cells::<Brands>(&brand);
        assert_eq!(Brands::cells(&brand, CurrencyCode::USD)[3], Cell::active(false));
        assert_eq!(Brands::href(brand.id), "/admin/brands/3/edit");
    }

    #[test]
    fn test_product_row_and_form() {
        let product: Product = serde_json::from_value(serde_json::json!({
            "id": 9,
            "name": "Oak Lamp",
            "slug": "oak-lamp",
            "sku": "LAMP-1",
            "description": "",
            "price": "79.50",
            "compare_at_price": null,
            "brand_id": null,
            "category_id": null,
            "status": "draft",
            "is_featured": true,
            "image_url": null,
            "warranty_months": 24,
            "attributes": {"material": "oak"},
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-02T00:00:00Z"
        }))
        .unwrap();
        assert_table_matches_cells::<Products>(&product);

        let cells = Products::cells(&product, CurrencyCode::USD);
        assert_eq!(cells[2].text, "$79.50");
        assert_eq!(cells[3], Cell::badge("Draft", "warning"));

        let pairs = vec![
            ("name".to_string(), "Oak Lamp".to_string()),
            ("sku".to_string(), "LAMP-1".to_string()),
            ("price".to_string(), "79.50".to_string()),
            ("status".to_string(), "active".to_string()),
            ("attributes".to_string(), r#"{"material": "oak"}"#.to_string()),
        ];
        let json = super::super::fields::parse_form(&Products::fields(), &pairs).unwrap();
        let input: ProductInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.status, ProductStatus::Active);
        assert_eq!(input.price, rust_decimal::Decimal::new(7950, 2));
        assert!(!input.is_featured);
        assert_eq!(input.attributes["material"], "oak");
    }

    #[test]
    fn test_attribute_form_builds_input() {
        let pairs = vec![
            ("name".to_string(), "Color".to_string()),
            ("kind".to_string(), "select".to_string()),
            ("options".to_string(), "Red, Blue".to_string()),
            ("is_filterable".to_string(), "on".to_string()),
        ];
        let json = super::super::fields::parse_form(&Attributes::fields(), &pairs).unwrap();
        let input: AttributeInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.kind, AttributeKind::Select);
        assert_eq!(input.options, vec!["Red", "Blue"]);
        assert!(input.is_filterable);
        assert_eq!(input.slug, None);
    }

    #[test]
    fn test_brand_form_unchecked_active_is_false() {
        let pairs = vec![("name".to_string(), "Acme".to_string())];
        let json = super::super::fields::parse_form(&Brands::fields(), &pairs).unwrap();
        let input: BrandInput = serde_json::from_value(json).unwrap();
        assert!(!input.is_active);
    }
}
