//! Customer and back-office accounts.

use sqlx::PgPool;

use emporium_core::api::{ListQuery, Paginated};
use emporium_core::{CurrencyCode, UserId, UserRole};
use emporium_db::{RepositoryError, User, UserInput, UserRepository};

use crate::components::{BulkAction, DataTableConfig, TableColumn, TableFilter};
use crate::error::AppError;
use crate::services::AdminAuthService;

use super::{
    Cell, Ctx, Editable, Field, FieldKind, Patch, Resource, activation_action, csv_time,
    empty_patch, short_time, unknown_action,
};

pub struct Users;

const fn role_tone(role: UserRole) -> &'static str {
    match role {
        UserRole::Admin => "primary",
        UserRole::Staff => "info",
        UserRole::Customer => "muted",
    }
}

/// Refuse changes that would lock the acting admin out.
fn guard_self(ctx: Ctx<'_>, id: UserId, keeps_access: bool) -> Result<(), AppError> {
    if ctx.admin.id == id && !keeps_access {
        return Err(AppError::BadRequest(
            "You cannot remove your own admin access".to_string(),
        ));
    }
    Ok(())
}

impl Resource for Users {
    type Id = UserId;
    type Record = User;

    const PATH: &'static str = "users";
    const TITLE: &'static str = "Users";
    const SINGULAR: &'static str = "user";

    fn table() -> DataTableConfig {
        DataTableConfig::new("users")
            .column(TableColumn::new("email", "Email"))
            .column(TableColumn::new("name", "Name"))
            .column(TableColumn::new("role", "Role"))
            .column(TableColumn::new("password", "Password set").visible(false))
            .column(TableColumn::new("active", "Status"))
            .column(TableColumn::new("created", "Joined"))
            .filter(TableFilter::status(
                "Role",
                UserRole::ALL.iter().map(|r| (r.as_str(), r.label())),
            ))
            .bulk_actions(BulkAction::activation())
            .bulk_action(BulkAction::delete())
            .search_placeholder("Search by email or name...")
            .empty_state("ph-users", "No users", None)
    }

    fn id(record: &User) -> UserId {
        record.id
    }

    fn label(record: &User) -> String {
        record.email.to_string()
    }

    fn cells(record: &User, _currency: CurrencyCode) -> Vec<Cell> {
        vec![
            Cell::text(record.email.as_str()),
            Cell::text(&record.name),
            Cell::badge(record.role.label(), role_tone(record.role)),
            Cell::flag(record.has_password),
            Cell::active(record.is_active),
            Cell::text(short_time(record.created_at)),
        ]
    }

    fn csv_header() -> &'static [&'static str] {
        &["id", "email", "name", "role", "is_active", "created_at"]
    }

    fn csv_row(record: &User) -> Vec<String> {
        vec![
            record.id.to_string(),
            record.email.to_string(),
            record.name.clone(),
            record.role.to_string(),
            record.is_active.to_string(),
            csv_time(Some(record.created_at)),
        ]
    }

    async fn list(pool: &PgPool, query: &ListQuery) -> Result<Paginated<User>, RepositoryError> {
        UserRepository::new(pool).list(query).await
    }

    async fn get(pool: &PgPool, id: UserId) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(pool).get(id).await
    }

    async fn patch(ctx: Ctx<'_>, id: UserId, patch: Patch) -> Result<User, AppError> {
        let Some(active) = patch.activation()? else {
            return Err(empty_patch());
        };
        guard_self(ctx, id, active)?;
        let repo = UserRepository::new(ctx.pool);
        repo.set_active(id, active).await?;
        super::found(repo.get(id).await?)
    }

    async fn bulk(ctx: Ctx<'_>, id: UserId, action: &str) -> Result<(), AppError> {
        let repo = UserRepository::new(ctx.pool);
        if let Some(active) = activation_action(action) {
            guard_self(ctx, id, active)?;
            return Ok(repo.set_active(id, active).await?);
        }
        match action {
            "delete" => {
                guard_self(ctx, id, false)?;
                Ok(repo.delete(id).await?)
            }
            other => Err(unknown_action(other)),
        }
    }
}

impl Editable for Users {
    type Input = UserInput;

    fn fields() -> Vec<Field> {
        vec![
            Field::new("email", "Email", FieldKind::Email).required(),
            Field::new("name", "Name", FieldKind::Text).required(),
            Field::new(
                "role",
                "Role",
                FieldKind::select(UserRole::ALL, UserRole::as_str, UserRole::label),
            )
            .required()
            .help("Staff can view the back-office; admins can also change it"),
            Field::new("is_active", "Active", FieldKind::Checkbox),
            Field::new("password", "Password", FieldKind::Password)
                .help("Required for staff and admins; leave blank to keep the current password"),
        ]
    }

    async fn create(ctx: Ctx<'_>, input: UserInput) -> Result<User, AppError> {
        let user = AdminAuthService::new(ctx.pool).create_user(&input).await?;
        tracing::info!(user_id = %user.id, role = %user.role, created_by = %ctx.admin.id, "User created");
        Ok(user)
    }

    async fn update(ctx: Ctx<'_>, id: UserId, input: UserInput) -> Result<User, AppError> {
        guard_self(ctx, id, input.is_active && input.role.can_write())?;
        Ok(AdminAuthService::new(ctx.pool).update_user(id, &input).await?)
    }

    async fn delete(ctx: Ctx<'_>, id: UserId) -> Result<(), AppError> {
        guard_self(ctx, id, false)?;
        UserRepository::new(ctx.pool).delete(id).await?;
        tracing::info!(user_id = %id, deleted_by = %ctx.admin.id, "User deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emporium_core::Email;

    use super::super::fields::parse_form;
    use super::*;
    use crate::models::CurrentAdmin;

    fn admin() -> CurrentAdmin {
        CurrentAdmin {
            id: UserId::new(1),
            email: Email::parse("owner@example.org").unwrap(),
            name: "Owner".to_string(),
            role: UserRole::Admin,
        }
    }

    #[tokio::test]
    async fn test_guard_self() {
        let pool = PgPool::connect_lazy("postgres://localhost/emporium_test").unwrap();
        let admin = admin();
        let ctx = Ctx::new(&pool, &admin);

        assert!(guard_self(ctx, UserId::new(1), false).is_err());
        assert!(guard_self(ctx, UserId::new(1), true).is_ok());
        assert!(guard_self(ctx, UserId::new(2), false).is_ok());
    }

    #[test]
    fn test_user_form_keeps_password_optional() {
        let pairs = vec![
            ("email".to_string(), "staff@example.org".to_string()),
            ("name".to_string(), "Sam".to_string()),
            ("role".to_string(), "staff".to_string()),
            ("password".to_string(), String::new()),
        ];
        let json = parse_form(&Users::fields(), &pairs).unwrap();
        let input: UserInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.role, UserRole::Staff);
        assert!(!input.is_active);
        assert_eq!(input.password(), None);
    }

    #[test]
    fn test_user_table() {
        let table = Users::table();
        assert!(table.offers_action("deactivate"));
        assert!(table.offers_action("delete"));
        assert_eq!(table.filters.len(), 1);
    }
}
