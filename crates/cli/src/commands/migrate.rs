//! Database migration command.
//!
//! Applies the embedded migrations in `crates/db/migrations/` to the `shop`
//! schema. Already-applied migrations are skipped.

use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run all pending migrations.
///
/// # Errors
///
/// Returns `MigrateError::Migration` if a migration fails or the applied
/// history no longer matches the embedded files.
pub async fn run(pool: &PgPool) -> Result<(), MigrateError> {
    tracing::info!(
        available = emporium_db::MIGRATOR.iter().count(),
        "Running migrations..."
    );
    emporium_db::MIGRATOR.run(pool).await?;
    tracing::info!("Migrations complete!");
    Ok(())
}
