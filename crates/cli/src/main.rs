//! Emporium CLI - database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! emporium migrate
//!
//! # Load catalog data from YAML
//! emporium seed data/catalog.yaml
//!
//! # Create a back-office user (password from EMPORIUM_PASSWORD if omitted)
//! emporium user create -e ops@example.com -n "Ops Lead" -r admin
//! ```
//!
//! Every command reads `DATABASE_URL` (a `.env` file is honored).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use emporium_core::UserRole;

mod commands;

#[derive(Parser)]
#[command(name = "emporium")]
#[command(author, version, about = "Emporium operator tools")]
struct Cli {
    /// `PostgreSQL` connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Upsert brands, categories, shipping methods and products from YAML
    Seed {
        /// Path to the seed file
        file: PathBuf,
    },
    /// Manage back-office users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a back-office user
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Role (`customer`, `staff`, `admin`)
        #[arg(short, long, default_value = "admin")]
        role: UserRole,

        /// Password
        #[arg(long, env = "EMPORIUM_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

/// Failures reported by any command.
#[derive(Debug, Error)]
enum CliError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] commands::migrate::MigrateError),
    #[error(transparent)]
    Seed(#[from] commands::seed::SeedError),
    #[error(transparent)]
    User(#[from] commands::user::UserError),
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "emporium=info,emporium_cli=info,emporium_db=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn connect(database_url: Option<String>) -> Result<PgPool, CliError> {
    let url = database_url.ok_or(CliError::MissingDatabaseUrl)?;
    tracing::info!("Connecting to database...");
    Ok(emporium_db::create_pool(&SecretString::from(url)).await?)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let pool = connect(cli.database_url).await?;
    match cli.command {
        Commands::Migrate => commands::migrate::run(&pool).await?,
        Commands::Seed { file } => {
            commands::seed::run(&pool, &file).await?;
        }
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                name,
                role,
                password,
            } => {
                commands::user::create(&pool, email, name, role, password).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_user_create() {
        let cli = Cli::try_parse_from([
            "emporium",
            "--database-url",
            "postgres://localhost/emporium",
            "user",
            "create",
            "-e",
            "ops@example.org",
            "-n",
            "Ops Lead",
            "-r",
            "staff",
            "--password",
            "correct-horse-battery",
        ])
        .unwrap();
        let Commands::User {
            action:
                UserAction::Create {
                    email,
                    role,
                    password,
                    ..
                },
        } = cli.command
        else {
            panic!("expected user create");
        };
        assert_eq!(email, "ops@example.org");
        assert_eq!(role, UserRole::Staff);
        assert_eq!(password.as_deref(), Some("correct-horse-battery"));
    }

    #[test]
    fn test_parse_rejects_unknown_role() {
        let result = Cli::try_parse_from([
            "emporium", "user", "create", "-e", "a@b.org", "-n", "A", "-r", "owner",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_seed() {
        let cli = Cli::try_parse_from(["emporium", "seed", "catalog.yaml"]).unwrap();
        assert!(matches!(cli.command, Commands::Seed { file } if file == PathBuf::from("catalog.yaml")));
    }
}
