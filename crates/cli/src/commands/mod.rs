//! Subcommand implementations.

pub mod migrate;
pub mod seed;
pub mod user;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use amyfairy_storefront::db::{self, RepositoryError};

/// Errors shared by every command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid catalog file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Invalid(String),
}

/// Connect to the storefront database from `STOREFRONT_DATABASE_URL`
/// (falling back to `DATABASE_URL`).
pub async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("STOREFRONT_DATABASE_URL"))?;

    tracing::info!("Connecting to storefront database...");
    Ok(db::create_pool(&database_url).await?)
}
