//! Database migration command.
//!
//! ```bash
//! amy-cli migrate
//! ```
//!
//! Applies `crates/storefront/migrations/`, which are embedded at build time.
//! The server never migrates on startup.

use super::{CommandError, connect};

/// Run storefront database migrations.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
