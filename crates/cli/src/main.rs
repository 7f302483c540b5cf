//! AmyFairy CLI - database migrations and store management.
//!
//! # Usage
//!
//! ```bash
//! # Apply storefront migrations
//! amy-cli migrate
//!
//! # Load products from YAML
//! amy-cli seed catalog --file products.yaml
//!
//! # Grant the admin role
//! amy-cli user promote --email owner@example.com
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "amy-cli")]
#[command(author, version, about = "AmyFairy storefront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Load catalog products from a YAML file
    Catalog {
        /// Path to the YAML catalog
        #[arg(short, long)]
        file: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Grant the administrator role
    Promote {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file } => {
                commands::seed::catalog(&file).await?;
            }
        },
        Commands::User { action } => match action {
            UserAction::Promote { email } => commands::user::promote(&email).await?,
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
    fn test_parse_seed_catalog() {
        let cli = Cli::try_parse_from(["amy-cli", "seed", "catalog", "--file", "p.yaml"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Seed {
                target: SeedTarget::Catalog { ref file }
            } if file == "p.yaml"
        ));
    }
}
