//! Seed the catalog from a YAML file.
//!
//! ```bash
//! amy-cli seed catalog --file products.yaml
//! ```
//!
//! ```yaml
//! products:
//!   - title: Linen Wrap Dress
//!     description: Breathable summer dress
//!     price: "2499.00"
//!     discount_percentage: "10"
//!     rating: "4.5"
//!     stock: 12
//!     brand: AmyFairy
//!     category: dresses
//!     colors: [sand, olive]
//!     sizes: [S, M, L]
//! ```
//!
//! Products whose (title, brand) already exist are skipped, so the command
//! can be re-run safely.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use amyfairy_storefront::db::{PgStore, ProductRepository};
use amyfairy_storefront::models::ProductDraft;

use super::{CommandError, connect};

/// Top-level shape of a catalog file.
#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub products: Vec<ProductDraft>,
}

/// Outcome of a seeding run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Parse a catalog and validate every product before touching the database.
pub fn parse_catalog(content: &str) -> Result<CatalogFile, CommandError> {
    let catalog: CatalogFile = serde_yaml::from_str(content)?;

    let errors: Vec<String> = catalog
        .products
        .iter()
        .enumerate()
        .filter_map(|(i, draft)| {
            draft
                .validate()
                .err()
                .map(|e| format!("product #{} ({}): {e}", i + 1, draft.title))
        })
        .collect();

    if !errors.is_empty() {
        for err in &errors {
            error!("  - {err}");
        }
        return Err(CommandError::Invalid(format!(
            "{} invalid product(s) in catalog",
            errors.len()
        )));
    }

    Ok(catalog)
}

/// Seed products from `file_path`.
pub async fn catalog(file_path: &str) -> Result<SeedSummary, CommandError> {
    let path = Path::new(file_path);
    info!(path = %file_path, "Loading catalog from file");

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Io {
            path: file_path.to_owned(),
            source,
        })?;
    let catalog = parse_catalog(&content)?;
    info!(products = catalog.products.len(), "Catalog validated");

    let pool = connect().await?;
    let store = PgStore::new(pool.clone());
    let mut summary = SeedSummary::default();

    for draft in &catalog.products {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM products WHERE title = $1 AND brand = $2)",
        )
        .bind(&draft.title)
        .bind(&draft.brand)
        .fetch_one(&pool)
        .await?;

        if exists {
            summary.skipped += 1;
            continue;
        }

        let product = store.create_product(draft).await?;
        info!(id = %product.id, title = %product.title, "Inserted product");
        summary.inserted += 1;
    }

    info!(
        inserted = summary.inserted,
        skipped = summary.skipped,
        "Seeding complete!"
    );
    Ok(summary)
}
