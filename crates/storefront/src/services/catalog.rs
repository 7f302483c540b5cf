//! Catalog reader and administrator catalog edits.

use thiserror::Error;
use tracing::instrument;

use amyfairy_core::ProductId;

use crate::db::{RepositoryError, Store};
use crate::models::{CurrentUser, Page, Product, ProductDraft, ProductPatch, ProductQuery};

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Product does not exist or is hidden.
    #[error("product not found")]
    NotFound,

    /// Catalog field validation failed.
    #[error("{0}")]
    Invalid(String),

    /// Caller is not an administrator.
    #[error("administrator access required")]
    Forbidden,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Catalog service.
pub struct CatalogService<'a> {
    store: &'a dyn Store,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Customer listing. Soft-deleted products are never included.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, CatalogError> {
        let query = ProductQuery {
            include_deleted: false,
            ..query.clone()
        };
        Ok(self.store.list_products(&query).await?)
    }

    /// Administrator listing, which may include soft-deleted products.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Forbidden` for non-administrators.
    pub async fn list_products_admin(
        &self,
        admin: &CurrentUser,
        query: &ProductQuery,
    ) -> Result<Page<Product>, CatalogError> {
        require_admin(admin)?;
        Ok(self.store.list_products(query).await?)
    }

    /// A visible product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for unknown or soft-deleted products.
    pub async fn get_product(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.store
            .get_product(id)
            .await?
            .filter(|p| !p.deleted)
            .ok_or(CatalogError::NotFound)
    }

    /// Distinct brands.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn brands(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.store.brands().await?)
    }

    /// Distinct categories.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn categories(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.store.categories().await?)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Forbidden` for non-administrators and
    /// `CatalogError::Invalid` for out-of-range fields.
    #[instrument(skip(self, draft), fields(admin_id = %admin.id, title = %draft.title))]
    pub async fn create_product(
        &self,
        admin: &CurrentUser,
        draft: &ProductDraft,
    ) -> Result<Product, CatalogError> {
        require_admin(admin)?;
        draft.validate().map_err(CatalogError::Invalid)?;
        let product = self.store.create_product(draft).await?;
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// Update a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Forbidden`, `CatalogError::Invalid`, or
    /// `CatalogError::NotFound` for unknown ids.
    #[instrument(skip(self, patch), fields(admin_id = %admin.id))]
    pub async fn update_product(
        &self,
        admin: &CurrentUser,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Product, CatalogError> {
        require_admin(admin)?;
        patch.validate().map_err(CatalogError::Invalid)?;
        self.store
            .update_product(id, patch)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CatalogError::NotFound,
                other => CatalogError::Repository(other),
            })
    }

    /// Soft-delete a product. Deleting twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Forbidden`, or `CatalogError::NotFound` for
    /// unknown ids.
    #[instrument(skip(self), fields(admin_id = %admin.id))]
    pub async fn delete_product(
        &self,
        admin: &CurrentUser,
        id: ProductId,
    ) -> Result<(), CatalogError> {
        require_admin(admin)?;
        if !self.store.soft_delete_product(id).await? {
            return Err(CatalogError::NotFound);
        }
        tracing::info!(product_id = %id, "product soft-deleted");
        Ok(())
    }
}

const fn require_admin(user: &CurrentUser) -> Result<(), CatalogError> {
    match user.role {
        amyfairy_core::UserRole::Admin => Ok(()),
        amyfairy_core::UserRole::User => Err(CatalogError::Forbidden),
    }
}
