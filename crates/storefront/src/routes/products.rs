//! Catalog route handlers.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue},
    routing::get,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use amyfairy_core::ProductId;

use crate::error::Result;
use crate::models::page::normalize_paging;
use crate::models::product::split_csv;
use crate::models::{Page, Product, ProductQuery, ProductSort, SortOrder};
use crate::routes::{ApiPath, ApiQuery};
use crate::state::AppState;

/// Total matching rows, sent alongside every paged listing.
pub const TOTAL_COUNT_HEADER: HeaderName = HeaderName::from_static("x-total-count");

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(index))
        .route("/products/{id}", get(show))
        .route("/brands", get(brands))
        .route("/categories", get(categories))
}

/// Listing query string.
///
/// `category` and `brand` take comma-separated sets.
#[derive(Debug, Default, Deserialize)]
pub struct ProductParams {
    pub category: Option<String>,
    pub brand: Option<String>,
    #[serde(alias = "q")]
    pub search: Option<String>,
    pub in_stock: Option<bool>,
    pub sort: Option<ProductSort>,
    pub order: Option<SortOrder>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Honored on the admin listing only.
    pub include_deleted: Option<bool>,
}

impl ProductParams {
    /// Normalize into a store query.
    #[must_use]
    pub fn into_query(self) -> ProductQuery {
        let (page, per_page) = normalize_paging(self.page, self.per_page);
        ProductQuery {
            categories: split_csv(self.category.as_deref()),
            brands: split_csv(self.brand.as_deref()),
            search: self
                .search
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty()),
            in_stock_only: self.in_stock.unwrap_or(false),
            include_deleted: false,
            sort: self.sort.unwrap_or_default(),
            order: self.order.unwrap_or_default(),
            page,
            per_page,
        }
    }
}

/// Product as returned to clients, with the computed sale price.
#[derive(Debug, Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub discounted_price: Decimal,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            discounted_price: product.discounted_price(),
            product,
        }
    }
}

/// `X-Total-Count` header for a page.
pub fn total_count_headers<T>(page: &Page<T>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(TOTAL_COUNT_HEADER, HeaderValue::from(page.total));
    headers
}

#[instrument(skip(state))]
async fn index(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ProductParams>,
) -> Result<(HeaderMap, Json<Page<ProductResponse>>)> {
    let page = state.catalog().list_products(&params.into_query()).await?;
    Ok((total_count_headers(&page), Json(page.map(ProductResponse::from))))
}

async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ProductResponse>> {
    let product = state.catalog().get_product(id).await?;
    Ok(Json(product.into()))
}

async fn brands(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    Ok(Json(state.catalog().brands().await?))
}

async fn categories(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    Ok(Json(state.catalog().categories().await?))
}
