//! Administrator catalog and order management.
//!
//! Every handler requires [`RequireAdmin`]; the services check the role again.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, patch},
};
use serde::Deserialize;
use tracing::instrument;

use amyfairy_core::{OrderId, OrderStatus, ProductId};

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::page::normalize_paging;
use crate::models::{
    Order, OrderQuery, OrderSort, Page, Product, ProductDraft, ProductPatch, SortOrder,
};
use crate::routes::products::{ProductParams, ProductResponse, total_count_headers};
use crate::routes::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/products", get(list_products).post(create_product))
        .route(
            "/admin/products/{id}",
            patch(update_product).delete(delete_product),
        )
        .route("/admin/orders", get(list_orders))
        .route("/admin/orders/{id}/status", patch(update_order_status))
}

/// Admin order listing query string.
#[derive(Debug, Default, Deserialize)]
pub struct OrderParams {
    pub sort: Option<OrderSort>,
    pub order: Option<SortOrder>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl OrderParams {
    #[must_use]
    pub fn into_query(self) -> OrderQuery {
        let (page, per_page) = normalize_paging(self.page, self.per_page);
        let defaults = OrderQuery::default();
        OrderQuery {
            sort: self.sort.unwrap_or(defaults.sort),
            order: self.order.unwrap_or(defaults.order),
            page,
            per_page,
        }
    }
}

/// Status change body.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

async fn list_products(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiQuery(params): ApiQuery<ProductParams>,
) -> Result<(HeaderMap, Json<Page<ProductResponse>>)> {
    let include_deleted = params.include_deleted.unwrap_or(false);
    let mut query = params.into_query();
    query.include_deleted = include_deleted;
    let page = state.catalog().list_products_admin(&admin, &query).await?;
    Ok((total_count_headers(&page), Json(page.map(ProductResponse::from))))
}

#[instrument(skip(state, admin, draft), fields(admin_id = %admin.id, title = %draft.title))]
async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(draft): ApiJson<ProductDraft>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = state.catalog().create_product(&admin, &draft).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, admin, changes), fields(admin_id = %admin.id))]
async fn update_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(changes): ApiJson<ProductPatch>,
) -> Result<Json<Product>> {
    Ok(Json(
        state.catalog().update_product(&admin, id, &changes).await?,
    ))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
async fn delete_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<StatusCode> {
    state.catalog().delete_product(&admin, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_orders(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiQuery(params): ApiQuery<OrderParams>,
) -> Result<(HeaderMap, Json<Page<Order>>)> {
    let page = state
        .orders()
        .list_orders(&admin, &params.into_query())
        .await?;
    Ok((total_count_headers(&page), Json(page)))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
async fn update_order_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<StatusUpdate>,
) -> Result<Json<Order>> {
    Ok(Json(
        state
            .orders()
            .update_order_status(&admin, id, body.status)
            .await?,
    ))
}
