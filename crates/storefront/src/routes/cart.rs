//! Cart route handlers.
//!
//! The cart is optimistic: nothing here reserves stock.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch},
};
use serde::Deserialize;
use tracing::instrument;

use amyfairy_core::CartItemId;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{CartItem, CartLine, CartView};
use crate::routes::{ApiJson, ApiPath};
use crate::services::AddToCart;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", get(show).post(add))
        .route("/cart/{id}", patch(update).delete(remove))
}

/// Quantity update body.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantity {
    pub quantity: i32,
}

async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartView>> {
    Ok(Json(state.cart().list_items(user.id).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<AddToCart>,
) -> Result<(StatusCode, Json<CartItem>)> {
    let item = state.cart().add_item(user.id, &body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<CartItemId>,
    ApiJson(body): ApiJson<UpdateQuantity>,
) -> Result<Json<CartLine>> {
    let line = state
        .cart()
        .update_quantity(user.id, id, body.quantity)
        .await?;
    Ok(Json(line))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<CartItemId>,
) -> Result<StatusCode> {
    state.cart().remove_item(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
