//! Checkout and order history handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use amyfairy_core::{AddressId, OrderId, PaymentMethod};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::{Order, ShippingAddress};
use crate::routes::{ApiJson, ApiPath};
use crate::services::PaymentHandle;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", post(place))
        .route("/orders/own", get(own))
        .route("/orders/{id}", get(show))
}

/// Checkout request body.
#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    /// Entry in the caller's address book to ship to.
    pub address_id: AddressId,
    pub payment_method: PaymentMethod,
}

/// Checkout response.
///
/// `payment` is present for card orders when the gateway transaction could
/// be opened; otherwise the client retries via `/payments/{id}/initiate`.
#[derive(Debug, Serialize)]
pub struct PlaceOrderResponse {
    pub order: Order,
    pub payment: Option<PaymentHandle>,
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn place(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<PlaceOrderResponse>)> {
    let address = state.account().address(user.id, body.address_id).await?;
    let order = state
        .orders()
        .place_order(&user, ShippingAddress::from(&address), body.payment_method)
        .await?;
    add_breadcrumb(
        "checkout",
        "Order placed",
        &[("order_id", order.id.to_string())],
    );

    let payment = if body.payment_method == PaymentMethod::Card {
        // The order is committed either way; a gateway hiccup only delays payment.
        match state.payments().initiate_payment(&user, order.id).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "could not open payment at checkout");
                None
            }
        }
    } else {
        None
    };

    Ok((
        StatusCode::CREATED,
        Json(PlaceOrderResponse { order, payment }),
    ))
}

async fn own(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().list_own_orders(user.id).await?))
}

async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().get_order(&user, id).await?))
}
