//! Payment initiation and the gateway callback.
//!
//! The callback carries no session; it is authenticated by its HMAC
//! signature alone.

use axum::{Json, Router, extract::State, routing::post};
use serde::Serialize;
use tracing::instrument;

use amyfairy_core::OrderId;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::routes::{ApiJson, ApiPath};
use crate::services::{PaymentCallback, PaymentHandle, ReconcileOutcome};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments/{order_id}/initiate", post(initiate))
        .route("/payments/callback", post(callback))
}

/// Callback acknowledgement.
#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub outcome: ReconcileOutcome,
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn initiate(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(order_id): ApiPath<OrderId>,
) -> Result<Json<PaymentHandle>> {
    Ok(Json(
        state.payments().initiate_payment(&user, order_id).await?,
    ))
}

async fn callback(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PaymentCallback>,
) -> Result<Json<CallbackResponse>> {
    let outcome = state.payments().reconcile(&body).await?;
    Ok(Json(CallbackResponse { outcome }))
}
