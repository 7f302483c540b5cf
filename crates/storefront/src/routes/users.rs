//! Profile and address book handlers for the logged-in user.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get},
};
use tracing::instrument;

use amyfairy_core::AddressId;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{Address, NewAddress, ProfileUpdate, User};
use crate::routes::{ApiJson, ApiPath};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/own", get(profile).patch(update_profile))
        .route("/users/own/addresses", get(addresses).post(add_address))
        .route("/users/own/addresses/{id}", delete(delete_address))
}

async fn profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<User>> {
    Ok(Json(state.account().profile(user.id).await?))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<ProfileUpdate>,
) -> Result<Json<User>> {
    Ok(Json(state.account().update_profile(user.id, &body).await?))
}

async fn addresses(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Address>>> {
    Ok(Json(state.account().addresses(user.id).await?))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn add_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<NewAddress>,
) -> Result<(StatusCode, Json<Address>)> {
    let address = state.account().add_address(user.id, &body).await?;
    Ok((StatusCode::CREATED, Json(address)))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn delete_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<AddressId>,
) -> Result<StatusCode> {
    state.account().delete_address(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
