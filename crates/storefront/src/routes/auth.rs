//! Authentication route handlers.
//!
//! Email and password accounts. A successful register or login stores the
//! [`CurrentUser`] in the session.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::routes::ApiJson;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/check", get(check))
}

/// Registration request body.
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: SecretString,
    pub name: String,
}

/// Login request body.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: SecretString,
}

async fn start_session(session: &Session, user: &User) -> Result<CurrentUser> {
    let current = CurrentUser::from(user);
    set_current_user(session, &current).await?;
    set_sentry_user(&current.id, Some(current.email.as_str()));
    Ok(current)
}

/// Create an account and log it in.
#[instrument(skip(state, session, body), fields(email = %body.email))]
async fn register(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<CurrentUser>)> {
    let user = state
        .auth()
        .register(&body.email, body.password.expose_secret(), &body.name)
        .await?;
    let current = start_session(&session, &user).await?;
    Ok((StatusCode::CREATED, Json(current)))
}

/// Log in with email and password.
#[instrument(skip(state, session, body), fields(email = %body.email))]
async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<CurrentUser>> {
    let user = state
        .auth()
        .login(&body.email, body.password.expose_secret())
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "login failed"))?;
    Ok(Json(start_session(&session, &user).await?))
}

/// Drop the session.
async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// Current identity.
async fn check(RequireAuth(user): RequireAuth) -> Json<CurrentUser> {
    Json(user)
}
