//! Authentication extractors.
//!
//! The session stores a [`CurrentUser`] at login. Handlers take the identity
//! through these extractors and pass it explicitly into service calls.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_sessions::Session;

use crate::models::{CurrentUser, session_keys};

/// Extractor that requires a logged-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires a logged-in administrator.
pub struct RequireAdmin(pub CurrentUser);

/// Extractor that optionally gets the current user.
pub struct OptionalAuth(pub Option<CurrentUser>);

/// Rejection for the auth extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// No session or no user in it.
    Unauthorized,
    /// Logged in without the administrator role.
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Authentication required"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Administrator access required"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn session_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_user(parts)
            .await
            .map(Self)
            .ok_or(AuthRejection::Unauthorized)
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = session_user(parts)
            .await
            .ok_or(AuthRejection::Unauthorized)?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "admin route denied");
            return Err(AuthRejection::Forbidden);
        }
        Ok(Self(user))
    }
}

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_user(parts).await))
    }
}

/// Store the logged-in user in the session.
///
/// The session ID is cycled first so a pre-login ID cannot be fixated.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Clear the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
