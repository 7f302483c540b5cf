//! Session middleware configuration.
//!
//! Production sessions live in `PostgreSQL` (`tower_sessions.session`,
//! created by the initial migration). Tests plug in any other
//! `SessionStore` through [`session_layer`].

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "amyfairy_session";

/// Session expiry time in seconds (7 days of inactivity).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Session layer over an arbitrary store.
///
/// Cookies are HTTP-only and `SameSite=Lax`; `secure` should be set when the
/// storefront is served over HTTPS.
#[must_use]
pub fn session_layer<S: SessionStore + Clone>(store: S, secure: bool) -> SessionManagerLayer<S> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// Create the session layer with the `PostgreSQL` store.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    session_layer(PostgresStore::new(pool.clone()), config.is_https())
}
