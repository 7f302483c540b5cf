//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                      - Liveness
//! GET    /health/ready                - Store ping
//!
//! # Auth
//! POST   /auth/register               - Create account and log in
//! POST   /auth/login                  - Log in
//! POST   /auth/logout                 - Log out
//! GET    /auth/check                  - Current identity
//!
//! # Account (requires auth)
//! GET    /users/own                   - Profile
//! PATCH  /users/own                   - Update name / phone
//! GET    /users/own/addresses         - Address book
//! POST   /users/own/addresses         - Add address
//! DELETE /users/own/addresses/{id}    - Delete address
//!
//! # Catalog
//! GET    /products                    - Filtered, paged listing (X-Total-Count)
//! GET    /products/{id}               - Product detail
//! GET    /brands                      - Distinct brands
//! GET    /categories                  - Distinct categories
//!
//! # Cart (requires auth)
//! GET    /cart                        - Live cart
//! POST   /cart                        - Add a variant
//! PATCH  /cart/{id}                   - Set quantity
//! DELETE /cart/{id}                   - Remove line
//!
//! # Orders (requires auth)
//! POST   /orders                      - Place order from cart
//! GET    /orders/own                  - Order history
//! GET    /orders/{id}                 - Order detail
//!
//! # Payments
//! POST   /payments/{order_id}/initiate - Open gateway transaction (auth)
//! POST   /payments/callback           - Gateway callback (signature only)
//!
//! # Admin (requires admin)
//! GET    /admin/products              POST /admin/products
//! PATCH  /admin/products/{id}         DELETE /admin/products/{id}
//! GET    /admin/orders                PATCH /admin/orders/{id}/status
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
mod extract;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;
pub mod users;

pub use extract::{ApiJson, ApiPath, ApiQuery};

use axum::{
    Router,
    extract::Request,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::config::StorefrontConfig;
use crate::middleware::{
    api_rate_limiter, auth_rate_limiter, request_id_middleware, security_headers_middleware,
};
use crate::state::AppState;

fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(users::router())
        .merge(products::router())
        .merge(cart::router())
        .merge(orders::router())
        .merge(payments::router())
        .merge(admin::router())
}

/// All routes, without rate limiting.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(api_routes())
}

/// All routes with per-group rate limits. Health probes are never limited.
pub fn rate_limited_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router().layer(auth_rate_limiter()))
        .merge(api_routes().layer(api_rate_limiter()))
}

/// CORS for the configured browser origins. Credentials are allowed so the
/// session cookie travels with API calls.
#[must_use]
pub fn cors_layer(config: &StorefrontConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([
            HeaderName::from_static("x-total-count"),
            HeaderName::from_static("x-request-id"),
        ])
        .allow_credentials(true)
}

/// Assemble the application: routes, sessions and the shared middleware.
pub fn app<S>(state: AppState, routes: Router<AppState>, sessions: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    let cors = cors_layer(state.config());

    routes
        .layer(sessions)
        .layer(axum_middleware::from_fn(security_headers_middleware))
        .layer(cors)
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
