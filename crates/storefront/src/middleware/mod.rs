//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID
//! 4. CORS
//! 5. Security headers
//! 6. Session layer (tower-sessions with `PostgreSQL` store)
//! 7. Rate limiting (governor, per route group)

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    AuthRejection, OptionalAuth, RequireAdmin, RequireAuth, clear_current_user, set_current_user,
};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{create_session_layer, session_layer};
