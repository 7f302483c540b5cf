//! Request ID middleware for request tracing and correlation.
//!
//! An upstream `x-request-id` is reused when it looks sane; otherwise a UUID
//! v4 is generated. The ID is recorded in the current span, tagged on the
//! Sentry scope and echoed in the response.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream ID accepted verbatim.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Accept only short, printable, space-free IDs from upstream.
fn accept_upstream(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value.bytes().all(|b| b.is_ascii_graphic())
}

/// Middleware that ensures every request has a request ID.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|s| accept_upstream(s))
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    Span::current().record("request_id", &request_id);

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, body::Body, middleware, routing::get};
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn(request_id_middleware))
    }

    #[test]
    fn test_accept_upstream() {
        assert!(accept_upstream("cf-7d3a9e1b"));
        assert!(!accept_upstream(""));
        assert!(!accept_upstream("has space"));
        assert!(!accept_upstream(&"a".repeat(MAX_REQUEST_ID_LEN + 1)));
    }

    #[tokio::test]
    async fn test_upstream_id_is_echoed() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(REQUEST_ID_HEADER, "edge-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[REQUEST_ID_HEADER], "edge-42");
    }

    #[tokio::test]
    async fn test_id_generated_when_missing() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }
}
