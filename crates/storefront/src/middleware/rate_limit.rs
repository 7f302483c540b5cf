//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `auth_rate_limiter`: strict limits for `/auth` (~10/min per client)
//! - `api_rate_limiter`: relaxed limits for everything else (~100/min per client)

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Key extractor that prefers proxy-supplied client addresses and falls back
/// to the socket peer address.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        // X-Forwarded-For lists the client first
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

/// Client address from Cloudflare, generic proxy, or Fly.io headers.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    ["cf-connecting-ip", "x-forwarded-for", "x-real-ip", "fly-client-ip"]
        .into_iter()
        .find_map(|name| header_ip(headers, name))
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        forwarded_ip(req.headers())
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create rate limiter for auth endpoints: ~10 requests per minute per IP.
///
/// Configuration: 1 request every 6 seconds (replenish), burst of 5.
///
/// # Panics
///
/// Does not panic: `per_second(6)` and `burst_size(5)` are valid positive
/// values for `GovernorConfigBuilder`.
#[must_use]
pub fn auth_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(6)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config))
}

/// Create rate limiter for the API: ~100 requests per minute per IP.
///
/// Configuration: 1 request per second (replenish), burst of 50.
///
/// # Panics
///
/// Does not panic: `per_second(1)` and `burst_size(50)` are valid positive
/// values for `GovernorConfigBuilder`.
#[must_use]
pub fn api_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(1)
        .burst_size(50)
        .finish()
        .expect("rate limiter config with per_second(1) and burst_size(50) is valid");
    GovernorLayer::new(Arc::new(config))
}
