//! Payment gateway errors.

use thiserror::Error;

/// Errors that can occur when talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("gateway request failed: {0}")]
    Request(String),

    /// Failed to parse response.
    #[error("gateway response error: {0}")]
    Response(String),

    /// Gateway returned an error status.
    #[error("gateway API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Gateway error description.
        message: String,
    },

    /// Signature could not be computed.
    #[error("signature error: {0}")]
    Signature(String),
}
