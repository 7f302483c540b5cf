//! Card payment gateway integration.
//!
//! This module provides:
//! - [`PaymentGateway`], the seam the payment service calls to open a
//!   transaction
//! - [`RazorpayClient`], the production implementation
//! - [`SignatureVerifier`] for gateway callbacks
//!
//! # Flow
//!
//! 1. The shopper places a card order and asks to pay
//! 2. A gateway transaction is created and its handle returned to the client
//! 3. The client completes checkout with the gateway
//! 4. The gateway (or client) posts a signed callback, which is verified and
//!    reconciled exactly once

mod error;
mod razorpay;
mod signature;

use async_trait::async_trait;

use amyfairy_core::{CurrencyCode, OrderId};

pub use error::GatewayError;
pub use razorpay::{RAZORPAY_API_BASE, RazorpayClient};
pub use signature::{CallbackStatus, SignatureVerifier, sign, signing_payload};

/// Request to open a gateway transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    /// Amount in minor units (paise, cents).
    pub amount_minor: i64,
    pub currency: CurrencyCode,
    /// Idempotency key, sent as the gateway receipt.
    pub receipt: String,
    /// Local order, sent as gateway metadata.
    pub order_id: OrderId,
}

/// A transaction opened by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayTransaction {
    pub transaction_id: String,
    /// Public key the client uses to start checkout.
    pub client_key: String,
}

/// Creates payment transactions with an external gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key the checkout client needs alongside a transaction id.
    fn client_key(&self) -> &str;

    /// Open a transaction for `request`.
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<GatewayTransaction, GatewayError>;
}
