//! Razorpay Orders API client.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use super::{GatewayError, GatewayTransaction, PaymentGateway, TransactionRequest};

/// Razorpay API base URL.
pub const RAZORPAY_API_BASE: &str = "https://api.razorpay.com/v1";

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: OrderNotes,
}

#[derive(Debug, Serialize)]
struct OrderNotes {
    order_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    description: Option<String>,
}

/// Razorpay client for opening checkout orders.
#[derive(Clone)]
pub struct RazorpayClient {
    /// HTTP client.
    client: Client,
    /// API base URL, overridable for sandboxes.
    api_base: String,
    /// Public key id, also handed to the checkout client.
    key_id: String,
    /// Key secret for basic auth.
    key_secret: SecretString,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("api_base", &self.api_base)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl RazorpayClient {
    /// Create a new Razorpay client.
    #[must_use]
    pub fn new(api_base: &str, key_id: String, key_secret: SecretString) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_owned(),
            key_id,
            key_secret,
        }
    }

    fn orders_url(&self) -> String {
        format!("{}/orders", self.api_base)
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    fn client_key(&self) -> &str {
        &self.key_id
    }

    #[instrument(skip(self), fields(order_id = %request.order_id))]
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<GatewayTransaction, GatewayError> {
        let body = CreateOrderRequest {
            amount: request.amount_minor,
            currency: request.currency.code(),
            receipt: &request.receipt,
            notes: OrderNotes {
                order_id: request.order_id.to_string(),
            },
        };

        let response = self
            .client
            .post(self.orders_url())
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.error.description)
                .unwrap_or_else(|| status.to_string());
            error!(status = status.as_u16(), message = %message, "Razorpay order creation failed");
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let created: CreateOrderResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Response(e.to_string()))?;

        debug!(transaction_id = %created.id, "Razorpay order created");

        Ok(GatewayTransaction {
            transaction_id: created.id,
            client_key: self.key_id.clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use amyfairy_core::{CurrencyCode, OrderId};

    #[test]
    fn test_request_body_shape() {
        let body = CreateOrderRequest {
            amount: 84915,
            currency: CurrencyCode::INR.code(),
            receipt: "9b2c",
            notes: OrderNotes {
                order_id: OrderId::new(7).to_string(),
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "amount": 84915,
                "currency": "INR",
                "receipt": "9b2c",
                "notes": { "order_id": "7" }
            })
        );
    }

    #[test]
    fn test_orders_url_trims_slash() {
        let client = RazorpayClient::new(
            "https://api.razorpay.com/v1/",
            "rzp_test_key".to_owned(),
            SecretString::from("secret".to_owned()),
        );
        assert_eq!(client.orders_url(), "https://api.razorpay.com/v1/orders");
        assert!(format!("{client:?}").contains("[REDACTED]"));
    }
}
