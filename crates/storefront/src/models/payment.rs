//! Payment intent types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use amyfairy_core::{CurrencyCode, OrderId, PaymentIntentId, PaymentIntentStatus};

/// A gateway transaction created for a card order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentIntent {
    pub id: PaymentIntentId,
    pub order_id: OrderId,
    /// Gateway transaction id. Unique.
    pub transaction_id: String,
    /// Gateway payment id, recorded on reconciliation.
    pub gateway_payment_id: Option<String>,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub status: PaymentIntentStatus,
    pub idempotency_key: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a payment intent. Always starts `created`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentIntent {
    pub order_id: OrderId,
    pub transaction_id: String,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub idempotency_key: Uuid,
}

/// Terminal state to move an intent into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutcome {
    /// `Confirmed` or `Failed`.
    pub status: PaymentIntentStatus,
    pub gateway_payment_id: String,
}

/// Result of settling an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// This call moved the intent out of `created`.
    Applied(PaymentIntent),
    /// The intent was already settled; nothing changed.
    AlreadySettled(PaymentIntent),
}

impl Settlement {
    #[must_use]
    pub const fn intent(&self) -> &PaymentIntent {
        match self {
            Self::Applied(intent) | Self::AlreadySettled(intent) => intent,
        }
    }
}
