//! Payment reconciler.
//!
//! Card orders are paid through the gateway in two steps:
//!
//! 1. [`PaymentService::initiate_payment`] opens a gateway transaction and
//!    records a `created` payment intent.
//! 2. [`PaymentService::reconcile`] applies the gateway callback. Delivery is
//!    at-least-once, so the intent moves out of `created` with a
//!    compare-and-swap and every later delivery is a no-op.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use amyfairy_core::{
    CurrencyCode, OrderId, PaymentIntentStatus, PaymentMethod, Price, PriceError,
};

use crate::db::{RepositoryError, Store};
use crate::gateway::{
    CallbackStatus, GatewayError, PaymentGateway, SignatureVerifier, TransactionRequest,
};
use crate::models::{CurrentUser, NewPaymentIntent, PaymentIntent, PaymentOutcome, Settlement};

/// Errors from payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Order does not exist or belongs to someone else.
    #[error("order not found")]
    OrderNotFound,

    /// Cash orders are not paid through the gateway.
    #[error("order is not a card order")]
    NotCardOrder,

    /// Payment already confirmed.
    #[error("order is already paid")]
    AlreadyPaid,

    /// Order is cancelled or delivered.
    #[error("order is closed")]
    OrderClosed,

    /// Callback signature did not verify.
    #[error("invalid payment signature")]
    InvalidSignature,

    /// Callback names a transaction we never created.
    #[error("unknown transaction")]
    UnknownTransaction,

    /// Order total cannot be expressed in minor units.
    #[error("invalid payment amount: {0}")]
    InvalidAmount(#[from] PriceError),

    /// Gateway call failed.
    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// What the checkout client needs to complete a card payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentHandle {
    pub transaction_id: String,
    pub client_key: String,
    pub amount: Decimal,
    /// Amount in minor units, as the gateway sees it.
    pub amount_minor: i64,
    pub currency: CurrencyCode,
    pub order_id: OrderId,
}

/// A gateway callback.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentCallback {
    pub transaction_id: String,
    pub payment_id: String,
    pub status: CallbackStatus,
    /// Hex HMAC-SHA256, see [`crate::gateway::signing_payload`].
    pub signature: String,
}

/// Result of a verified callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// This delivery settled the intent.
    Applied,
    /// The intent was settled by an earlier delivery.
    AlreadyReconciled,
}

/// Payment service.
pub struct PaymentService<'a> {
    store: &'a dyn Store,
    gateway: &'a dyn PaymentGateway,
    verifier: &'a SignatureVerifier,
    currency: CurrencyCode,
}

impl<'a> PaymentService<'a> {
    #[must_use]
    pub const fn new(
        store: &'a dyn Store,
        gateway: &'a dyn PaymentGateway,
        verifier: &'a SignatureVerifier,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            store,
            gateway,
            verifier,
            currency,
        }
    }

    fn handle(&self, intent: &PaymentIntent) -> Result<PaymentHandle, PaymentError> {
        Ok(PaymentHandle {
            transaction_id: intent.transaction_id.clone(),
            client_key: self.gateway.client_key().to_owned(),
            amount: intent.amount,
            amount_minor: Price::new(intent.amount, intent.currency).to_minor_units()?,
            currency: intent.currency,
            order_id: intent.order_id,
        })
    }

    /// Open (or reuse) a gateway transaction for a card order.
    ///
    /// Does not mark the order paid.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound`, `NotCardOrder`, `AlreadyPaid`, `OrderClosed`,
    /// or `Gateway` if the gateway call fails.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn initiate_payment(
        &self,
        user: &CurrentUser,
        order_id: OrderId,
    ) -> Result<PaymentHandle, PaymentError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .filter(|o| o.user_id == user.id)
            .ok_or(PaymentError::OrderNotFound)?;

        if order.payment_method != PaymentMethod::Card {
            return Err(PaymentError::NotCardOrder);
        }
        if order.payment_confirmed {
            return Err(PaymentError::AlreadyPaid);
        }
        if order.status.is_terminal() {
            return Err(PaymentError::OrderClosed);
        }

        if let Some(open) = self.store.open_payment_intent(order_id).await? {
            tracing::debug!(transaction_id = %open.transaction_id, "reusing open payment intent");
            return self.handle(&open);
        }

        let amount_minor = Price::new(order.total_amount, self.currency).to_minor_units()?;
        let idempotency_key = Uuid::new_v4();
        let transaction = self
            .gateway
            .create_transaction(&TransactionRequest {
                amount_minor,
                currency: self.currency,
                receipt: idempotency_key.to_string(),
                order_id,
            })
            .await?;

        let new_intent = NewPaymentIntent {
            order_id,
            transaction_id: transaction.transaction_id,
            amount: order.total_amount,
            currency: self.currency,
            idempotency_key,
        };
        let intent = match self.store.insert_payment_intent(&new_intent).await {
            Ok(intent) => intent,
            // A concurrent request opened one first; hand out that one.
            Err(RepositoryError::Conflict(_)) => self
                .store
                .open_payment_intent(order_id)
                .await?
                .ok_or_else(|| {
                    RepositoryError::Conflict("payment intent already exists".to_owned())
                })?,
            Err(other) => return Err(other.into()),
        };

        tracing::info!(transaction_id = %intent.transaction_id, "payment intent created");
        Ok(PaymentHandle {
            client_key: transaction.client_key,
            ..self.handle(&intent)?
        })
    }

    /// Apply a gateway callback exactly once.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSignature` or `UnknownTransaction`; neither changes
    /// any state.
    #[instrument(
        skip(self, callback),
        fields(transaction_id = %callback.transaction_id, status = ?callback.status)
    )]
    pub async fn reconcile(
        &self,
        callback: &PaymentCallback,
    ) -> Result<ReconcileOutcome, PaymentError> {
        if !self.verifier.verify(
            &callback.transaction_id,
            &callback.payment_id,
            callback.status,
            &callback.signature,
        ) {
            tracing::warn!("payment callback rejected: invalid signature");
            return Err(PaymentError::InvalidSignature);
        }

        let outcome = PaymentOutcome {
            status: match callback.status {
                CallbackStatus::Captured => PaymentIntentStatus::Confirmed,
                CallbackStatus::Failed => PaymentIntentStatus::Failed,
            },
            gateway_payment_id: callback.payment_id.clone(),
        };

        let settlement = self
            .store
            .settle_payment_intent(&callback.transaction_id, &outcome)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => {
                    tracing::warn!("payment callback rejected: unknown transaction");
                    PaymentError::UnknownTransaction
                }
                other => PaymentError::Repository(other),
            })?;

        match settlement {
            Settlement::Applied(intent) => {
                tracing::info!(
                    order_id = %intent.order_id,
                    status = ?intent.status,
                    "payment reconciled"
                );
                Ok(ReconcileOutcome::Applied)
            }
            Settlement::AlreadySettled(intent) => {
                if intent.status != outcome.status {
                    tracing::warn!(
                        settled = ?intent.status,
                        reported = ?outcome.status,
                        "callback disagrees with settled intent, ignoring"
                    );
                }
                Ok(ReconcileOutcome::AlreadyReconciled)
            }
        }
    }
}
