//! Payment intent queries for [`PgStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use amyfairy_core::{CurrencyCode, OrderId, PaymentIntentId, PaymentIntentStatus};

use super::{PaymentRepository, PgStore, RepositoryError};
use crate::models::{NewPaymentIntent, PaymentIntent, PaymentOutcome, Settlement};

macro_rules! intent_columns {
    () => {
        "id, order_id, transaction_id, gateway_payment_id, amount, currency, status, \
         idempotency_key, created_at, updated_at"
    };
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentIntentRow {
    id: PaymentIntentId,
    order_id: OrderId,
    transaction_id: String,
    gateway_payment_id: Option<String>,
    amount: Decimal,
    currency: String,
    status: PaymentIntentStatus,
    idempotency_key: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentIntentRow> for PaymentIntent {
    type Error = RepositoryError;

    fn try_from(row: PaymentIntentRow) -> Result<Self, Self::Error> {
        let currency = row.currency.parse::<CurrencyCode>().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid currency in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            transaction_id: row.transaction_id,
            gateway_payment_id: row.gateway_payment_id,
            amount: row.amount,
            currency,
            status: row.status,
            idempotency_key: row.idempotency_key,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl PaymentRepository for PgStore {
    async fn insert_payment_intent(
        &self,
        intent: &NewPaymentIntent,
    ) -> Result<PaymentIntent, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentIntentRow>(concat!(
            "INSERT INTO payment_intents (order_id, transaction_id, amount, currency, \
             idempotency_key) VALUES ($1, $2, $3, $4, $5) RETURNING ",
            intent_columns!()
        ))
        .bind(intent.order_id)
        .bind(&intent.transaction_id)
        .bind(intent.amount)
        .bind(intent.currency.code())
        .bind(intent.idempotency_key)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "payment intent already exists"))?;

        row.try_into()
    }

    async fn open_payment_intent(
        &self,
        order_id: OrderId,
    ) -> Result<Option<PaymentIntent>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentIntentRow>(concat!(
            "SELECT ",
            intent_columns!(),
            " FROM payment_intents WHERE order_id = $1 AND status = 'created'"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PaymentIntent::try_from).transpose()
    }

    async fn payment_intent_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentIntent>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentIntentRow>(concat!(
            "SELECT ",
            intent_columns!(),
            " FROM payment_intents WHERE transaction_id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PaymentIntent::try_from).transpose()
    }

    async fn settle_payment_intent(
        &self,
        transaction_id: &str,
        outcome: &PaymentOutcome,
    ) -> Result<Settlement, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Zero rows means another delivery already settled it.
        let settled = sqlx::query_as::<_, PaymentIntentRow>(concat!(
            "UPDATE payment_intents SET status = $2, gateway_payment_id = $3, updated_at = now() \
             WHERE transaction_id = $1 AND status = 'created' RETURNING ",
            intent_columns!()
        ))
        .bind(transaction_id)
        .bind(outcome.status)
        .bind(&outcome.gateway_payment_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = settled else {
            tx.rollback().await?;
            return match self.payment_intent_by_transaction(transaction_id).await? {
                Some(intent) => Ok(Settlement::AlreadySettled(intent)),
                None => Err(RepositoryError::NotFound),
            };
        };

        if outcome.status == PaymentIntentStatus::Confirmed {
            sqlx::query(
                "UPDATE orders SET payment_confirmed = TRUE, paid_at = now(), updated_at = now() \
                 WHERE id = $1",
            )
            .bind(row.order_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Settlement::Applied(row.try_into()?))
    }
}
