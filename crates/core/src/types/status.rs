//! Status enums and the order fulfillment state machine.
//!
//! ```text
//! pending ──► dispatched ──► delivered
//!    │
//!    └──────► cancelled
//! ```
//!
//! `delivered` and `cancelled` are terminal. Payment confirmation is tracked
//! separately on the order and never moves this state machine.

use serde::{Deserialize, Serialize};

/// Order fulfillment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Dispatched,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Whether an administrator may move an order from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Dispatched | Self::Cancelled)
                | (Self::Dispatched, Self::Delivered)
        )
    }

    /// Terminal states accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Dispatched => "dispatched",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery. `pending` is already the steady state.
    Cash,
    /// Card through the payment gateway; needs reconciliation.
    Card,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cash => f.write_str("cash"),
            Self::Card => f.write_str("card"),
        }
    }
}

/// Lifecycle of a gateway payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_intent_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    #[default]
    Created,
    Confirmed,
    Failed,
}

impl PaymentIntentStatus {
    /// Reconciled intents are archived and never settled again.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Shopper.
    #[default]
    User,
    /// Catalog and order administrator.
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Dispatched,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    #[test]
    fn test_allowed_transitions() {
        let allowed: Vec<(OrderStatus, OrderStatus)> = ALL
            .iter()
            .flat_map(|from| ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .collect();

        assert_eq!(
            allowed,
            vec![
                (OrderStatus::Pending, OrderStatus::Dispatched),
                (OrderStatus::Pending, OrderStatus::Cancelled),
                (OrderStatus::Dispatched, OrderStatus::Delivered),
            ]
        );
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for terminal in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for to in ALL {
                assert!(!terminal.can_transition_to(to));
            }
        }
        assert!(!OrderStatus::Pending.is_terminal());
    }

    #[test]
    fn test_no_self_transitions() {
        for status in ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Dispatched).unwrap(),
            "\"dispatched\""
        );
        assert_eq!(
            serde_json::from_str::<OrderStatus>("\"cancelled\"").unwrap(),
            OrderStatus::Cancelled
        );
        assert!(serde_json::from_str::<OrderStatus>("\"shipped\"").is_err());
        assert_eq!(
            serde_json::from_str::<PaymentMethod>("\"card\"").unwrap(),
            PaymentMethod::Card
        );
    }

    #[test]
    fn test_intent_settlement() {
        assert!(!PaymentIntentStatus::Created.is_settled());
        assert!(PaymentIntentStatus::Confirmed.is_settled());
        assert!(PaymentIntentStatus::Failed.is_settled());
    }

    #[test]
    fn test_role_round_trip() {
        for role in [UserRole::User, UserRole::Admin] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{role}\""));
            assert_eq!(serde_json::from_str::<UserRole>(&json).unwrap(), role);
        }
    }
}
