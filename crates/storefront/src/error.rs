//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`; every response body is `{"error": message}`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::models::StockShortfall;
use crate::services::{
    AccountError, AuthError, CartError, CatalogError, OrderError, PaymentError,
};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage operation failed outside a service.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) | AuthError::MissingName => {
                    StatusCode::BAD_REQUEST
                }
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Account(err) => match err {
                AccountError::UserNotFound | AccountError::AddressNotFound => StatusCode::NOT_FOUND,
                AccountError::Invalid(_) => StatusCode::BAD_REQUEST,
                AccountError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Catalog(err) => match err {
                CatalogError::NotFound => StatusCode::NOT_FOUND,
                CatalogError::Invalid(_) => StatusCode::BAD_REQUEST,
                CatalogError::Forbidden => StatusCode::FORBIDDEN,
                CatalogError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Cart(err) => match err {
                CartError::ProductNotFound | CartError::ItemNotFound => StatusCode::NOT_FOUND,
                CartError::OutOfStock(_) | CartError::DuplicateItem => StatusCode::CONFLICT,
                CartError::InvalidVariant(_) | CartError::InvalidQuantity(_) => {
                    StatusCode::BAD_REQUEST
                }
                CartError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Order(err) => match err {
                OrderError::EmptyCart => StatusCode::BAD_REQUEST,
                OrderError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                OrderError::Stock(_)
                | OrderError::CartChanged
                | OrderError::StatusConflict
                | OrderError::PaymentNotConfirmed => StatusCode::CONFLICT,
                OrderError::OrderNotFound => StatusCode::NOT_FOUND,
                OrderError::Forbidden => StatusCode::FORBIDDEN,
                OrderError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Payment(err) => match err {
                PaymentError::OrderNotFound | PaymentError::UnknownTransaction => {
                    StatusCode::NOT_FOUND
                }
                PaymentError::NotCardOrder | PaymentError::InvalidSignature => {
                    StatusCode::BAD_REQUEST
                }
                PaymentError::AlreadyPaid | PaymentError::OrderClosed => StatusCode::CONFLICT,
                PaymentError::Gateway(_) => StatusCode::BAD_GATEWAY,
                PaymentError::InvalidAmount(_) | PaymentError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Client-facing message. Server errors never leak details.
    fn public_message(&self, status: StatusCode) -> String {
        if status == StatusCode::BAD_GATEWAY {
            return "Payment service unavailable".to_string();
        }
        if status.is_server_error() {
            return "Internal server error".to_string();
        }
        match self {
            Self::Auth(AuthError::InvalidCredentials | AuthError::UserNotFound) => {
                "Invalid credentials".to_string()
            }
            Self::Auth(AuthError::UserAlreadyExists) => {
                "An account with this email already exists".to_string()
            }
            Self::Auth(AuthError::WeakPassword(msg)) => msg.clone(),
            Self::Auth(AuthError::InvalidEmail(_)) => "Invalid email address".to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    fn shortfalls(&self) -> Option<&[StockShortfall]> {
        match self {
            Self::Order(OrderError::Stock(shortfalls)) => Some(shortfalls),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let message = self.public_message(status);
        let body = match self.shortfalls() {
            Some(shortfalls) => json!({ "error": message, "shortfalls": shortfalls }),
            None => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session error: {err}"))
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a checkout step.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_string(), serde_json::Value::String(value.clone()));
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use amyfairy_core::{OrderStatus, ProductId};
    use axum::body::to_bytes;

    use super::*;
    use crate::gateway::GatewayError;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_json(err: AppError) -> serde_json::Value {
        let bytes = to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(OrderError::InvalidTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Delivered,
            }
            .into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(get_status(CartError::DuplicateItem.into()), StatusCode::CONFLICT);
        assert_eq!(get_status(OrderError::CartChanged.into()), StatusCode::CONFLICT);
        assert_eq!(
            get_status(PaymentError::InvalidSignature.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(PaymentError::UnknownTransaction.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(PaymentError::Gateway(GatewayError::Request("timeout".to_string())).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(CatalogError::Forbidden.into()),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let err = AppError::Database(RepositoryError::DataCorruption(
            "bad email in users row 7".to_string(),
        ));
        let body = body_json(err).await;
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_stock_error_carries_shortfalls() {
        let err = AppError::Order(OrderError::Stock(vec![StockShortfall {
            product_id: ProductId::new(4),
            title: "Silk Scarf".to_string(),
            requested: 3,
            available: 2,
        }]));
        let body = body_json(err).await;

        assert_eq!(body["shortfalls"][0]["product_id"], 4);
        assert_eq!(body["shortfalls"][0]["available"], 2);
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .contains("only 2 left in stock")
        );
    }
}
