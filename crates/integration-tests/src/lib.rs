//! Integration test harness for the AmyFairy storefront.
//!
//! Tests run against [`MemoryStore`], a scripted [`FakeGateway`] and the
//! in-memory session store, so no database or network is needed:
//!
//! ```bash
//! cargo test -p amyfairy-integration-tests
//! ```
//!
//! `tests/postgres_store.rs` exercises the same guards against `PostgreSQL`
//! and is ignored unless run with `-- --ignored` and a database URL.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use amyfairy_core::{CurrencyCode, Email, UserRole};
use amyfairy_storefront::config::{PaymentConfig, StorefrontConfig};
use amyfairy_storefront::db::{MemoryStore, ProductRepository, Store, UserRepository};
use amyfairy_storefront::gateway::{
    CallbackStatus, GatewayError, GatewayTransaction, PaymentGateway, TransactionRequest, sign,
    signing_payload,
};
use amyfairy_storefront::middleware::session_layer;
use amyfairy_storefront::models::{
    CurrentUser, NewAddress, Product, ProductDraft, ShippingAddress,
};
use amyfairy_storefront::routes;
use amyfairy_storefront::services::{AuthService, PaymentCallback};
use amyfairy_storefront::state::AppState;

/// Key secret shared by the fake gateway and the callback verifier.
pub const TEST_KEY_SECRET: &str = "kq8Zt2vR7mXw4pLc9NbY3sHd";

/// Public key the fake gateway hands to clients.
pub const TEST_KEY_ID: &str = "rzp_test_amyfairy";

/// Password used for every test account.
pub const TEST_PASSWORD: &str = "correct horse battery";

/// Gateway double that numbers transactions and can be told to fail.
#[derive(Debug, Default)]
pub struct FakeGateway {
    next: AtomicU64,
    failing: AtomicBool,
}

impl FakeGateway {
    /// Make subsequent `create_transaction` calls fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of transactions opened so far.
    pub fn transactions_opened(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn client_key(&self) -> &str {
        TEST_KEY_ID
    }

    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<GatewayTransaction, GatewayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Request("connection refused".to_string()));
        }
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(GatewayTransaction {
            transaction_id: format!("order_test_{}_{n}", request.order_id),
            client_key: TEST_KEY_ID.to_string(),
        })
    }
}

/// Configuration suitable for tests; nothing in it is contacted.
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://unused/test"),
        host: "127.0.0.1".parse().unwrap(),
        port: 8080,
        base_url: "http://localhost:8080".to_string(),
        session_secret: SecretString::from("Xv93jfQ0pLm28sNcTq7RzWb4KdYh6AeU"),
        currency: CurrencyCode::INR,
        payment: PaymentConfig {
            api_base: "http://gateway.invalid/v1".to_string(),
            key_id: TEST_KEY_ID.to_string(),
            key_secret: SecretString::from(TEST_KEY_SECRET),
        },
        cors_allowed_origins: vec!["http://localhost:5173".to_string()],
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Parse a decimal literal.
pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// A wired-up storefront over in-memory backends.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<FakeGateway>,
    pub state: AppState,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::default());
        let state = AppState::new(
            test_config(),
            store.clone() as Arc<dyn Store>,
            gateway.clone() as Arc<dyn PaymentGateway>,
        );
        Self {
            store,
            gateway,
            state,
        }
    }

    /// The full HTTP app with in-memory sessions and no rate limiting.
    pub fn router(&self) -> Router {
        let sessions = session_layer(tower_sessions::MemoryStore::default(), false);
        routes::app(self.state.clone(), routes::routes(), sessions)
    }

    /// Insert a product without variants.
    pub async fn product(&self, title: &str, price: &str, discount: &str, stock: i32) -> Product {
        self.product_with(ProductDraft {
            title: title.to_string(),
            description: String::new(),
            price: dec(price),
            discount_percentage: dec(discount),
            rating: dec("4.2"),
            stock,
            brand: "AmyFairy".to_string(),
            category: "dresses".to_string(),
            colors: Vec::new(),
            sizes: Vec::new(),
            thumbnail: String::new(),
            images: Vec::new(),
        })
        .await
    }

    /// Insert an arbitrary product.
    pub async fn product_with(&self, draft: ProductDraft) -> Product {
        self.store.create_product(&draft).await.unwrap()
    }

    /// Register a shopper.
    pub async fn user(&self, email: &str) -> CurrentUser {
        let user = AuthService::new(self.store.as_ref())
            .register(email, TEST_PASSWORD, "Test Shopper")
            .await
            .unwrap();
        CurrentUser::from(&user)
    }

    /// Register an administrator.
    pub async fn admin(&self, email: &str) -> CurrentUser {
        self.user(email).await;
        let user = self
            .store
            .set_user_role(&Email::parse(email).unwrap(), UserRole::Admin)
            .await
            .unwrap();
        CurrentUser::from(&user)
    }

    /// Save an address for `user` and return its shipping copy.
    pub async fn shipping_address(&self, user: &CurrentUser) -> ShippingAddress {
        let address = self
            .store
            .add_address(user.id, &new_address(user.email.as_str()))
            .await
            .unwrap();
        ShippingAddress::from(&address)
    }
}

/// A complete address body.
pub fn new_address(email: &str) -> NewAddress {
    NewAddress {
        name: "Amy Fairy".to_string(),
        email: email.to_string(),
        phone: "9876543210".to_string(),
        street: "12 MG Road".to_string(),
        city: "Bengaluru".to_string(),
        state: "Karnataka".to_string(),
        pin_code: "560001".to_string(),
    }
}

/// A correctly signed gateway callback.
pub fn signed_callback(
    transaction_id: &str,
    payment_id: &str,
    status: CallbackStatus,
) -> PaymentCallback {
    let payload = signing_payload(transaction_id, payment_id, status);
    PaymentCallback {
        transaction_id: transaction_id.to_string(),
        payment_id: payment_id.to_string(),
        status,
        signature: sign(TEST_KEY_SECRET, &payload).unwrap(),
    }
}

/// Minimal HTTP client over a router that carries the session cookie.
pub struct TestClient {
    app: Router,
    cookie: Option<String>,
}

/// A buffered response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestClient {
    pub const fn new(app: Router) -> Self {
        Self { app, cookie: None }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.send("GET", uri, None).await
    }

    pub async fn post(&mut self, uri: &str, body: Value) -> TestResponse {
        self.send("POST", uri, Some(body)).await
    }

    pub async fn patch(&mut self, uri: &str, body: Value) -> TestResponse {
        self.send("PATCH", uri, Some(body)).await
    }

    pub async fn delete(&mut self, uri: &str) -> TestResponse {
        self.send("DELETE", uri, None).await
    }

    /// Send a request, remembering any session cookie the server sets.
    pub async fn send(&mut self, method: &str, uri: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();

        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            && let Some(pair) = set_cookie.split(';').next()
        {
            self.cookie = Some(pair.to_string());
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}
