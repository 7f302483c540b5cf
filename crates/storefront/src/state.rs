//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::db::Store;
use crate::gateway::{PaymentGateway, SignatureVerifier};
use crate::services::{
    AccountService, AuthService, CartService, CatalogService, OrderService, PaymentService,
};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// store, the payment gateway and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    verifier: SignatureVerifier,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The callback verifier shares the gateway key secret from `config`.
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let verifier = SignatureVerifier::new(config.payment.key_secret.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                gateway,
                verifier,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get the backing store.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self.store())
    }

    #[must_use]
    pub fn account(&self) -> AccountService<'_> {
        AccountService::new(self.store())
    }

    #[must_use]
    pub fn catalog(&self) -> CatalogService<'_> {
        CatalogService::new(self.store())
    }

    #[must_use]
    pub fn cart(&self) -> CartService<'_> {
        CartService::new(self.store())
    }

    #[must_use]
    pub fn orders(&self) -> OrderService<'_> {
        OrderService::new(self.store())
    }

    #[must_use]
    pub fn payments(&self) -> PaymentService<'_> {
        PaymentService::new(
            self.store(),
            self.inner.gateway.as_ref(),
            &self.inner.verifier,
            self.inner.config.currency,
        )
    }
}
