//! Concurrency guards of the `PostgreSQL` store.
//!
//! These tests require a running `PostgreSQL` database reachable through
//! `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`). Migrations are applied
//! before each test and every test uses fresh accounts and products.
//!
//! Run with: cargo test -p amyfairy-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use secrecy::SecretString;
use uuid::Uuid;

use amyfairy_core::PaymentMethod;
use amyfairy_integration_tests::{
    FakeGateway, TEST_PASSWORD, dec, new_address, signed_callback, test_config,
};
use amyfairy_storefront::db::{
    self, CartRepository, OrderRepository, PaymentRepository, PgStore, ProductRepository,
    RepositoryError, Store, UserRepository,
};
use amyfairy_storefront::gateway::{CallbackStatus, PaymentGateway};
use amyfairy_storefront::models::{
    CurrentUser, NewCartItem, NewOrder, Product, ProductDraft, ShippingAddress,
};
use amyfairy_storefront::services::{AddToCart, AuthService, OrderError, ReconcileOutcome};
use amyfairy_storefront::state::AppState;

struct PgContext {
    store: Arc<PgStore>,
    state: AppState,
}

async fn pg_context() -> PgContext {
    let url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("STOREFRONT_DATABASE_URL or DATABASE_URL must be set");
    let pool = db::create_pool(&SecretString::from(url)).await.unwrap();
    sqlx::migrate!("../storefront/migrations").run(&pool).await.unwrap();

    let store = Arc::new(PgStore::new(pool));
    let state = AppState::new(
        test_config(),
        store.clone() as Arc<dyn Store>,
        Arc::new(FakeGateway::default()) as Arc<dyn PaymentGateway>,
    );
    PgContext { store, state }
}

impl PgContext {
    async fn product(&self, stock: i32) -> Product {
        self.store
            .create_product(&ProductDraft {
                title: format!("Test Product {}", Uuid::new_v4()),
                description: String::new(),
                price: dec("200.00"),
                discount_percentage: dec("15"),
                rating: dec("4.0"),
                stock,
                brand: "AmyFairy".to_string(),
                category: "dresses".to_string(),
                colors: Vec::new(),
                sizes: Vec::new(),
                thumbnail: String::new(),
                images: Vec::new(),
            })
            .await
            .unwrap()
    }

    async fn shopper(&self) -> (CurrentUser, ShippingAddress) {
        let email = format!("pg-{}@example.com", Uuid::new_v4().simple());
        let user = AuthService::new(self.store.as_ref())
            .register(&email, TEST_PASSWORD, "Test Shopper")
            .await
            .unwrap();
        let address = self
            .store
            .add_address(user.id, &new_address(&email))
            .await
            .unwrap();
        (CurrentUser::from(&user), ShippingAddress::from(&address))
    }

    async fn add_to_cart(&self, user: &CurrentUser, product: &Product) {
        self.state
            .cart()
            .add_item(
                user.id,
                &AddToCart {
                    product_id: product.id,
                    color: None,
                    size: None,
                },
            )
            .await
            .unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires running database"]
async fn test_pg_concurrent_orders_never_oversell() {
    let ctx = Arc::new(pg_context().await);
    let product = ctx.product(2).await;

    let mut shoppers = Vec::new();
    for _ in 0..6 {
        let (user, address) = ctx.shopper().await;
        ctx.add_to_cart(&user, &product).await;
        shoppers.push((user, address));
    }

    let handles: Vec<_> = shoppers
        .into_iter()
        .map(|(user, address)| {
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                ctx.state
                    .orders()
                    .place_order(&user, address, PaymentMethod::Cash)
                    .await
            })
        })
        .collect();

    let mut placed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(OrderError::Stock(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(placed, 2);
    let product = ctx.store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 0);
}

#[tokio::test]
#[ignore = "Requires running database"]
async fn test_pg_cart_snapshot_commits_once() {
    let ctx = pg_context().await;
    let product = ctx.product(5).await;
    let (user, address) = ctx.shopper().await;
    ctx.add_to_cart(&user, &product).await;

    let lines = ctx.store.cart_lines(user.id).await.unwrap();
    let order = NewOrder::from_cart(user.id, &lines, address, PaymentMethod::Cash);

    ctx.store.commit_order(&order).await.unwrap();
    let second = ctx.store.commit_order(&order).await;

    assert!(matches!(second, Err(RepositoryError::CartChanged)));
    let product = ctx.store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 4);
    assert_eq!(ctx.store.orders_for_user(user.id).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "Requires running database"]
async fn test_pg_duplicate_cart_item_without_variants() {
    let ctx = pg_context().await;
    let product = ctx.product(5).await;
    let (user, _) = ctx.shopper().await;
    let item = NewCartItem {
        user_id: user.id,
        product_id: product.id,
        color: None,
        size: None,
    };

    ctx.store.insert_cart_item(&item).await.unwrap();
    let second = ctx.store.insert_cart_item(&item).await;

    assert!(matches!(second, Err(RepositoryError::Conflict(_))));
    assert_eq!(ctx.store.cart_lines(user.id).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires running database"]
async fn test_pg_concurrent_callbacks_settle_once() {
    let ctx = Arc::new(pg_context().await);
    let product = ctx.product(5).await;
    let (user, address) = ctx.shopper().await;
    ctx.add_to_cart(&user, &product).await;
    let order = ctx
        .state
        .orders()
        .place_order(&user, address, PaymentMethod::Card)
        .await
        .unwrap();
    let handle = ctx.state.payments().initiate_payment(&user, order.id).await.unwrap();
    let callback = signed_callback(&handle.transaction_id, "pay_pg_001", CallbackStatus::Captured);

    let deliveries: Vec<_> = (0..6)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let callback = callback.clone();
            tokio::spawn(async move { ctx.state.payments().reconcile(&callback).await.unwrap() })
        })
        .collect();

    let mut applied = 0;
    for delivery in deliveries {
        if delivery.await.unwrap() == ReconcileOutcome::Applied {
            applied += 1;
        }
    }

    assert_eq!(applied, 1);
    let paid = ctx.state.orders().get_order(&user, order.id).await.unwrap();
    assert!(paid.payment_confirmed);
    assert!(ctx.store.open_payment_intent(order.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "Requires running database"]
async fn test_pg_one_open_intent_per_order() {
    let ctx = pg_context().await;
    let product = ctx.product(5).await;
    let (user, address) = ctx.shopper().await;
    ctx.add_to_cart(&user, &product).await;
    let order = ctx
        .state
        .orders()
        .place_order(&user, address, PaymentMethod::Card)
        .await
        .unwrap();

    let first = ctx.state.payments().initiate_payment(&user, order.id).await.unwrap();
    let second = ctx.state.payments().initiate_payment(&user, order.id).await.unwrap();

    assert_eq!(first.transaction_id, second.transaction_id);
    let open = ctx.store.open_payment_intent(order.id).await.unwrap().unwrap();
    assert_eq!(open.transaction_id, first.transaction_id);
}
