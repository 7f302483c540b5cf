//! Concurrent checkout of the last units of a product.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use amyfairy_core::PaymentMethod;
use amyfairy_integration_tests::TestContext;
use amyfairy_storefront::db::ProductRepository;
use amyfairy_storefront::services::{AddToCart, OrderError};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_unit_is_sold_once() {
    let ctx = Arc::new(TestContext::new());
    let product = ctx.product("Last Tiara", "999.00", "0", 1).await;

    let mut shoppers = Vec::new();
    for email in ["first@example.com", "second@example.com"] {
        let user = ctx.user(email).await;
        let address = ctx.shipping_address(&user).await;
        ctx.state
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
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(OrderError::Stock(shortfalls)) => {
                assert_eq!(shortfalls[0].available, 0);
                rejected += 1;
            }
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!((placed, rejected), (1, 1));
    let product = ctx.store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_never_oversell() {
    let ctx = Arc::new(TestContext::new());
    let product = ctx.product("Limited Brooch", "120.00", "0", 3).await;

    let mut shoppers = Vec::new();
    for n in 0..8 {
        let user = ctx.user(&format!("buyer{n}@example.com")).await;
        let address = ctx.shipping_address(&user).await;
        ctx.state
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
                    .is_ok()
            })
        })
        .collect();

    let mut placed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            placed += 1;
        }
    }

    assert_eq!(placed, 3);
    let product = ctx.store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_double_submit_places_one_order() {
    let ctx = Arc::new(TestContext::new());
    let product = ctx.product("Velvet Cape", "250.00", "0", 5).await;
    let user = ctx.user("double@example.com").await;
    let address = ctx.shipping_address(&user).await;
    ctx.state
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

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let user = user.clone();
            let address = address.clone();
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
            Err(OrderError::CartChanged | OrderError::EmptyCart) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(placed, 1);
    let product = ctx.store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 4);
    assert_eq!(ctx.state.orders().list_own_orders(user.id).await.unwrap().len(), 1);
}
