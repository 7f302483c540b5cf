//! End-to-end tests through the HTTP router.
//!
//! Requests go through the full middleware stack (sessions, security
//! headers, request ids) with in-memory backends.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::{Value, json};

use amyfairy_integration_tests::{TEST_PASSWORD, TestClient, TestContext, signed_callback};
use amyfairy_storefront::gateway::CallbackStatus;

async fn register(client: &mut TestClient, email: &str) -> Value {
    let res = client
        .post(
            "/auth/register",
            json!({ "email": email, "password": TEST_PASSWORD, "name": "Amy" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    res.body
}

async fn login(client: &mut TestClient, email: &str) {
    let res = client
        .post(
            "/auth/login",
            json!({ "email": email, "password": TEST_PASSWORD }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
}

async fn add_address(client: &mut TestClient, email: &str) -> i64 {
    let res = client
        .post(
            "/users/own/addresses",
            json!({
                "name": "Amy Fairy",
                "email": email,
                "phone": "9876543210",
                "street": "12 MG Road",
                "city": "Bengaluru",
                "state": "Karnataka",
                "pin_code": "560001"
            }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    res.body["id"].as_i64().unwrap()
}

// =============================================================================
// Health & Middleware
// =============================================================================

#[tokio::test]
async fn test_health_and_readiness() {
    let ctx = TestContext::new();
    let mut client = TestClient::new(ctx.router());

    assert_eq!(client.get("/health").await.status, StatusCode::OK);
    assert_eq!(client.get("/health/ready").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_responses_carry_request_id_and_security_headers() {
    let ctx = TestContext::new();
    let mut client = TestClient::new(ctx.router());

    let res = client.get("/products").await;

    assert!(res.headers.contains_key("x-request-id"));
    assert_eq!(res.headers["x-content-type-options"], "nosniff");
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
async fn test_register_login_check_logout() {
    let ctx = TestContext::new();
    let mut client = TestClient::new(ctx.router());

    let user = register(&mut client, "amy@example.com").await;
    assert_eq!(user["email"], "amy@example.com");
    assert_eq!(user["role"], "user");

    let res = client.get("/auth/check").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["id"], user["id"]);

    let res = client.post("/auth/logout", json!({})).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert_eq!(client.get("/auth/check").await.status, StatusCode::UNAUTHORIZED);

    login(&mut client, "amy@example.com").await;
    assert_eq!(client.get("/auth/check").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_auth_errors_are_json() {
    let ctx = TestContext::new();
    let mut client = TestClient::new(ctx.router());
    register(&mut client, "dup@example.com").await;

    let res = client
        .post(
            "/auth/register",
            json!({ "email": "dup@example.com", "password": TEST_PASSWORD, "name": "Amy" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert!(res.body["error"].is_string());

    let res = client
        .post(
            "/auth/login",
            json!({ "email": "dup@example.com", "password": "wrong password" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = client.post("/auth/login", json!({ "email": 42 })).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["error"].is_string());
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let ctx = TestContext::new();
    let mut client = TestClient::new(ctx.router());

    for uri in ["/cart", "/orders/own", "/users/own"] {
        let res = client.get(uri).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(res.body["error"], "Authentication required");
    }
}

#[tokio::test]
async fn test_admin_routes_reject_shoppers() {
    let ctx = TestContext::new();
    let mut client = TestClient::new(ctx.router());
    register(&mut client, "shopper@example.com").await;

    assert_eq!(client.get("/admin/orders").await.status, StatusCode::FORBIDDEN);
    let res = client
        .post(
            "/admin/products",
            json!({ "title": "X", "price": 1, "stock": 1, "brand": "b", "category": "c" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_product_listing_sends_total_count() {
    let ctx = TestContext::new();
    for n in 0..3 {
        ctx.product(&format!("Dress {n}"), "200.00", "15", 3).await;
    }
    let mut client = TestClient::new(ctx.router());

    let res = client.get("/products?per_page=2&sort=price&order=desc").await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers["x-total-count"], "3");
    assert_eq!(res.body["items"].as_array().unwrap().len(), 2);
    assert_eq!(res.body["items"][0]["discounted_price"], "170.00");
}

#[tokio::test]
async fn test_bad_query_and_missing_product() {
    let ctx = TestContext::new();
    let mut client = TestClient::new(ctx.router());

    let res = client.get("/products?sort=popularity").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["error"].is_string());

    let res = client.get("/products/9999").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = client.get("/products/not-a-number").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_manages_catalog_over_http() {
    let ctx = TestContext::new();
    ctx.admin("boss@example.com").await;
    let mut client = TestClient::new(ctx.router());
    login(&mut client, "boss@example.com").await;

    let res = client
        .post(
            "/admin/products",
            json!({
                "title": "Emerald Gown",
                "price": "300.00",
                "discount_percentage": 10,
                "stock": 2,
                "brand": "Amy",
                "category": "dresses"
            }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    let id = res.body["id"].as_i64().unwrap();

    let res = client
        .patch(&format!("/admin/products/{id}"), json!({ "stock": 5 }))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["stock"], 5);

    let res = client.delete(&format!("/admin/products/{id}")).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert_eq!(
        client.get(&format!("/products/{id}")).await.status,
        StatusCode::NOT_FOUND
    );

    let res = client.get("/admin/products?include_deleted=true").await;
    assert_eq!(res.headers["x-total-count"], "1");
    assert_eq!(res.body["items"][0]["deleted"], true);
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn test_cash_checkout_over_http() {
    let ctx = TestContext::new();
    let product = ctx.product("Silk Wrap Dress", "200.00", "15", 3).await;
    let mut client = TestClient::new(ctx.router());
    register(&mut client, "buyer@example.com").await;
    let address_id = add_address(&mut client, "buyer@example.com").await;

    let res = client
        .post("/cart", json!({ "product_id": product.id }))
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    let item_id = res.body["id"].as_i64().unwrap();

    let res = client
        .patch(&format!("/cart/{item_id}"), json!({ "quantity": 2 }))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["line_total"], "340.00");

    let res = client.get("/cart").await;
    assert_eq!(res.body["total_amount"], "340.00");
    assert_eq!(res.body["total_items"], 2);

    let res = client
        .post(
            "/orders",
            json!({ "address_id": address_id, "payment_method": "cash" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    assert_eq!(res.body["order"]["status"], "pending");
    assert_eq!(res.body["order"]["total_amount"], "340.00");
    assert!(res.body["payment"].is_null());

    let res = client.get("/cart").await;
    assert!(res.body["items"].as_array().unwrap().is_empty());

    let res = client.get("/orders/own").await;
    assert_eq!(res.body.as_array().unwrap().len(), 1);

    let res = client.get("/products").await;
    assert_eq!(res.body["items"][0]["stock"], 1);
}

#[tokio::test]
async fn test_stock_error_lists_shortfalls() {
    let ctx = TestContext::new();
    let product = ctx.product("Only One Left", "50.00", "0", 1).await;
    let mut client = TestClient::new(ctx.router());
    register(&mut client, "greedy@example.com").await;
    let address_id = add_address(&mut client, "greedy@example.com").await;

    let res = client
        .post("/cart", json!({ "product_id": product.id }))
        .await;
    let item_id = res.body["id"].as_i64().unwrap();

    let res = client
        .patch(&format!("/cart/{item_id}"), json!({ "quantity": 2 }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    // Someone else buys the last unit between cart and checkout.
    let other = ctx.user("quick@example.com").await;
    let address = ctx.shipping_address(&other).await;
    ctx.state
        .cart()
        .add_item(
            other.id,
            &amyfairy_storefront::services::AddToCart {
                product_id: product.id,
                color: None,
                size: None,
            },
        )
        .await
        .unwrap();
    ctx.state
        .orders()
        .place_order(&other, address, amyfairy_core::PaymentMethod::Cash)
        .await
        .unwrap();

    let res = client
        .post(
            "/orders",
            json!({ "address_id": address_id, "payment_method": "cash" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.body["shortfalls"][0]["available"], 0);
    assert_eq!(res.body["shortfalls"][0]["requested"], 1);
}

#[tokio::test]
async fn test_card_checkout_and_callback_over_http() {
    let ctx = TestContext::new();
    let admin = ctx.admin("fulfil@example.com").await;
    let product = ctx.product("Velvet Blazer", "200.00", "15", 3).await;
    let mut client = TestClient::new(ctx.router());
    register(&mut client, "cardholder@example.com").await;
    let address_id = add_address(&mut client, "cardholder@example.com").await;

    client
        .post("/cart", json!({ "product_id": product.id }))
        .await;
    let res = client
        .post(
            "/orders",
            json!({ "address_id": address_id, "payment_method": "card" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    assert_eq!(res.body["payment"]["amount_minor"], 17_000);
    let order_id = res.body["order"]["id"].as_i64().unwrap();
    let transaction_id = res.body["payment"]["transaction_id"]
        .as_str()
        .unwrap()
        .to_string();

    let res = client
        .post(&format!("/payments/{order_id}/initiate"), json!({}))
        .await;
    assert_eq!(res.body["transaction_id"], transaction_id.as_str());

    let callback = signed_callback(&transaction_id, "pay_http", CallbackStatus::Captured);
    let body = json!({
        "transaction_id": callback.transaction_id,
        "payment_id": callback.payment_id,
        "status": "captured",
        "signature": callback.signature,
    });

    // The callback needs no session.
    let mut gateway = TestClient::new(ctx.router());
    let res = gateway.post("/payments/callback", body.clone()).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["outcome"], "applied");

    let res = gateway.post("/payments/callback", body).await;
    assert_eq!(res.body["outcome"], "already_reconciled");

    let res = gateway
        .post(
            "/payments/callback",
            json!({
                "transaction_id": transaction_id,
                "payment_id": "pay_http",
                "status": "captured",
                "signature": "deadbeef",
            }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = client.get(&format!("/orders/{order_id}")).await;
    assert_eq!(res.body["payment_confirmed"], true);

    let order = ctx
        .state
        .orders()
        .update_order_status(
            &admin,
            amyfairy_core::OrderId::new(order_id),
            amyfairy_core::OrderStatus::Dispatched,
        )
        .await
        .unwrap();
    assert_eq!(order.status, amyfairy_core::OrderStatus::Dispatched);
}

#[tokio::test]
async fn test_admin_status_update_over_http() {
    let ctx = TestContext::new();
    ctx.admin("ops@example.com").await;
    let product = ctx.product("Linen Trousers", "60.00", "0", 4).await;
    let mut shopper = TestClient::new(ctx.router());
    register(&mut shopper, "pants@example.com").await;
    let address_id = add_address(&mut shopper, "pants@example.com").await;
    shopper
        .post("/cart", json!({ "product_id": product.id }))
        .await;
    let res = shopper
        .post(
            "/orders",
            json!({ "address_id": address_id, "payment_method": "cash" }),
        )
        .await;
    let order_id = res.body["order"]["id"].as_i64().unwrap();

    let mut admin = TestClient::new(ctx.router());
    login(&mut admin, "ops@example.com").await;

    let res = admin
        .patch(
            &format!("/admin/orders/{order_id}/status"),
            json!({ "status": "delivered" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);

    let res = admin
        .patch(
            &format!("/admin/orders/{order_id}/status"),
            json!({ "status": "dispatched" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "dispatched");

    let res = admin.get("/admin/orders").await;
    assert_eq!(res.headers["x-total-count"], "1");
}
