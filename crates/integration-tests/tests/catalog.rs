//! Integration tests for catalog listing and administrator edits.

#![allow(clippy::unwrap_used)]

use amyfairy_integration_tests::{TestContext, dec};
use amyfairy_storefront::models::{ProductDraft, ProductPatch, ProductQuery, ProductSort, SortOrder};
use amyfairy_storefront::services::{AddToCart, CartError, CatalogError};

fn draft(title: &str, brand: &str, category: &str, price: &str, stock: i32) -> ProductDraft {
    ProductDraft {
        title: title.to_string(),
        description: String::new(),
        price: dec(price),
        discount_percentage: dec("0"),
        rating: dec("4.0"),
        stock,
        brand: brand.to_string(),
        category: category.to_string(),
        colors: Vec::new(),
        sizes: Vec::new(),
        thumbnail: String::new(),
        images: Vec::new(),
    }
}

async fn seeded() -> TestContext {
    let ctx = TestContext::new();
    for d in [
        draft("Rose Midi Dress", "Amy", "dresses", "120.00", 4),
        draft("Ivory Blouse", "Fairy", "tops", "45.00", 0),
        draft("Navy Maxi Dress", "Fairy", "dresses", "150.00", 2),
        draft("Striped Tee", "Amy", "tops", "20.00", 9),
        draft("Pleated Skirt", "Lumen", "skirts", "60.00", 3),
    ] {
        ctx.product_with(d).await;
    }
    ctx
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn test_filters_combine() {
    let ctx = seeded().await;
    let query = ProductQuery {
        categories: vec!["dresses".to_string(), "tops".to_string()],
        brands: vec!["Fairy".to_string()],
        ..ProductQuery::default()
    };

    let page = ctx.state.catalog().list_products(&query).await.unwrap();
    let titles: Vec<&str> = page.items.iter().map(|p| p.title.as_str()).collect();

    assert_eq!(page.total, 2);
    assert_eq!(titles, ["Ivory Blouse", "Navy Maxi Dress"]);
}

#[tokio::test]
async fn test_in_stock_and_search() {
    let ctx = seeded().await;
    let query = ProductQuery {
        search: Some("dress".to_string()),
        in_stock_only: true,
        ..ProductQuery::default()
    };
    assert_eq!(ctx.state.catalog().list_products(&query).await.unwrap().total, 2);

    let query = ProductQuery {
        in_stock_only: true,
        ..ProductQuery::default()
    };
    let page = ctx.state.catalog().list_products(&query).await.unwrap();
    assert!(page.items.iter().all(|p| p.stock > 0));
    assert_eq!(page.total, 4);
}

#[tokio::test]
async fn test_sort_and_paging() {
    let ctx = seeded().await;
    let query = ProductQuery {
        sort: ProductSort::Price,
        order: SortOrder::Desc,
        page: 2,
        per_page: 2,
        ..ProductQuery::default()
    };

    let page = ctx.state.catalog().list_products(&query).await.unwrap();
    let prices: Vec<_> = page.items.iter().map(|p| p.price).collect();

    assert_eq!(page.total, 5);
    assert_eq!(prices, [dec("60.00"), dec("45.00")]);
}

#[tokio::test]
async fn test_facets_are_sorted_and_distinct() {
    let ctx = seeded().await;
    assert_eq!(
        ctx.state.catalog().brands().await.unwrap(),
        ["Amy", "Fairy", "Lumen"]
    );
    assert_eq!(
        ctx.state.catalog().categories().await.unwrap(),
        ["dresses", "skirts", "tops"]
    );
}

// =============================================================================
// Administration
// =============================================================================

#[tokio::test]
async fn test_soft_delete_hides_product_from_shoppers() {
    let ctx = seeded().await;
    let admin = ctx.admin("catalog@example.com").await;
    let shopper = ctx.user("browser@example.com").await;
    let skirt = ctx.product_with(draft("Tulle Skirt", "Lumen", "skirts", "70.00", 5)).await;

    ctx.state.catalog().delete_product(&admin, skirt.id).await.unwrap();
    // Idempotent.
    ctx.state.catalog().delete_product(&admin, skirt.id).await.unwrap();

    let public = ctx
        .state
        .catalog()
        .list_products(&ProductQuery::default())
        .await
        .unwrap();
    assert!(public.items.iter().all(|p| p.id != skirt.id));
    assert!(matches!(
        ctx.state.catalog().get_product(skirt.id).await,
        Err(CatalogError::NotFound)
    ));

    let admin_view = ctx
        .state
        .catalog()
        .list_products_admin(
            &admin,
            &ProductQuery {
                include_deleted: true,
                per_page: 100,
                ..ProductQuery::default()
            },
        )
        .await
        .unwrap();
    assert!(admin_view.items.iter().any(|p| p.id == skirt.id && p.deleted));

    let err = ctx
        .state
        .cart()
        .add_item(
            shopper.id,
            &AddToCart {
                product_id: skirt.id,
                color: None,
                size: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::ProductNotFound));
}

#[tokio::test]
async fn test_shoppers_cannot_edit_catalog() {
    let ctx = seeded().await;
    let shopper = ctx.user("nope@example.com").await;
    let catalog = ctx.state.catalog();

    assert!(matches!(
        catalog
            .create_product(&shopper, &draft("Fake", "X", "y", "1.00", 1))
            .await,
        Err(CatalogError::Forbidden)
    ));
    assert!(matches!(
        catalog
            .list_products_admin(&shopper, &ProductQuery::default())
            .await,
        Err(CatalogError::Forbidden)
    ));
}

#[tokio::test]
async fn test_admin_edits_are_validated() {
    let ctx = seeded().await;
    let admin = ctx.admin("editor@example.com").await;
    let product = ctx.product("Lace Camisole", "35.00", "0", 3).await;
    let catalog = ctx.state.catalog();

    let err = catalog
        .update_product(
            &admin,
            product.id,
            &ProductPatch {
                discount_percentage: Some(dec("120")),
                ..ProductPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Invalid(_)));

    let err = catalog
        .create_product(&admin, &draft("Negative", "X", "y", "1.00", -1))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Invalid(_)));

    let updated = catalog
        .update_product(
            &admin,
            product.id,
            &ProductPatch {
                stock: Some(12),
                ..ProductPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.stock, 12);
    assert_eq!(updated.title, "Lace Camisole");
}

#[tokio::test]
async fn test_variant_selection_is_checked() {
    let ctx = TestContext::new();
    let shopper = ctx.user("variant@example.com").await;
    let product = ctx
        .product_with(ProductDraft {
            colors: vec!["red".to_string(), "black".to_string()],
            sizes: vec!["S".to_string(), "M".to_string()],
            ..draft("Party Dress", "Amy", "dresses", "90.00", 4)
        })
        .await;
    let cart = ctx.state.cart();

    let missing = AddToCart {
        product_id: product.id,
        color: Some("red".to_string()),
        size: None,
    };
    assert!(matches!(
        cart.add_item(shopper.id, &missing).await,
        Err(CartError::InvalidVariant(_))
    ));

    let red_small = AddToCart {
        size: Some("S".to_string()),
        ..missing
    };
    cart.add_item(shopper.id, &red_small).await.unwrap();
    assert!(matches!(
        cart.add_item(shopper.id, &red_small).await,
        Err(CartError::DuplicateItem)
    ));

    let black_small = AddToCart {
        color: Some("black".to_string()),
        ..red_small
    };
    cart.add_item(shopper.id, &black_small).await.unwrap();
    assert_eq!(cart.list_items(shopper.id).await.unwrap().items.len(), 2);
}
