//! Cart merging and wishlist set semantics against the in-memory store.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use tokio::sync::Barrier;
use toyshop_core::{Price, ProductId, Quantity};
use toyshop_integration_tests::{TestApp, admin, customer, dec, seed_product};
use toyshop_storefront::models::ProductPatch;
use toyshop_storefront::services::CommerceError;

fn qty(n: i64) -> Quantity {
    Quantity::new(n).unwrap()
}

// ============================================================================
// Cart Tests
// ============================================================================

#[tokio::test]
async fn test_adding_twice_merges_quantities() {
    let app = TestApp::new();
    let train = seed_product(app.store(), "Train", "Brio", "12.50", 5).await;
    let caller = customer(1);
    let carts = app.state.carts();

    carts.add(&caller, train.id, qty(2)).await.unwrap();
    let view = carts.add(&caller, train.id, qty(3)).await.unwrap();

    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity.get(), 5);
    assert_eq!(view.item_count, 5);
    assert_eq!(view.subtotal.amount(), dec("62.50"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_are_all_counted() {
    let app = TestApp::new();
    let duck = seed_product(app.store(), "Rubber Duck", "Quackers", "3", 100).await;
    let start = Arc::new(Barrier::new(20));

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let state = app.state.clone();
        let start = Arc::clone(&start);
        tasks.push(tokio::spawn(async move {
            start.wait().await;
            state.carts().add(&customer(7), duck.id, qty(1)).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let view = app.state.carts().read(&customer(7)).await.unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity.get(), 20);
}

#[tokio::test]
async fn test_reading_a_missing_cart_creates_nothing() {
    let app = TestApp::new();
    let carts = app.state.carts();

    let view = carts.read(&customer(3)).await.unwrap();
    assert!(view.id.is_none());
    assert!(view.items.is_empty());
    assert_eq!(view.subtotal, Price::ZERO);

    assert!(carts.read(&customer(3)).await.unwrap().id.is_none());
}

#[tokio::test]
async fn test_cart_reflects_live_prices() {
    let app = TestApp::new();
    let kite = seed_product(app.store(), "Kite", "Skyward", "10", 5).await;
    let caller = customer(1);
    app.state.carts().add(&caller, kite.id, qty(2)).await.unwrap();

    app.state
        .catalog()
        .update(
            &admin(99),
            kite.id,
            ProductPatch {
                price: Some(Price::new(dec("15")).unwrap()),
                ..ProductPatch::default()
            },
        )
        .await
        .unwrap();

    let view = app.state.carts().read(&caller).await.unwrap();
    assert_eq!(view.items[0].line_total.amount(), dec("30"));
    assert_eq!(view.subtotal.amount(), dec("30"));
}

#[tokio::test]
async fn test_set_quantity_and_remove() {
    let app = TestApp::new();
    let ball = seed_product(app.store(), "Ball", "Bouncy", "2", 50).await;
    let bat = seed_product(app.store(), "Bat", "Slugger", "20", 5).await;
    let caller = customer(4);
    let carts = app.state.carts();

    assert!(matches!(
        carts.set_quantity(&caller, ball.id, qty(1)).await,
        Err(CommerceError::NotFound(_))
    ));

    carts.add(&caller, ball.id, qty(1)).await.unwrap();
    let view = carts.set_quantity(&caller, ball.id, qty(9)).await.unwrap();
    assert_eq!(view.items[0].quantity.get(), 9);

    assert!(matches!(
        carts.remove(&caller, bat.id).await,
        Err(CommerceError::NotFound(_))
    ));

    let view = carts.remove(&caller, ball.id).await.unwrap();
    assert!(view.items.is_empty());
}

#[tokio::test]
async fn test_adding_unknown_product() {
    let app = TestApp::new();
    let result = app
        .state
        .carts()
        .add(&customer(1), ProductId::new(404), qty(1))
        .await;
    assert!(matches!(result, Err(CommerceError::NotFound(_))));
}

#[tokio::test]
async fn test_deleting_a_product_drops_cart_and_wishlist_lines() {
    let app = TestApp::new();
    let robot = seed_product(app.store(), "Robot", "Bolt", "60", 2).await;
    let blocks = seed_product(app.store(), "Blocks", "Stackers", "8", 9).await;
    let caller = customer(5);

    app.state.carts().add(&caller, robot.id, qty(1)).await.unwrap();
    app.state.carts().add(&caller, blocks.id, qty(2)).await.unwrap();
    app.state.wishlists().add(&caller, robot.id).await.unwrap();

    app.state.catalog().delete(&admin(99), robot.id).await.unwrap();

    let cart = app.state.carts().read(&caller).await.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].product_id, blocks.id);
    assert!(app.state.wishlists().read(&caller).await.unwrap().products.is_empty());
}

// ============================================================================
// Wishlist Tests
// ============================================================================

#[tokio::test]
async fn test_wishlist_add_is_idempotent() {
    let app = TestApp::new();
    let doll = seed_product(app.store(), "Doll", "Cuddly", "18", 3).await;
    let caller = customer(2);
    let wishlists = app.state.wishlists();

    wishlists.add(&caller, doll.id).await.unwrap();
    let view = wishlists.add(&caller, doll.id).await.unwrap();
    assert_eq!(view.products.len(), 1);
}

#[tokio::test]
async fn test_wishlist_keeps_insertion_order() {
    let app = TestApp::new();
    let first = seed_product(app.store(), "Drum", "Boom", "25", 3).await;
    let second = seed_product(app.store(), "Flute", "Toot", "9", 3).await;
    let caller = customer(2);
    let wishlists = app.state.wishlists();

    wishlists.add(&caller, second.id).await.unwrap();
    let view = wishlists.add(&caller, first.id).await.unwrap();
    let ids: Vec<_> = view.products.iter().map(|p| p.id).collect();
    assert_eq!(ids, [second.id, first.id]);
}

#[tokio::test]
async fn test_wishlist_remove_absent_product_succeeds() {
    let app = TestApp::new();
    let caller = customer(2);
    let view = app
        .state
        .wishlists()
        .remove(&caller, ProductId::new(404))
        .await
        .unwrap();
    assert!(view.products.is_empty());
}
