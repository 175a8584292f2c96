//! Order lifecycle, authorization and immutability against the in-memory
//! store.

#![allow(clippy::unwrap_used)]

use toyshop_core::{
    Caller, OrderId, OrderStatus, PaymentStatus, PaymentUpdate, Price, ShippingAddress,
};
use toyshop_integration_tests::{TestApp, admin, customer, dec, seed_product};
use toyshop_storefront::config::StorefrontConfig;
use toyshop_storefront::models::{Order, Product, ProductPatch};
use toyshop_storefront::services::{CommerceError, OrderLineRequest, OrderPolicy, PlaceOrder};

fn address() -> ShippingAddress {
    ShippingAddress {
        address: "1 Toy Lane".to_owned(),
        city: "Playville".to_owned(),
        postal_code: "12345".to_owned(),
        country: "Toyland".to_owned(),
    }
}

fn request(lines: &[(&Product, i64)]) -> PlaceOrder {
    PlaceOrder {
        order_items: lines
            .iter()
            .map(|(product, quantity)| OrderLineRequest {
                product_id: product.id,
                quantity: *quantity,
            })
            .collect(),
        shipping_address: address(),
        ..PlaceOrder::default()
    }
}

async fn place(app: &TestApp, caller: &Caller, lines: &[(&Product, i64)]) -> Order {
    app.state.orders().create(caller, request(lines)).await.unwrap()
}

// ============================================================================
// Creation Tests
// ============================================================================

#[tokio::test]
async fn test_order_snapshots_catalog_prices() {
    let app = TestApp::new();
    let train = seed_product(app.store(), "Train", "Brio", "40", 5).await;
    let duck = seed_product(app.store(), "Duck", "Quackers", "2.50", 50).await;

    let order = place(&app, &customer(1), &[(&train, 1), (&duck, 4)]).await;
    assert_eq!(order.total_price.amount(), dec("50"));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment.status, PaymentStatus::Pending);
    assert_eq!(order.payment.method, "Dummy");
    assert_eq!(order.order_items[0].name, "Train");
    assert_eq!(order.order_items[1].unit_price.amount(), dec("2.50"));
}

#[tokio::test]
async fn test_duplicate_lines_are_merged() {
    let app = TestApp::new();
    let ball = seed_product(app.store(), "Ball", "Bouncy", "3", 50).await;
    let bat = seed_product(app.store(), "Bat", "Slugger", "20", 5).await;

    let order = place(&app, &customer(1), &[(&ball, 1), (&bat, 1), (&ball, 2)]).await;
    assert_eq!(order.order_items.len(), 2);
    assert_eq!(order.order_items[0].product_id, ball.id);
    assert_eq!(order.order_items[0].quantity.get(), 3);
    assert_eq!(order.total_price.amount(), dec("29"));
}

#[tokio::test]
async fn test_rejected_orders() {
    let app = TestApp::new();
    let kite = seed_product(app.store(), "Kite", "Skyward", "10", 5).await;
    let orders = app.state.orders();
    let caller = customer(1);

    let empty = PlaceOrder {
        shipping_address: address(),
        ..PlaceOrder::default()
    };
    assert!(matches!(
        orders.create(&caller, empty).await,
        Err(CommerceError::InvalidInput(_))
    ));

    assert!(matches!(
        orders.create(&caller, request(&[(&kite, 0)])).await,
        Err(CommerceError::InvalidInput(_))
    ));

    let no_city = PlaceOrder {
        shipping_address: ShippingAddress {
            city: " ".to_owned(),
            ..address()
        },
        ..request(&[(&kite, 1)])
    };
    assert!(matches!(
        orders.create(&caller, no_city).await,
        Err(CommerceError::InvalidInput(_))
    ));

    let wrong_total = PlaceOrder {
        total_price: Some(Price::new(dec("9.99")).unwrap()),
        ..request(&[(&kite, 1)])
    };
    assert!(matches!(
        orders.create(&caller, wrong_total).await,
        Err(CommerceError::InvalidInput(_))
    ));

    let mut unknown = request(&[(&kite, 1)]);
    unknown.order_items[0].product_id = toyshop_core::ProductId::new(404);
    assert!(matches!(
        orders.create(&caller, unknown).await,
        Err(CommerceError::NotFound(_))
    ));

    assert!(orders.list_mine(&caller).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_matching_client_total_is_accepted() {
    let app = TestApp::new();
    let kite = seed_product(app.store(), "Kite", "Skyward", "10", 5).await;

    let order = app
        .state
        .orders()
        .create(
            &customer(1),
            PlaceOrder {
                total_price: Some(Price::new(dec("20.00")).unwrap()),
                ..request(&[(&kite, 2)])
            },
        )
        .await
        .unwrap();
    assert_eq!(order.total_price.amount(), dec("20"));
}

// ============================================================================
// Immutability Tests
// ============================================================================

#[tokio::test]
async fn test_order_items_survive_catalog_changes() {
    let app = TestApp::new();
    let robot = seed_product(app.store(), "Robot", "Bolt", "60", 2).await;
    let order = place(&app, &customer(1), &[(&robot, 1)]).await;

    app.state
        .catalog()
        .update(
            &admin(99),
            robot.id,
            ProductPatch {
                name: Some("Robot Mk II".to_owned()),
                price: Some(Price::new(dec("80")).unwrap()),
                ..ProductPatch::default()
            },
        )
        .await
        .unwrap();
    app.state.catalog().delete(&admin(99), robot.id).await.unwrap();

    let stored = app.state.orders().get(&customer(1), order.id).await.unwrap();
    assert_eq!(stored.order_items, order.order_items);
    assert_eq!(stored.total_price.amount(), dec("60"));
}

#[tokio::test]
async fn test_state_changes_leave_items_untouched() {
    let app = TestApp::new();
    let drum = seed_product(app.store(), "Drum", "Boom", "25", 3).await;
    let order = place(&app, &customer(1), &[(&drum, 2)]).await;
    let orders = app.state.orders();

    orders
        .update_status(&admin(99), order.id, OrderStatus::Processing)
        .await
        .unwrap();
    let updated = orders
        .update_payment(
            &customer(1),
            order.id,
            &PaymentUpdate {
                status: Some(PaymentStatus::Paid),
                ..PaymentUpdate::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.order_items, order.order_items);
    assert_eq!(updated.total_price, order.total_price);
    assert_eq!(updated.shipping_address, order.shipping_address);
    assert_eq!(updated.status, OrderStatus::Processing);
}

// ============================================================================
// State Machine Tests
// ============================================================================

#[tokio::test]
async fn test_status_walks_forward_one_step_at_a_time() {
    let app = TestApp::new();
    let flute = seed_product(app.store(), "Flute", "Toot", "9", 3).await;
    let order = place(&app, &customer(1), &[(&flute, 1)]).await;
    let orders = app.state.orders();
    let staff = admin(99);

    assert!(matches!(
        orders.update_status(&staff, order.id, OrderStatus::Shipped).await,
        Err(CommerceError::InvalidInput(_))
    ));

    for next in [
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        let updated = orders.update_status(&staff, order.id, next).await.unwrap();
        assert_eq!(updated.status, next);
    }

    assert!(matches!(
        orders.update_status(&staff, order.id, OrderStatus::Cancelled).await,
        Err(CommerceError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_only_admins_change_status() {
    let app = TestApp::new();
    let flute = seed_product(app.store(), "Flute", "Toot", "9", 3).await;
    let order = place(&app, &customer(1), &[(&flute, 1)]).await;
    let orders = app.state.orders();

    assert!(matches!(
        orders.update_status(&customer(1), order.id, OrderStatus::Cancelled).await,
        Err(CommerceError::Unauthorized(_))
    ));
    assert!(matches!(
        orders.update_status(&customer(1), OrderId::new(404), OrderStatus::Cancelled).await,
        Err(CommerceError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_paid_at_is_set_once_and_payment_is_terminal() {
    let app = TestApp::new();
    let yoyo = seed_product(app.store(), "Yo-yo", "Spinny", "4", 30).await;
    let owner = customer(1);
    let order = place(&app, &owner, &[(&yoyo, 1)]).await;
    let orders = app.state.orders();

    let paid = orders
        .update_payment(
            &owner,
            order.id,
            &PaymentUpdate {
                status: Some(PaymentStatus::Paid),
                transaction_id: Some("txn-1".to_owned()),
                ..PaymentUpdate::default()
            },
        )
        .await
        .unwrap();
    let paid_at = paid.payment.paid_at.unwrap();

    let relabelled = orders
        .update_payment(
            &owner,
            order.id,
            &PaymentUpdate {
                method: Some("Card".to_owned()),
                ..PaymentUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(relabelled.payment.paid_at, Some(paid_at));
    assert_eq!(relabelled.payment.method, "Card");
    assert_eq!(relabelled.payment.transaction_id.as_deref(), Some("txn-1"));

    assert!(matches!(
        orders
            .update_payment(
                &owner,
                order.id,
                &PaymentUpdate {
                    status: Some(PaymentStatus::Failed),
                    ..PaymentUpdate::default()
                },
            )
            .await,
        Err(CommerceError::InvalidInput(_))
    ));
}

// ============================================================================
// Authorization Tests
// ============================================================================

#[tokio::test]
async fn test_orders_are_private_to_their_owner() {
    let app = TestApp::new();
    let doll = seed_product(app.store(), "Doll", "Cuddly", "18", 3).await;
    let order = place(&app, &customer(1), &[(&doll, 1)]).await;
    let orders = app.state.orders();

    assert!(matches!(
        orders.get(&customer(2), order.id).await,
        Err(CommerceError::Unauthorized(_))
    ));
    assert!(matches!(
        orders.get(&customer(2), OrderId::new(404)).await,
        Err(CommerceError::NotFound(_))
    ));
    assert!(orders.get(&admin(99), order.id).await.is_ok());

    assert!(matches!(
        orders.update_payment(&customer(2), order.id, &PaymentUpdate::default()).await,
        Err(CommerceError::Unauthorized(_))
    ));
    assert!(matches!(
        orders.delete(&customer(2), order.id).await,
        Err(CommerceError::Unauthorized(_))
    ));

    assert!(orders.list_mine(&customer(2)).await.unwrap().is_empty());
    assert_eq!(orders.list_mine(&customer(1)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_all_is_admin_only() {
    let app = TestApp::new();
    let doll = seed_product(app.store(), "Doll", "Cuddly", "18", 3).await;
    place(&app, &customer(1), &[(&doll, 1)]).await;
    place(&app, &customer(2), &[(&doll, 2)]).await;
    let orders = app.state.orders();

    assert!(matches!(
        orders.list_all(&customer(1)).await,
        Err(CommerceError::Unauthorized(_))
    ));

    let all = orders.list_all(&admin(99)).await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|details| details.products.len() == 1));
}

// ============================================================================
// Deletion Policy Tests
// ============================================================================

async fn shipped_order(app: &TestApp) -> Order {
    let drone = seed_product(app.store(), "Drone", "Skyward", "90", 3).await;
    let order = place(app, &customer(1), &[(&drone, 1)]).await;
    for next in [OrderStatus::Processing, OrderStatus::Shipped] {
        app.state
            .orders()
            .update_status(&admin(99), order.id, next)
            .await
            .unwrap();
    }
    order
}

#[tokio::test]
async fn test_owner_may_delete_shipped_order_by_default() {
    let app = TestApp::new();
    let order = shipped_order(&app).await;

    app.state.orders().delete(&customer(1), order.id).await.unwrap();
    assert!(matches!(
        app.state.orders().get(&customer(1), order.id).await,
        Err(CommerceError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_restrictive_policy_blocks_owner_but_not_admin() {
    let app = TestApp::with_config(StorefrontConfig {
        order_policy: OrderPolicy {
            owner_cancel_after_shipment: false,
        },
        ..StorefrontConfig::default()
    });
    let order = shipped_order(&app).await;
    let orders = app.state.orders();

    assert!(matches!(
        orders.delete(&customer(1), order.id).await,
        Err(CommerceError::Conflict(_))
    ));
    orders.delete(&admin(99), order.id).await.unwrap();
}
