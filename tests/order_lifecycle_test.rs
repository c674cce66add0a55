mod common;

use common::{seed_address, seed_product, seed_user, TestApp};
use rust_decimal_macros::dec;
use oakline_api::{
    entities::order::{OrderStatus, PaymentType},
    errors::ServiceError,
    services::checkout::{OrderLineInput, PlaceOrderInput},
    services::reviews::CreateReviewInput,
};
use uuid::Uuid;

async fn place_cod_order(app: &TestApp, product_id: Uuid) -> (Uuid, Uuid) {
    let user_id = seed_user(app).await;
    let address_id = seed_address(app, user_id).await;
    let placed = app
        .state
        .services
        .checkout
        .place_order(
            user_id,
            PlaceOrderInput {
                items: vec![OrderLineInput {
                    product_id,
                    quantity: 1,
                }],
                address_id,
                coupon_code: None,
            },
            PaymentType::Cod,
        )
        .await
        .expect("placement should succeed");
    (user_id, placed.order.id)
}

#[tokio::test]
async fn status_advances_through_the_fulfilment_chain() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Bed Frame", dec!(700), 3).await;
    let (_user_id, order_id) = place_cod_order(&app, product_id).await;
    let orders = &app.state.services.orders;

    for status in [
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        let updated = orders.update_status(order_id, status).await.unwrap();
        assert_eq!(updated.status, status);
    }

    // Delivered is terminal.
    let err = orders
        .update_status(order_id, OrderStatus::Cancelled)
        .await
        .expect_err("terminal state must not transition");
    assert!(matches!(err, ServiceError::InvalidStatus(_)));
}

#[tokio::test]
async fn skipping_states_is_rejected() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Dresser", dec!(450), 3).await;
    let (_user_id, order_id) = place_cod_order(&app, product_id).await;

    let err = app
        .state
        .services
        .orders
        .update_status(order_id, OrderStatus::Shipped)
        .await
        .expect_err("OrderPlaced -> Shipped must be rejected");
    assert!(matches!(err, ServiceError::InvalidStatus(_)));
}

#[tokio::test]
async fn cancel_is_reachable_from_any_non_terminal_state() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Nightstand", dec!(120), 6).await;
    let orders = &app.state.services.orders;

    let (_u, placed_order) = place_cod_order(&app, product_id).await;
    orders
        .update_status(placed_order, OrderStatus::Cancelled)
        .await
        .expect("cancel from OrderPlaced");

    let (_u, shipped_order) = place_cod_order(&app, product_id).await;
    orders
        .update_status(shipped_order, OrderStatus::Processing)
        .await
        .unwrap();
    orders
        .update_status(shipped_order, OrderStatus::Shipped)
        .await
        .unwrap();
    orders
        .update_status(shipped_order, OrderStatus::Cancelled)
        .await
        .expect("cancel from Shipped");
}

#[tokio::test]
async fn cod_presents_as_paid_only_once_delivered() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Console Table", dec!(220), 3).await;
    let (user_id, order_id) = place_cod_order(&app, product_id).await;
    let orders = &app.state.services.orders;

    let listed = orders.list_user_orders(user_id).await.unwrap();
    assert!(!listed[0].paid_for_display);

    orders
        .update_status(order_id, OrderStatus::Processing)
        .await
        .unwrap();
    orders
        .update_status(order_id, OrderStatus::Shipped)
        .await
        .unwrap();
    orders
        .update_status(order_id, OrderStatus::Delivered)
        .await
        .unwrap();

    let listed = orders.list_user_orders(user_id).await.unwrap();
    assert!(listed[0].paid_for_display);
}

#[tokio::test]
async fn reviews_are_gated_on_delivery() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Reading Chair", dec!(340), 4).await;
    let (user_id, order_id) = place_cod_order(&app, product_id).await;
    let reviews = &app.state.services.reviews;

    // Not yet delivered: no review, and the probe agrees.
    let err = reviews
        .create_review(
            user_id,
            CreateReviewInput {
                product_id,
                rating: 5,
                comment: "Wonderful".to_string(),
            },
        )
        .await
        .expect_err("review before delivery must be rejected");
    assert!(matches!(err, ServiceError::Forbidden(_)));
    let probe = reviews.eligibility(user_id, product_id).await.unwrap();
    assert!(!probe.can_review);

    // Deliver, then review.
    let orders = &app.state.services.orders;
    orders
        .update_status(order_id, OrderStatus::Processing)
        .await
        .unwrap();
    orders
        .update_status(order_id, OrderStatus::Shipped)
        .await
        .unwrap();
    orders
        .update_status(order_id, OrderStatus::Delivered)
        .await
        .unwrap();

    let review = reviews
        .create_review(
            user_id,
            CreateReviewInput {
                product_id,
                rating: 4,
                comment: "Solid and comfortable".to_string(),
            },
        )
        .await
        .expect("review after delivery should succeed");
    assert_eq!(review.rating, 4);

    // Second review of the same product is a conflict.
    let err = reviews
        .create_review(
            user_id,
            CreateReviewInput {
                product_id,
                rating: 5,
                comment: "Again".to_string(),
            },
        )
        .await
        .expect_err("duplicate review must be rejected");
    assert!(matches!(err, ServiceError::Conflict(_)));

    // The product aggregate tracks the review.
    let product = app
        .state
        .services
        .catalog
        .get_product(product_id)
        .await
        .unwrap();
    assert_eq!(product.num_reviews, 1);
    assert!((product.rating - 4.0).abs() < f32::EPSILON);

    let probe = reviews.eligibility(user_id, product_id).await.unwrap();
    assert!(probe.can_review);
    assert!(probe.has_reviewed);
}

#[tokio::test]
async fn review_update_recomputes_the_product_rating() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Accent Chair", dec!(180), 4).await;
    let (user_id, order_id) = place_cod_order(&app, product_id).await;
    let orders = &app.state.services.orders;
    orders
        .update_status(order_id, OrderStatus::Processing)
        .await
        .unwrap();
    orders
        .update_status(order_id, OrderStatus::Shipped)
        .await
        .unwrap();
    orders
        .update_status(order_id, OrderStatus::Delivered)
        .await
        .unwrap();

    let reviews = &app.state.services.reviews;
    let review = reviews
        .create_review(
            user_id,
            CreateReviewInput {
                product_id,
                rating: 2,
                comment: "Wobbly".to_string(),
            },
        )
        .await
        .unwrap();

    reviews
        .update_review(
            user_id,
            review.id,
            oakline_api::services::reviews::UpdateReviewInput {
                rating: Some(5),
                comment: Some("Fixed with the replacement leg".to_string()),
            },
        )
        .await
        .unwrap();

    let product = app
        .state
        .services
        .catalog
        .get_product(product_id)
        .await
        .unwrap();
    assert!((product.rating - 5.0).abs() < f32::EPSILON);

    let listed = reviews.list_for_product(product_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].review.rating, 5);
    assert_eq!(listed[0].author_name.as_deref(), Some("Test Shopper"));
}
