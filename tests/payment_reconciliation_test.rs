mod common;

use common::{seed_address, seed_coupon, seed_product, seed_user, TestApp};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use oakline_api::{
    entities::{order, Order, OrderItem, Product, User},
    services::checkout::{OrderLineInput, PlaceOrderInput},
};
use uuid::Uuid;

async fn place_online_order(
    app: &TestApp,
    user_id: Uuid,
    address_id: Uuid,
    product_id: Uuid,
    coupon_code: Option<&str>,
) -> order::Model {
    app.state
        .services
        .checkout
        .place_order(
            user_id,
            PlaceOrderInput {
                items: vec![OrderLineInput {
                    product_id,
                    quantity: 2,
                }],
                address_id,
                coupon_code: coupon_code.map(str::to_string),
            },
            order::PaymentType::Online,
        )
        .await
        .expect("online placement should succeed")
        .order
}

#[tokio::test]
async fn success_notification_marks_paid_and_clears_cart() {
    let app = TestApp::new().await;
    let user_id = seed_user(&app).await;
    let address_id = seed_address(&app, user_id).await;
    let product_id = seed_product(&app, "Walnut Desk", dec!(300), 5).await;

    // The buyer has a persisted cart snapshot at payment time.
    app.state
        .services
        .carts
        .replace_cart(user_id, serde_json::json!({ product_id.to_string(): 2 }))
        .await
        .unwrap();

    let placed = place_online_order(&app, user_id, address_id, product_id, None).await;

    app.state
        .services
        .payments
        .handle_payment_succeeded(placed.id, user_id)
        .await
        .unwrap();

    let order = Order::find_by_id(placed.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(order.is_paid);

    let cart = app.state.services.carts.get_cart(user_id).await.unwrap();
    assert_eq!(cart, serde_json::json!({}));
}

#[tokio::test]
async fn success_notification_is_idempotent() {
    let app = TestApp::new().await;
    let user_id = seed_user(&app).await;
    let address_id = seed_address(&app, user_id).await;
    let product_id = seed_product(&app, "Walnut Desk", dec!(300), 5).await;
    let placed = place_online_order(&app, user_id, address_id, product_id, None).await;

    // At-least-once delivery: the duplicate must be a silent no-op.
    for _ in 0..2 {
        app.state
            .services
            .payments
            .handle_payment_succeeded(placed.id, user_id)
            .await
            .expect("redelivery must not error");
    }

    let order = Order::find_by_id(placed.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(order.is_paid);
    let cart = app.state.services.carts.get_cart(user_id).await.unwrap();
    assert_eq!(cart, serde_json::json!({}));
}

#[tokio::test]
async fn failure_notification_compensates_stock_coupon_and_order() {
    let app = TestApp::new().await;
    let user_id = seed_user(&app).await;
    let address_id = seed_address(&app, user_id).await;
    let product_id = seed_product(&app, "Walnut Desk", dec!(300), 5).await;
    seed_coupon(&app, "FIRST15", dec!(15), dec!(0), true).await;

    let placed = place_online_order(&app, user_id, address_id, product_id, Some("FIRST15")).await;

    // Placement reserved stock and consumed the one-time coupon.
    assert_eq!(
        Product::find_by_id(product_id)
            .one(&*app.state.db)
            .await
            .unwrap()
            .unwrap()
            .stock,
        3
    );
    assert!(User::find_by_id(user_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap()
        .has_used_first_order_coupon);

    app.state
        .services
        .payments
        .handle_payment_failed(placed.id)
        .await
        .unwrap();

    // Order and its lines are gone.
    assert!(Order::find_by_id(placed.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .is_none());
    assert!(OrderItem::find().all(&*app.state.db).await.unwrap().is_empty());

    // Compensation is symmetric with commit: stock back, flag cleared.
    let product = Product::find_by_id(product_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.stock, 5);
    assert!(product.in_stock);
    assert!(!User::find_by_id(user_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap()
        .has_used_first_order_coupon);
}

#[tokio::test]
async fn failure_notification_is_idempotent() {
    let app = TestApp::new().await;
    let user_id = seed_user(&app).await;
    let address_id = seed_address(&app, user_id).await;
    let product_id = seed_product(&app, "Walnut Desk", dec!(300), 5).await;
    let placed = place_online_order(&app, user_id, address_id, product_id, None).await;

    for _ in 0..2 {
        app.state
            .services
            .payments
            .handle_payment_failed(placed.id)
            .await
            .expect("redelivery must not error");
    }

    // Stock restored exactly once.
    assert_eq!(
        Product::find_by_id(product_id)
            .one(&*app.state.db)
            .await
            .unwrap()
            .unwrap()
            .stock,
        5
    );
}

#[tokio::test]
async fn notifications_for_unknown_orders_are_acknowledged() {
    let app = TestApp::new().await;
    let user_id = seed_user(&app).await;

    app.state
        .services
        .payments
        .handle_payment_succeeded(Uuid::new_v4(), user_id)
        .await
        .expect("unknown order success must be acked");
    app.state
        .services
        .payments
        .handle_payment_failed(Uuid::new_v4())
        .await
        .expect("unknown order failure must be acked");
}

mod webhook_http {
    use super::common::TestApp;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use hmac::{Hmac, Mac};
    use http_body_util::BodyExt;
    use sha2::Sha256;
    use tower::ServiceExt;

    fn signed_headers(secret: &str, payload: &str) -> (String, String) {
        let ts = chrono::Utc::now().timestamp().to_string();
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", ts, payload).as_bytes());
        let sig = hex::encode(mac.finalize().into_bytes());
        (ts, sig)
    }

    #[tokio::test]
    async fn webhook_rejects_bad_signatures_before_touching_state() {
        let app = TestApp::new().await;
        let router = oakline_api::api_v1_routes().with_state(app.state.clone());

        let payload = r#"{"type":"payment_intent.succeeded","data":{"object":{"metadata":{}}}}"#;
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/payments/webhook")
                    .header("stripe-signature", "t=1,v1=deadbeef")
                    .header("content-type", "application/json")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let err: oakline_api::errors::ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.error, "Unauthorized");
    }

    #[tokio::test]
    async fn webhook_acknowledges_unhandled_event_kinds() {
        let app = TestApp::new().await;
        let router = oakline_api::api_v1_routes().with_state(app.state.clone());

        let payload = r#"{"type":"charge.refunded","data":{"object":{}}}"#;
        let (ts, sig) = signed_headers("whsec_test", payload);
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/payments/webhook")
                    .header("stripe-signature", format!("t={},v1={}", ts, sig))
                    .header("content-type", "application/json")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
