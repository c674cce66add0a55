mod common;

use common::{seed_product, seed_user, TestApp};
use rust_decimal_macros::dec;
use oakline_api::{
    auth::{LoginInput, RegisterInput},
    errors::ServiceError,
    services::catalog::CreateProductInput,
    services::coupons::CreateCouponInput,
};

#[tokio::test]
async fn register_login_round_trip() {
    let app = TestApp::new().await;
    let auth = &app.state.services.auth;

    let (user, token) = auth
        .register(RegisterInput {
            name: "Quinn".to_string(),
            email: "quinn@example.com".to_string(),
            password: "a-long-password".to_string(),
        })
        .await
        .expect("registration should succeed");
    assert!(!token.is_empty());
    assert!(!user.has_used_first_order_coupon);

    // Duplicate email is a conflict.
    let err = auth
        .register(RegisterInput {
            name: "Quinn Again".to_string(),
            email: "quinn@example.com".to_string(),
            password: "another-password".to_string(),
        })
        .await
        .expect_err("duplicate email must be rejected");
    assert!(matches!(err, ServiceError::Conflict(_)));

    let (logged_in, _token) = auth
        .login(LoginInput {
            email: "quinn@example.com".to_string(),
            password: "a-long-password".to_string(),
        })
        .await
        .expect("login should succeed");
    assert_eq!(logged_in.id, user.id);

    let err = auth
        .login(LoginInput {
            email: "quinn@example.com".to_string(),
            password: "wrong-password".to_string(),
        })
        .await
        .expect_err("bad password must be rejected");
    assert!(matches!(err, ServiceError::Unauthorized(_)));
}

#[tokio::test]
async fn cart_snapshot_round_trip_and_popularity_bump() {
    let app = TestApp::new().await;
    let user_id = seed_user(&app).await;
    let p1 = seed_product(&app, "Lounge Chair", dec!(150), 5).await;
    let p2 = seed_product(&app, "Ottoman", dec!(60), 5).await;
    let carts = &app.state.services.carts;

    let snapshot = serde_json::json!({ p1.to_string(): 2 });
    carts.replace_cart(user_id, snapshot.clone()).await.unwrap();
    assert_eq!(carts.get_cart(user_id).await.unwrap(), snapshot);

    // Adding a second product bumps only the newcomer's counter.
    let snapshot = serde_json::json!({ p1.to_string(): 3, p2.to_string(): 1 });
    carts.replace_cart(user_id, snapshot).await.unwrap();

    let catalog = &app.state.services.catalog;
    assert_eq!(catalog.get_product(p1).await.unwrap().times_in_cart, 1);
    assert_eq!(catalog.get_product(p2).await.unwrap().times_in_cart, 1);

    // Malformed snapshots are rejected.
    let err = carts
        .replace_cart(user_id, serde_json::json!([1, 2, 3]))
        .await
        .expect_err("non-object cart must be rejected");
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn wishlist_add_is_idempotent() {
    let app = TestApp::new().await;
    let user_id = seed_user(&app).await;
    let product_id = seed_product(&app, "Floor Mirror", dec!(210), 2).await;
    let wishlist = &app.state.services.wishlist;

    wishlist.add(user_id, product_id).await.unwrap();
    wishlist.add(user_id, product_id).await.unwrap();
    assert_eq!(wishlist.list(user_id).await.unwrap().len(), 1);

    wishlist.remove(user_id, product_id).await.unwrap();
    assert!(wishlist.list(user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn coupon_seeding_is_idempotent_and_creation_validates() {
    let app = TestApp::new().await;
    let coupons = &app.state.services.coupons;

    coupons.seed_defaults().await.unwrap();
    coupons.seed_defaults().await.unwrap();
    assert_eq!(coupons.list_coupons().await.unwrap().len(), 4);

    // Duplicate codes (case-insensitively) are rejected.
    let err = coupons
        .create_coupon(CreateCouponInput {
            code: "first15".to_string(),
            discount: dec!(20),
            min_purchase: dec!(0),
            one_time_use: false,
        })
        .await
        .expect_err("duplicate code must be rejected");
    assert!(matches!(err, ServiceError::Conflict(_)));

    let err = coupons
        .create_coupon(CreateCouponInput {
            code: "TOOBIG".to_string(),
            discount: dec!(150),
            min_purchase: dec!(0),
            one_time_use: false,
        })
        .await
        .expect_err("discount over 100% must be rejected");
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn catalog_restock_and_availability() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.catalog;

    let product = catalog
        .create_product(CreateProductInput {
            name: "Walnut Sideboard".to_string(),
            description: "Wide sideboard with soft-close doors".to_string(),
            category: "Dining".to_string(),
            images: vec!["https://cdn.test/sideboard.jpg".to_string()],
            price: dec!(900),
            offer_price: dec!(750),
            stock: 0,
        })
        .await
        .expect("product creation should succeed");
    assert!(!product.in_stock);

    let restocked = catalog.restock(product.id, 6).await.unwrap();
    assert_eq!(restocked.stock, 6);
    assert!(restocked.in_stock);

    let hidden = catalog.set_availability(product.id, false).await.unwrap();
    assert!(!hidden.in_stock);
    assert_eq!(hidden.stock, 6);

    // Offer price above list price is rejected.
    let err = catalog
        .create_product(CreateProductInput {
            name: "Mispriced Stool".to_string(),
            description: "d".to_string(),
            category: "c".to_string(),
            images: vec![],
            price: dec!(100),
            offer_price: dec!(120),
            stock: 1,
        })
        .await
        .expect_err("offer price above list price must be rejected");
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}
