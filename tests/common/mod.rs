//! Test harness: application state backed by a throwaway SQLite database.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use tokio::sync::mpsc;
use uuid::Uuid;

use oakline_api::{
    config::AppConfig,
    db,
    entities::{address, coupon, product, user},
    errors::ServiceError,
    events::{self, EventSender},
    services::payments::{
        CheckoutSessionHandle, CreateSessionRequest, PaymentGateway,
    },
    services::AppServices,
    AppState,
};

/// Gateway stub: always succeeds and hands back a deterministic URL.
pub struct StubGateway;

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_checkout_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<CheckoutSessionHandle, ServiceError> {
        Ok(CheckoutSessionHandle {
            url: format!("https://pay.test/session/{}", request.metadata.order_id),
        })
    }
}

pub struct TestApp {
    pub state: AppState,
    db_file: String,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Fresh database, migrations applied, stub payment gateway wired in.
    pub async fn new() -> Self {
        let db_file = format!("oakline_test_{}.db", Uuid::new_v4().simple());

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_file),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            3600,
            "127.0.0.1".to_string(),
            18080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.payment_webhook_secret = Some("whsec_test".to_string());

        let pool = db::establish_connection(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (tx, rx) = mpsc::channel(1024);
        let event_sender = EventSender::new(tx);
        let event_task = tokio::spawn(events::process_events(rx));

        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            Some(Arc::new(StubGateway)),
            &cfg,
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        Self {
            state,
            db_file,
            _event_task: event_task,
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.db_file, suffix));
        }
    }
}

#[allow(dead_code)]
pub async fn seed_product(app: &TestApp, name: &str, offer_price: Decimal, stock: i32) -> Uuid {
    let id = Uuid::new_v4();
    let now = Utc::now();
    product::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        description: Set("Solid wood, oiled finish".to_string()),
        category: Set("Living Room".to_string()),
        images: Set(serde_json::json!(["https://cdn.test/p.jpg"])),
        price: Set(offer_price + Decimal::from(50)),
        offer_price: Set(offer_price),
        stock: Set(stock),
        in_stock: Set(stock > 0),
        rating: Set(0.0),
        num_reviews: Set(0),
        times_in_cart: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*app.state.db)
    .await
    .expect("failed to seed product");
    id
}

#[allow(dead_code)]
pub async fn seed_user(app: &TestApp) -> Uuid {
    let id = Uuid::new_v4();
    let now = Utc::now();
    user::ActiveModel {
        id: Set(id),
        name: Set("Test Shopper".to_string()),
        email: Set(format!("shopper+{}@example.com", id.simple())),
        password_hash: Set("unused-in-these-tests".to_string()),
        cart_items: Set(serde_json::json!({})),
        has_used_first_order_coupon: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*app.state.db)
    .await
    .expect("failed to seed user");
    id
}

#[allow(dead_code)]
pub async fn seed_address(app: &TestApp, user_id: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    address::ActiveModel {
        id: Set(id),
        user_id: Set(user_id),
        first_name: Set("Test".to_string()),
        last_name: Set("Shopper".to_string()),
        email: Set("shopper@example.com".to_string()),
        street: Set("1 Elm Street".to_string()),
        city: Set("Portland".to_string()),
        state: Set("OR".to_string()),
        zip_code: Set("97201".to_string()),
        country: Set("US".to_string()),
        phone: Set("555-0100".to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(&*app.state.db)
    .await
    .expect("failed to seed address");
    id
}

#[allow(dead_code)]
pub async fn seed_coupon(
    app: &TestApp,
    code: &str,
    discount: Decimal,
    min_purchase: Decimal,
    one_time_use: bool,
) {
    coupon::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code.to_string()),
        discount: Set(discount),
        min_purchase: Set(min_purchase),
        one_time_use: Set(one_time_use),
        created_at: Set(Utc::now()),
    }
    .insert(&*app.state.db)
    .await
    .expect("failed to seed coupon");
}
