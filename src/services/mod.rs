pub mod addresses;
pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod coupons;
pub mod orders;
pub mod payments;
pub mod reviews;
pub mod wishlist;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{auth::AuthService, config::AppConfig, events::EventSender};

use addresses::AddressService;
use carts::CartService;
use catalog::CatalogService;
use checkout::{CheckoutService, CheckoutUrls};
use coupons::CouponService;
use orders::OrderService;
use payments::{PaymentGateway, PaymentReconciliationService};
use reviews::ReviewService;
use wishlist::WishlistService;

/// Aggregated service layer shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub auth: Arc<AuthService>,
    pub addresses: Arc<AddressService>,
    pub catalog: Arc<CatalogService>,
    pub coupons: Arc<CouponService>,
    pub carts: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub payments: Arc<PaymentReconciliationService>,
    pub orders: Arc<OrderService>,
    pub reviews: Arc<ReviewService>,
    pub wishlist: Arc<WishlistService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        config: &AppConfig,
    ) -> Self {
        let auth = Arc::new(AuthService::new(
            db.clone(),
            config.jwt_secret.clone(),
            config.jwt_expiration,
            config.seller_email.clone(),
            config.seller_password.clone(),
        ));
        let orders = Arc::new(OrderService::new(db.clone(), event_sender.clone()));
        let checkout = Arc::new(CheckoutService::new(
            db.clone(),
            event_sender.clone(),
            gateway,
            CheckoutUrls {
                success_url: config.checkout_success_url.clone(),
                cancel_url: config.checkout_cancel_url.clone(),
            },
        ));

        Self {
            auth,
            addresses: Arc::new(AddressService::new(db.clone())),
            catalog: Arc::new(CatalogService::new(db.clone(), event_sender.clone())),
            coupons: Arc::new(CouponService::new(db.clone())),
            carts: Arc::new(CartService::new(db.clone())),
            checkout,
            payments: Arc::new(PaymentReconciliationService::new(
                db.clone(),
                event_sender.clone(),
            )),
            orders: orders.clone(),
            reviews: Arc::new(ReviewService::new(db.clone(), orders, event_sender)),
            wishlist: Arc::new(WishlistService::new(db)),
        }
    }
}
