//! Order placement.
//!
//! Turns a cart + address + optional coupon into a committed order while
//! protecting two invariants: stock never goes negative, and a one-time
//! coupon is consumed at most once per account. The stock check, pricing
//! reads, stock decrement, order insertion and coupon-flag write all run
//! inside one database transaction; the external payment session is opened
//! only after commit.

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::{
        address::Entity as Address,
        coupon::{self, Entity as Coupon},
        order::{self, OrderStatus, PaymentType},
        order_item,
        product::{self, Entity as Product},
        user::{self, Entity as User},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::payments::{
        discount_minor_units, CreateSessionRequest, PaymentGateway, SessionLineItem,
        SessionMetadata,
    },
};

/// Flat sales tax applied after discount.
const TAX_RATE: Decimal = dec!(0.02);

#[derive(Debug, Clone, Deserialize)]
pub struct OrderLineInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderInput {
    pub items: Vec<OrderLineInput>,
    pub address_id: Uuid,
    pub coupon_code: Option<String>,
}

/// Outcome of a successful placement. `payment_url` is present for online
/// orders only; the caller redirects the shopper there.
#[derive(Debug)]
pub struct PlacedOrder {
    pub order: order::Model,
    pub payment_url: Option<String>,
}

/// Redirect targets handed to the payment gateway.
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    pub success_url: String,
    pub cancel_url: String,
}

struct PricedLine {
    product: product::Model,
    quantity: i32,
}

struct AppliedCoupon {
    code: String,
    one_time_use: bool,
    discount: Decimal,
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    urls: CheckoutUrls,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        urls: CheckoutUrls,
    ) -> Self {
        Self {
            db,
            event_sender,
            gateway,
            urls,
        }
    }

    /// Places an order. On return the order is committed (stock decremented,
    /// ledger entry written, one-time coupon consumed); for online payment
    /// the gateway session has additionally been opened.
    #[instrument(skip(self, input), fields(user_id = %user_id, lines = input.items.len(), payment_type = ?payment_type))]
    pub async fn place_order(
        &self,
        user_id: Uuid,
        input: PlaceOrderInput,
        payment_type: PaymentType,
    ) -> Result<PlacedOrder, ServiceError> {
        if input.items.is_empty() {
            return Err(ServiceError::InvalidInput("Invalid data".to_string()));
        }
        if input.items.iter().any(|line| line.quantity < 1) {
            return Err(ServiceError::InvalidInput(
                "Quantity must be at least 1".to_string(),
            ));
        }
        if payment_type == PaymentType::Online && self.gateway.is_none() {
            return Err(ServiceError::PaymentFailed(
                "Online payment is not configured".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let user = User::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        Address::find_by_id(input.address_id)
            .filter(crate::entities::address::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Address not found".to_string()))?;

        // Stock check + pricing reads. The conditional decrement below
        // re-validates at write time; this pass exists to fail fast with the
        // offending product's name and to price the order.
        let mut lines = Vec::with_capacity(input.items.len());
        let mut subtotal = Decimal::ZERO;
        for line in &input.items {
            let product = Product::find_by_id(line.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;
            if product.stock < line.quantity {
                return Err(ServiceError::InsufficientStock(product.name));
            }
            subtotal += product.offer_price * Decimal::from(line.quantity);
            lines.push(PricedLine {
                product,
                quantity: line.quantity,
            });
        }

        let applied = match &input.coupon_code {
            Some(code) => self.resolve_coupon(&txn, &user, code, subtotal).await?,
            None => None,
        };
        let discount = applied.as_ref().map(|c| c.discount).unwrap_or(Decimal::ZERO);

        let mut amount = subtotal - discount;
        amount += (amount * TAX_RATE).floor();

        let now = Utc::now();
        for line in &lines {
            let result = Product::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).sub(line.quantity),
                )
                .col_expr(
                    product::Column::InStock,
                    Expr::expr(Expr::col(product::Column::Stock).sub(line.quantity)).gt(0),
                )
                .col_expr(product::Column::UpdatedAt, Expr::value(now))
                .filter(product::Column::Id.eq(line.product.id))
                .filter(product::Column::Stock.gte(line.quantity))
                .exec(&txn)
                .await?;
            // Stock moved underneath us since the check above; abort whole.
            if result.rows_affected == 0 {
                return Err(ServiceError::InsufficientStock(line.product.name.clone()));
            }
        }

        let order_id = Uuid::new_v4();
        let order_model = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(format!(
                "ORD-{}",
                order_id.to_string()[..8].to_uppercase()
            )),
            user_id: Set(user_id),
            address_id: Set(input.address_id),
            amount: Set(amount),
            payment_type: Set(payment_type),
            status: Set(OrderStatus::OrderPlaced),
            is_paid: Set(false),
            coupon_applied: Set(applied.is_some()),
            coupon_code: Set(applied.as_ref().map(|c| c.code.clone())),
            discount_amount: Set(discount),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let order = order_model.insert(&txn).await?;

        for line in &lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product.id),
                quantity: Set(line.quantity),
                unit_price: Set(line.product.offer_price),
            };
            item.insert(&txn).await?;
        }

        if let Some(coupon) = applied.as_ref().filter(|c| c.one_time_use) {
            let result = User::update_many()
                .col_expr(user::Column::HasUsedFirstOrderCoupon, Expr::value(true))
                .col_expr(user::Column::UpdatedAt, Expr::value(now))
                .filter(user::Column::Id.eq(user_id))
                .filter(user::Column::HasUsedFirstOrderCoupon.eq(false))
                .exec(&txn)
                .await?;
            // A concurrent order consumed the coupon between our read and
            // this write; roll the whole placement back.
            if result.rows_affected == 0 {
                warn!(code = %coupon.code, "one-time coupon consumed concurrently");
                return Err(ServiceError::CouponAlreadyUsed);
            }
        }

        txn.commit().await?;

        info!(order_id = %order_id, amount = %order.amount, "order placed");
        let _ = self.event_sender.send(Event::OrderCreated(order_id)).await;
        for line in &lines {
            let _ = self
                .event_sender
                .send(Event::StockDecremented {
                    product_id: line.product.id,
                    quantity: line.quantity,
                })
                .await;
        }
        if let Some(coupon) = applied.as_ref() {
            let _ = self
                .event_sender
                .send(Event::CouponRedeemed {
                    code: coupon.code.clone(),
                    order_id,
                })
                .await;
        }

        let payment_url = match payment_type {
            PaymentType::Cod => None,
            PaymentType::Online => Some(
                self.open_payment_session(&order, &lines, discount, applied.is_some())
                    .await?,
            ),
        };

        Ok(PlacedOrder { order, payment_url })
    }

    /// Coupon resolution inside the placement transaction. Unknown codes are
    /// a hard error; a known coupon under its purchase threshold silently
    /// does not apply.
    async fn resolve_coupon(
        &self,
        txn: &DatabaseTransaction,
        user: &user::Model,
        code: &str,
        subtotal: Decimal,
    ) -> Result<Option<AppliedCoupon>, ServiceError> {
        let code = code.trim();
        let coupon = find_coupon_by_code(txn, code)
            .await?
            .ok_or_else(|| ServiceError::InvalidCoupon(code.to_string()))?;

        if coupon.one_time_use && user.has_used_first_order_coupon {
            return Err(ServiceError::CouponAlreadyUsed);
        }

        if subtotal < coupon.min_purchase {
            info!(code = %coupon.code, %subtotal, min_purchase = %coupon.min_purchase,
                "cart under coupon threshold; proceeding without discount");
            return Ok(None);
        }

        let discount = subtotal * coupon.discount / Decimal::from(100);
        Ok(Some(AppliedCoupon {
            code: coupon.code,
            one_time_use: coupon.one_time_use,
            discount,
        }))
    }

    async fn open_payment_session(
        &self,
        order: &order::Model,
        lines: &[PricedLine],
        discount: Decimal,
        coupon_applied: bool,
    ) -> Result<String, ServiceError> {
        let gateway = self
            .gateway
            .as_ref()
            .ok_or_else(|| ServiceError::PaymentFailed("Online payment is not configured".into()))?;

        let mut line_items: Vec<SessionLineItem> = lines
            .iter()
            .map(|line| SessionLineItem {
                name: line.product.name.clone(),
                unit_amount_minor: unit_amount_with_tax(line.product.offer_price),
                quantity: i64::from(line.quantity),
            })
            .collect();
        if coupon_applied {
            line_items.push(SessionLineItem {
                name: "Discount".to_string(),
                unit_amount_minor: -discount_minor_units(discount),
                quantity: 1,
            });
        }

        let session = gateway
            .create_checkout_session(CreateSessionRequest {
                line_items,
                success_url: self.urls.success_url.clone(),
                cancel_url: self.urls.cancel_url.clone(),
                metadata: SessionMetadata {
                    order_id: order.id,
                    user_id: order.user_id,
                },
            })
            .await
            .map_err(|e| {
                // The order is committed and stays in the ledger unpaid; it
                // remains invisible to listings until reconciled or swept.
                warn!(order_id = %order.id, error = %e, "payment session creation failed after commit");
                e
            })?;

        Ok(session.url)
    }
}

/// Case-insensitive coupon lookup, usable inside or outside a transaction.
pub async fn find_coupon_by_code<C: ConnectionTrait>(
    conn: &C,
    code: &str,
) -> Result<Option<coupon::Model>, ServiceError> {
    Ok(Coupon::find()
        .filter(
            Expr::expr(Func::upper(Expr::col(coupon::Column::Code)))
                .eq(code.trim().to_uppercase()),
        )
        .one(conn)
        .await?)
}

/// Per-line gateway price: offer price inflated by the same flat tax,
/// floored, in minor currency units.
fn unit_amount_with_tax(offer_price: Decimal) -> i64 {
    ((offer_price + offer_price * TAX_RATE).floor() * Decimal::from(100))
        .to_i64()
        .unwrap_or(0)
}
