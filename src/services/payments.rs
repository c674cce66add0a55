//! Payment gateway seam and webhook reconciliation.
//!
//! The gateway is a black box behind [`PaymentGateway`]: checkout opens a
//! payable session and the gateway later notifies us asynchronously. The
//! reconciliation service applies those notifications; it is invoked
//! at-least-once and must stay idempotent per order.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::{
        coupon::{self, Entity as Coupon},
        order::{self, Entity as Order},
        order_item,
        product::{self, Entity as ProductEntity},
        user::{self, Entity as User},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// One line of a gateway checkout session, in minor currency units.
#[derive(Debug, Clone)]
pub struct SessionLineItem {
    pub name: String,
    pub unit_amount_minor: i64,
    pub quantity: i64,
}

/// Opaque metadata attached to a session; echoed back in notifications.
#[derive(Debug, Clone, Copy)]
pub struct SessionMetadata {
    pub order_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    pub line_items: Vec<SessionLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: SessionMetadata,
}

/// Redirect handle returned to the storefront client.
#[derive(Debug, Clone)]
pub struct CheckoutSessionHandle {
    pub url: String,
}

/// External payment gateway capability: create a payable session, notify
/// asynchronously on success/failure.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<CheckoutSessionHandle, ServiceError>;
}

/// Stripe-checkout implementation of the gateway seam.
pub struct StripeCheckoutGateway {
    client: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeCheckoutGateway {
    pub fn new(secret_key: String, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            secret_key,
            api_base: "https://api.stripe.com/v1".to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct StripeSessionResponse {
    url: String,
}

#[async_trait]
impl PaymentGateway for StripeCheckoutGateway {
    #[instrument(skip(self, request), fields(order_id = %request.metadata.order_id))]
    async fn create_checkout_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<CheckoutSessionHandle, ServiceError> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), request.success_url),
            ("cancel_url".into(), request.cancel_url),
            (
                "metadata[order_id]".into(),
                request.metadata.order_id.to_string(),
            ),
            (
                "metadata[user_id]".into(),
                request.metadata.user_id.to_string(),
            ),
            // Propagated onto the payment intent so webhook events carry the
            // metadata directly and reconciliation needs no gateway read-back.
            (
                "payment_intent_data[metadata][order_id]".into(),
                request.metadata.order_id.to_string(),
            ),
            (
                "payment_intent_data[metadata][user_id]".into(),
                request.metadata.user_id.to_string(),
            ),
        ];

        for (i, item) in request.line_items.iter().enumerate() {
            form.push((
                format!("line_items[{}][price_data][currency]", i),
                "usd".into(),
            ));
            form.push((
                format!("line_items[{}][price_data][product_data][name]", i),
                item.name.clone(),
            ));
            form.push((
                format!("line_items[{}][price_data][unit_amount]", i),
                item.unit_amount_minor.to_string(),
            ));
            form.push((format!("line_items[{}][quantity]", i), item.quantity.to_string()));
        }

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| ServiceError::PaymentFailed(format!("gateway unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "gateway rejected session creation");
            return Err(ServiceError::PaymentFailed(format!(
                "gateway returned {}: {}",
                status, body
            )));
        }

        let session: StripeSessionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::PaymentFailed(format!("malformed gateway response: {}", e)))?;

        Ok(CheckoutSessionHandle { url: session.url })
    }
}

/// Applies asynchronous gateway outcomes to the order ledger.
#[derive(Clone)]
pub struct PaymentReconciliationService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl PaymentReconciliationService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Marks the order paid and clears the buyer's cart snapshot. Safe to
    /// re-deliver: setting an already-true flag and clearing an already
    /// empty cart are both no-ops.
    #[instrument(skip(self), fields(order_id = %order_id, user_id = %user_id))]
    pub async fn handle_payment_succeeded(
        &self,
        order_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let Some(order) = Order::find_by_id(order_id).one(&txn).await? else {
            // Deleted (failed and compensated) or never existed; ack anyway
            // so the gateway stops retrying.
            warn!(order_id = %order_id, "success notification for unknown order");
            return Ok(());
        };

        let already_paid = order.is_paid;
        if !already_paid {
            let mut active: order::ActiveModel = order.into();
            active.is_paid = Set(true);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?;
        }

        User::update_many()
            .col_expr(user::Column::CartItems, Expr::value(serde_json::json!({})))
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user::Column::Id.eq(user_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        if already_paid {
            info!(order_id = %order_id, "duplicate success notification; no-op");
        } else {
            let _ = self.event_sender.send(Event::OrderPaid(order_id)).await;
            let _ = self.event_sender.send(Event::CartCleared(user_id)).await;
        }
        Ok(())
    }

    /// Compensates a failed online payment symmetrically with placement:
    /// restores every line's stock, clears the one-time-coupon flag when
    /// the order had consumed it, and deletes the order outright.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn handle_payment_failed(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let Some(order) = Order::find_by_id(order_id).one(&txn).await? else {
            info!(order_id = %order_id, "failure notification for unknown order; no-op");
            return Ok(());
        };

        let items = order
            .find_related(order_item::Entity)
            .all(&txn)
            .await?;

        for item in &items {
            ProductEntity::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).add(item.quantity),
                )
                .col_expr(product::Column::InStock, Expr::value(true))
                .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(product::Column::Id.eq(item.product_id))
                .exec(&txn)
                .await?;
        }

        if order.coupon_applied {
            if let Some(code) = &order.coupon_code {
                let coupon = Coupon::find()
                    .filter(coupon::Column::Code.eq(code.clone()))
                    .one(&txn)
                    .await?;
                if coupon.map(|c| c.one_time_use).unwrap_or(false) {
                    User::update_many()
                        .col_expr(
                            user::Column::HasUsedFirstOrderCoupon,
                            Expr::value(false),
                        )
                        .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
                        .filter(user::Column::Id.eq(order.user_id))
                        .exec(&txn)
                        .await?;
                }
            }
        }

        order_item::Entity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        Order::delete_by_id(order_id).exec(&txn).await?;

        txn.commit().await?;

        for item in &items {
            let _ = self
                .event_sender
                .send(Event::StockRestored {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .await;
        }
        let _ = self.event_sender.send(Event::OrderDeleted(order_id)).await;
        Ok(())
    }
}

/// Discount expressed in gateway minor units, matching the storefront's
/// rounding: `floor(amount × 100)`.
pub fn discount_minor_units(discount: Decimal) -> i64 {
    use rust_decimal::prelude::ToPrimitive;
    (discount * Decimal::from(100))
        .floor()
        .to_i64()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn discount_rounds_down_to_minor_units() {
        assert_eq!(discount_minor_units(dec!(100)), 10000);
        assert_eq!(discount_minor_units(dec!(82.425)), 8242);
        assert_eq!(discount_minor_units(dec!(0)), 0);
    }
}
