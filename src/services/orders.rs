//! Order projections and the seller-driven status lifecycle.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        address,
        order::{self, Entity as Order, OrderStatus},
        order_item::{self, Entity as OrderItem},
        product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// An order line joined with its product for display.
#[derive(Debug, Serialize)]
pub struct OrderLineDetails {
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub unit_price: rust_decimal::Decimal,
}

/// Full order projection returned to both the customer and the seller.
#[derive(Debug, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: order::Model,
    /// COD orders present as paid once delivered.
    pub paid_for_display: bool,
    pub items: Vec<OrderLineDetails>,
    pub address: Option<address::Model>,
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Orders visible to one customer, newest first. Unconfirmed online
    /// orders (unpaid) are filtered out by the shared confirmed predicate.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_user_orders(&self, user_id: Uuid) -> Result<Vec<OrderDetails>, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .filter(order::confirmed())
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        self.expand(orders).await
    }

    /// Every confirmed order, newest first, for the back-office.
    #[instrument(skip(self))]
    pub async fn list_all_orders(&self) -> Result<Vec<OrderDetails>, ServiceError> {
        let orders = Order::find()
            .filter(order::confirmed())
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        self.expand(orders).await
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;
        let mut details = self.expand(vec![order]).await?;
        Ok(details.remove(0))
    }

    /// Seller-driven status transition, validated against the state machine.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = ?new_status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let old_status = order.status;
        if !old_status.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "{:?} -> {:?}",
                old_status, new_status
            )));
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(order_id = %order_id, ?old_status, ?new_status, "order status updated");
        let _ = self
            .event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status: format!("{:?}", old_status),
                new_status: format!("{:?}", new_status),
            })
            .await;

        Ok(updated)
    }

    /// True when the user has at least one delivered order containing the
    /// product; the review subsystem's precondition gate.
    pub async fn has_delivered_order_with_product(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<bool, ServiceError> {
        use sea_orm::{JoinType, QuerySelect, RelationTrait};

        let found = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .filter(order::Column::Status.eq(OrderStatus::Delivered))
            .join(JoinType::InnerJoin, order::Relation::OrderItems.def())
            .filter(order_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?;
        Ok(found.is_some())
    }

    async fn expand(&self, orders: Vec<order::Model>) -> Result<Vec<OrderDetails>, ServiceError> {
        let mut details = Vec::with_capacity(orders.len());
        for order in orders {
            let items = OrderItem::find()
                .filter(order_item::Column::OrderId.eq(order.id))
                .find_also_related(product::Entity)
                .all(&*self.db)
                .await?;
            let address = address::Entity::find_by_id(order.address_id)
                .one(&*self.db)
                .await?;

            let items = items
                .into_iter()
                .map(|(item, product)| OrderLineDetails {
                    product_id: item.product_id,
                    product_name: product.map(|p| p.name),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect();

            let paid_for_display = order.is_paid_for_display();
            details.push(OrderDetails {
                order,
                paid_for_display,
                items,
                address,
            });
        }
        Ok(details)
    }
}
