use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Lifecycle events emitted by the services. Delivery is best-effort; a
/// full channel drops the event with a warning rather than blocking the
/// request path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderPaid(Uuid),
    OrderDeleted(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    StockDecremented {
        product_id: Uuid,
        quantity: i32,
    },
    StockRestored {
        product_id: Uuid,
        quantity: i32,
    },
    CouponRedeemed {
        code: String,
        order_id: Uuid,
    },
    CartCleared(Uuid),
    ReviewCreated {
        product_id: Uuid,
        user_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Consumes the event stream. Today this only logs; it is the seam where
/// outbound notifications (order-confirmation email, seller alerts) hang.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated(order_id) => info!(order_id = %order_id, "order created"),
            Event::OrderPaid(order_id) => info!(order_id = %order_id, "order paid"),
            Event::OrderDeleted(order_id) => info!(order_id = %order_id, "order deleted"),
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => info!(order_id = %order_id, %old_status, %new_status, "order status changed"),
            Event::StockDecremented {
                product_id,
                quantity,
            } => info!(product_id = %product_id, quantity, "stock decremented"),
            Event::StockRestored {
                product_id,
                quantity,
            } => info!(product_id = %product_id, quantity, "stock restored"),
            Event::CouponRedeemed { code, order_id } => {
                info!(%code, order_id = %order_id, "coupon redeemed")
            }
            Event::CartCleared(user_id) => info!(user_id = %user_id, "cart cleared"),
            Event::ReviewCreated {
                product_id,
                user_id,
            } => info!(product_id = %product_id, user_id = %user_id, "review created"),
        }
    }
    warn!("event channel closed; processor exiting");
}
