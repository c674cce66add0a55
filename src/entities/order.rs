use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Condition;
use serde::{Deserialize, Serialize};

/// A placed order. Created in the same transaction as the stock decrement;
/// `amount` is the final payable total, tax inclusive, with line prices
/// copied at placement time so later catalog edits never change history.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub address_id: Uuid,
    pub amount: Decimal,
    pub payment_type: PaymentType,
    pub status: OrderStatus,
    /// Only meaningful for `Online`; flipped by payment-success reconciliation.
    pub is_paid: bool,
    pub coupon_applied: bool,
    /// Code recorded so payment-failure compensation can consult the coupon
    /// definition (one-time flag) without a live foreign key.
    pub coupon_code: Option<String>,
    pub discount_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::address::Entity",
        from = "Column::AddressId",
        to = "super::address::Column::Id"
    )]
    Address,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::address::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Address.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum PaymentType {
    #[sea_orm(string_value = "COD")]
    #[serde(rename = "COD")]
    Cod,
    #[sea_orm(string_value = "Online")]
    Online,
}

/// Order lifecycle. Advanced only by seller action; `Delivered` and
/// `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum OrderStatus {
    #[sea_orm(string_value = "Order Placed")]
    #[serde(rename = "Order Placed")]
    OrderPlaced,
    #[sea_orm(string_value = "Processing")]
    Processing,
    #[sea_orm(string_value = "Shipped")]
    Shipped,
    #[sea_orm(string_value = "Delivered")]
    Delivered,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Legal transitions: the linear fulfilment chain, plus `Cancelled`
    /// from any non-terminal state.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (OrderPlaced, Processing) | (Processing, Shipped) | (Shipped, Delivered) => true,
            (from, Cancelled) if !from.is_terminal() => true,
            _ => false,
        }
    }
}

impl Model {
    /// A confirmed order is visible to both the customer and the seller:
    /// COD orders immediately, online orders only once paid.
    pub fn is_confirmed(&self) -> bool {
        self.payment_type == PaymentType::Cod || self.is_paid
    }

    /// For display, a COD order counts as paid once it has been delivered.
    pub fn is_paid_for_display(&self) -> bool {
        match self.payment_type {
            PaymentType::Online => self.is_paid,
            PaymentType::Cod => self.status == OrderStatus::Delivered,
        }
    }
}

/// Query-side form of [`Model::is_confirmed`], shared by the customer and
/// seller listing paths so the visibility rule cannot drift between them.
pub fn confirmed() -> Condition {
    Condition::any()
        .add(Column::PaymentType.eq(PaymentType::Cod))
        .add(Column::IsPaid.eq(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fulfilment_chain_is_linear() {
        use OrderStatus::*;
        assert!(OrderPlaced.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(!OrderPlaced.can_transition_to(Shipped));
        assert!(!Shipped.can_transition_to(Processing));
        assert!(!Delivered.can_transition_to(Cancelled));
    }

    #[test]
    fn cancel_allowed_from_any_non_terminal_state() {
        use OrderStatus::*;
        for from in [OrderPlaced, Processing, Shipped] {
            assert!(from.can_transition_to(Cancelled));
        }
        assert!(!Cancelled.can_transition_to(Processing));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }
}
