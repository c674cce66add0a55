//! Persisted cart snapshots.
//!
//! The client owns the live cart; the server keeps a `{product_id: qty}`
//! snapshot on the user record so carts survive devices and sessions. The
//! snapshot is cleared server-side only by payment-success reconciliation.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    entities::{
        product::{self, Entity as Product},
        user::{self, Entity as User},
    },
    errors::ServiceError,
};

#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn get_cart(&self, user_id: Uuid) -> Result<serde_json::Value, ServiceError> {
        let user = User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
        Ok(user.cart_items)
    }

    /// Replaces the snapshot wholesale with what the client holds. Products
    /// newly present in the cart get their popularity counter bumped.
    #[instrument(skip(self, items), fields(user_id = %user_id))]
    pub async fn replace_cart(
        &self,
        user_id: Uuid,
        items: serde_json::Value,
    ) -> Result<serde_json::Value, ServiceError> {
        let incoming = parse_snapshot(&items)?;

        let user = User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
        let previous = parse_snapshot(&user.cart_items).unwrap_or_default();

        let newly_added: Vec<Uuid> = incoming
            .keys()
            .filter(|id| !previous.contains_key(*id))
            .copied()
            .collect();
        if !newly_added.is_empty() {
            Product::update_many()
                .col_expr(
                    product::Column::TimesInCart,
                    Expr::col(product::Column::TimesInCart).add(1),
                )
                .filter(product::Column::Id.is_in(newly_added))
                .exec(&*self.db)
                .await?;
        }

        let snapshot = items.clone();
        let mut active: user::ActiveModel = user.into();
        active.cart_items = Set(items);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        Ok(snapshot)
    }
}

/// A snapshot is a JSON object of `{uuid: positive quantity}`.
fn parse_snapshot(value: &serde_json::Value) -> Result<HashMap<Uuid, i64>, ServiceError> {
    let map = value
        .as_object()
        .ok_or_else(|| ServiceError::InvalidInput("Cart must be an object".to_string()))?;

    let mut snapshot = HashMap::with_capacity(map.len());
    for (key, qty) in map {
        let product_id = Uuid::parse_str(key)
            .map_err(|_| ServiceError::InvalidInput(format!("Invalid product id: {}", key)))?;
        let quantity = qty
            .as_i64()
            .filter(|q| *q > 0)
            .ok_or_else(|| ServiceError::InvalidInput("Quantities must be positive".to_string()))?;
        snapshot.insert(product_id, quantity);
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_parses_uuid_keys_and_positive_quantities() {
        let id = Uuid::new_v4();
        let value = serde_json::json!({ id.to_string(): 3 });
        let parsed = parse_snapshot(&value).unwrap();
        assert_eq!(parsed.get(&id), Some(&3));
    }

    #[test]
    fn snapshot_rejects_bad_shapes() {
        assert!(parse_snapshot(&serde_json::json!([1, 2])).is_err());
        assert!(parse_snapshot(&serde_json::json!({ "not-a-uuid": 1 })).is_err());
        let id = Uuid::new_v4().to_string();
        assert!(parse_snapshot(&serde_json::json!({ id: 0 })).is_err());
        let id = Uuid::new_v4().to_string();
        assert!(parse_snapshot(&serde_json::json!({ id: -2 })).is_err());
    }
}
