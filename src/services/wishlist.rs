use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    entities::{
        product::{self, Entity as Product},
        wishlist_item::{self, Entity as WishlistItem},
    },
    errors::ServiceError,
};

#[derive(Clone)]
pub struct WishlistService {
    db: Arc<DatabaseConnection>,
}

impl WishlistService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<product::Model>, ServiceError> {
        let rows = WishlistItem::find()
            .filter(wishlist_item::Column::UserId.eq(user_id))
            .find_also_related(Product)
            .all(&*self.db)
            .await?;
        Ok(rows.into_iter().filter_map(|(_, product)| product).collect())
    }

    /// Idempotent add; re-adding an already wished product is a no-op.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn add(&self, user_id: Uuid, product_id: Uuid) -> Result<(), ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        let existing = WishlistItem::find()
            .filter(wishlist_item::Column::UserId.eq(user_id))
            .filter(wishlist_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Ok(());
        }

        let model = wishlist_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(product_id),
            created_at: Set(Utc::now()),
        };
        model.insert(&*self.db).await?;
        Ok(())
    }

    pub async fn remove(&self, user_id: Uuid, product_id: Uuid) -> Result<(), ServiceError> {
        WishlistItem::delete_many()
            .filter(wishlist_item::Column::UserId.eq(user_id))
            .filter(wishlist_item::Column::ProductId.eq(product_id))
            .exec(&*self.db)
            .await?;
        Ok(())
    }
}
