//! Product catalog management.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::product::{self, Entity as Product},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, message = "Product name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    pub images: Vec<String>,
    pub price: Decimal,
    pub offer_price: Decimal,
    #[serde(default)]
    pub stock: i32,
}

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        if input.offer_price > input.price {
            return Err(ServiceError::InvalidInput(
                "Offer price cannot exceed list price".to_string(),
            ));
        }
        if input.stock < 0 {
            return Err(ServiceError::InvalidInput(
                "Stock cannot be negative".to_string(),
            ));
        }

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            description: Set(input.description),
            category: Set(input.category),
            images: Set(serde_json::json!(input.images)),
            price: Set(input.price),
            offer_price: Set(input.offer_price),
            stock: Set(input.stock),
            in_stock: Set(input.stock > 0),
            rating: Set(0.0),
            num_reviews: Set(0),
            times_in_cart: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let saved = model.insert(&*self.db).await?;
        info!(product_id = %saved.id, "product created");
        Ok(saved)
    }

    pub async fn list_products(&self) -> Result<Vec<product::Model>, ServiceError> {
        Ok(Product::find()
            .order_by_desc(product::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    pub async fn list_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<product::Model>, ServiceError> {
        Ok(Product::find()
            .filter(product::Column::Category.eq(category))
            .order_by_desc(product::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))
    }

    /// Seller restock: adds `quantity` units and refreshes availability.
    #[instrument(skip(self), fields(product_id = %product_id, quantity))]
    pub async fn restock(
        &self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<product::Model, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::InvalidInput(
                "Restock quantity must be at least 1".to_string(),
            ));
        }

        let product = self.get_product(product_id).await?;
        let new_stock = product.stock + quantity;

        let mut active: product::ActiveModel = product.into();
        active.stock = Set(new_stock);
        active.in_stock = Set(new_stock > 0);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        let _ = self
            .event_sender
            .send(Event::StockRestored {
                product_id,
                quantity,
            })
            .await;
        Ok(updated)
    }

    /// Seller toggle for the storefront availability flag; does not touch
    /// the stock count.
    pub async fn set_availability(
        &self,
        product_id: Uuid,
        in_stock: bool,
    ) -> Result<product::Model, ServiceError> {
        let product = self.get_product(product_id).await?;
        let mut active: product::ActiveModel = product.into();
        active.in_stock = Set(in_stock);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }
}
