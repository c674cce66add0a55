//! Product reviews, gated on delivery.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        product::{self, Entity as Product},
        review::{self, Entity as Review},
        user,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::orders::OrderService,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i16,
    #[validate(length(min = 1, message = "Comment is required"))]
    pub comment: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReviewInput {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i16>,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReviewWithAuthor {
    #[serde(flatten)]
    pub review: review::Model,
    pub author_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReviewEligibility {
    pub can_review: bool,
    pub has_reviewed: bool,
    pub review: Option<review::Model>,
}

#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
    orders: Arc<OrderService>,
    event_sender: Arc<EventSender>,
}

impl ReviewService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        orders: Arc<OrderService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            orders,
            event_sender,
        }
    }

    /// Creates a review. Only buyers with a delivered order containing the
    /// product may review it, once each.
    #[instrument(skip(self, input), fields(user_id = %user_id, product_id = %input.product_id))]
    pub async fn create_review(
        &self,
        user_id: Uuid,
        input: CreateReviewInput,
    ) -> Result<review::Model, ServiceError> {
        input.validate()?;

        Product::find_by_id(input.product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        let delivered = self
            .orders
            .has_delivered_order_with_product(user_id, input.product_id)
            .await?;
        if !delivered {
            return Err(ServiceError::Forbidden(
                "You can only review products you have purchased and that have been delivered"
                    .to_string(),
            ));
        }

        let existing = Review::find()
            .filter(review::Column::ProductId.eq(input.product_id))
            .filter(review::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "You have already reviewed this product".to_string(),
            ));
        }

        let now = Utc::now();
        let model = review::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(input.product_id),
            user_id: Set(user_id),
            rating: Set(input.rating),
            comment: Set(input.comment),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let saved = model.insert(&*self.db).await?;

        self.recompute_product_rating(input.product_id).await?;
        let _ = self
            .event_sender
            .send(Event::ReviewCreated {
                product_id: input.product_id,
                user_id,
            })
            .await;
        Ok(saved)
    }

    /// Updates the caller's own review and refreshes the product aggregate.
    #[instrument(skip(self, input), fields(user_id = %user_id, review_id = %review_id))]
    pub async fn update_review(
        &self,
        user_id: Uuid,
        review_id: Uuid,
        input: UpdateReviewInput,
    ) -> Result<review::Model, ServiceError> {
        input.validate()?;

        let review = Review::find_by_id(review_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Review not found".to_string()))?;
        if review.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "Not your review".to_string(),
            ));
        }

        let product_id = review.product_id;
        let mut active: review::ActiveModel = review.into();
        if let Some(rating) = input.rating {
            active.rating = Set(rating);
        }
        if let Some(comment) = input.comment {
            active.comment = Set(comment);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.recompute_product_rating(product_id).await?;
        Ok(updated)
    }

    pub async fn list_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<ReviewWithAuthor>, ServiceError> {
        let rows = Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .order_by_desc(review::Column::CreatedAt)
            .find_also_related(user::Entity)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(review, author)| ReviewWithAuthor {
                review,
                author_name: author.map(|u| u.name),
            })
            .collect())
    }

    pub async fn eligibility(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<ReviewEligibility, ServiceError> {
        let delivered = self
            .orders
            .has_delivered_order_with_product(user_id, product_id)
            .await?;
        if !delivered {
            return Ok(ReviewEligibility {
                can_review: false,
                has_reviewed: false,
                review: None,
            });
        }

        let existing = Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .filter(review::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?;
        Ok(ReviewEligibility {
            can_review: true,
            has_reviewed: existing.is_some(),
            review: existing,
        })
    }

    async fn recompute_product_rating(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let reviews = Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .all(&*self.db)
            .await?;

        let count = reviews.len() as i32;
        let mean = if reviews.is_empty() {
            0.0
        } else {
            reviews.iter().map(|r| f32::from(r.rating)).sum::<f32>() / reviews.len() as f32
        };

        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;
        let mut active: product::ActiveModel = product.into();
        active.rating = Set(mean);
        active.num_reviews = Set(count);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;
        Ok(())
    }
}
