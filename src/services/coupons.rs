//! Coupon definitions and the startup seed set.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::coupon::{self, Entity as Coupon},
    errors::ServiceError,
    services::checkout::find_coupon_by_code,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCouponInput {
    #[validate(length(min = 1, message = "Coupon code is required"))]
    pub code: String,
    pub discount: Decimal,
    pub min_purchase: Decimal,
    #[serde(default)]
    pub one_time_use: bool,
}

#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list_coupons(&self) -> Result<Vec<coupon::Model>, ServiceError> {
        Ok(Coupon::find().all(&*self.db).await?)
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_coupon(
        &self,
        input: CreateCouponInput,
    ) -> Result<coupon::Model, ServiceError> {
        input.validate()?;
        if input.discount <= Decimal::ZERO || input.discount > Decimal::from(100) {
            return Err(ServiceError::InvalidInput(
                "Discount must be a percentage between 0 and 100".to_string(),
            ));
        }
        if input.min_purchase < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Minimum purchase cannot be negative".to_string(),
            ));
        }
        if find_coupon_by_code(&*self.db, &input.code).await?.is_some() {
            return Err(ServiceError::Conflict(
                "Coupon code already exists".to_string(),
            ));
        }

        let model = coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(input.code.trim().to_string()),
            discount: Set(input.discount),
            min_purchase: Set(input.min_purchase),
            one_time_use: Set(input.one_time_use),
            created_at: Set(Utc::now()),
        };
        Ok(model.insert(&*self.db).await?)
    }

    /// Seeds the default coupon set when the table is empty; a no-op
    /// otherwise, so restarts never duplicate codes.
    pub async fn seed_defaults(&self) -> Result<(), ServiceError> {
        let count = Coupon::find().count(&*self.db).await?;
        if count > 0 {
            return Ok(());
        }

        info!("no coupons found; seeding defaults");
        let defaults: [(&str, Decimal, Decimal, bool); 4] = [
            ("FIRST15", dec!(15), dec!(0), true),
            ("SAVE5", dec!(5), dec!(499), false),
            ("SAVE7", dec!(7.5), dec!(1099), false),
            ("SAVE10", dec!(10), dec!(2000), false),
        ];
        for (code, discount, min_purchase, one_time_use) in defaults {
            let model = coupon::ActiveModel {
                id: Set(Uuid::new_v4()),
                code: Set(code.to_string()),
                discount: Set(discount),
                min_purchase: Set(min_purchase),
                one_time_use: Set(one_time_use),
                created_at: Set(Utc::now()),
            };
            model.insert(&*self.db).await?;
        }
        Ok(())
    }
}
