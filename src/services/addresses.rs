use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::address::{self, Entity as Address},
    errors::ServiceError,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAddressInput {
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub street: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub state: String,
    #[validate(length(min = 1))]
    pub zip_code: String,
    #[validate(length(min = 1))]
    pub country: String,
    #[validate(length(min = 1))]
    pub phone: String,
}

#[derive(Clone)]
pub struct AddressService {
    db: Arc<DatabaseConnection>,
}

impl AddressService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn create_address(
        &self,
        user_id: Uuid,
        input: CreateAddressInput,
    ) -> Result<address::Model, ServiceError> {
        input.validate()?;

        let model = address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            first_name: Set(input.first_name),
            last_name: Set(input.last_name),
            email: Set(input.email),
            street: Set(input.street),
            city: Set(input.city),
            state: Set(input.state),
            zip_code: Set(input.zip_code),
            country: Set(input.country),
            phone: Set(input.phone),
            created_at: Set(Utc::now()),
        };
        Ok(model.insert(&*self.db).await?)
    }

    pub async fn list_addresses(&self, user_id: Uuid) -> Result<Vec<address::Model>, ServiceError> {
        Ok(Address::find()
            .filter(address::Column::UserId.eq(user_id))
            .order_by_desc(address::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }
}
