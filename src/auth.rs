//! Token-based authentication.
//!
//! Every protected route receives a typed [`AuthenticatedUser`] (or
//! [`SellerAuth`]) extractor; there is no ambient session state. Customer
//! accounts live in the `users` table; the back-office has a single
//! operator identity validated against configured credentials.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    entities::user::{self, Entity as User},
    errors::ServiceError,
    AppState,
};

pub const ROLE_CUSTOMER: &str = "customer";
pub const ROLE_SELLER: &str = "seller";

/// JWT claims carried by every bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user id, or the seller email for the back-office token
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct AuthService {
    db: Arc<DatabaseConnection>,
    jwt_secret: String,
    jwt_expiration: usize,
    seller_email: Option<String>,
    seller_password: Option<String>,
}

impl AuthService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        jwt_secret: String,
        jwt_expiration: usize,
        seller_email: Option<String>,
        seller_password: Option<String>,
    ) -> Self {
        Self {
            db,
            jwt_secret,
            jwt_expiration,
            seller_email,
            seller_password,
        }
    }

    /// Creates a customer account and returns it with a fresh token.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(
        &self,
        input: RegisterInput,
    ) -> Result<(user::Model, String), ServiceError> {
        if input.name.is_empty() || input.email.is_empty() || input.password.is_empty() {
            return Err(ServiceError::InvalidInput("Missing details".to_string()));
        }

        let existing = User::find()
            .filter(user::Column::Email.eq(input.email.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict("User already exists".to_string()));
        }

        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            email: Set(input.email),
            password_hash: Set(hash_password(&input.password)?),
            cart_items: Set(serde_json::json!({})),
            has_used_first_order_coupon: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let saved = model.insert(&*self.db).await?;

        let token = self.issue_token(&saved.id.to_string(), ROLE_CUSTOMER)?;
        Ok((saved, token))
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn login(&self, input: LoginInput) -> Result<(user::Model, String), ServiceError> {
        let user = User::find()
            .filter(user::Column::Email.eq(input.email.clone()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid email or password".to_string()))?;

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(ServiceError::Unauthorized(
                "Invalid email or password".to_string(),
            ));
        }

        let token = self.issue_token(&user.id.to_string(), ROLE_CUSTOMER)?;
        Ok((user, token))
    }

    /// Back-office sign-in against the configured operator credentials.
    #[instrument(skip(self, password))]
    pub async fn seller_login(&self, email: &str, password: &str) -> Result<String, ServiceError> {
        let (cfg_email, cfg_password) = match (&self.seller_email, &self.seller_password) {
            (Some(e), Some(p)) => (e, p),
            _ => {
                return Err(ServiceError::Unauthorized(
                    "Seller sign-in is not configured".to_string(),
                ))
            }
        };

        if email != cfg_email || password != cfg_password {
            return Err(ServiceError::Unauthorized(
                "Invalid credentials".to_string(),
            ));
        }

        self.issue_token(email, ROLE_SELLER)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    fn issue_token(&self, sub: &str, role: &str) -> Result<String, ServiceError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            role: role.to_string(),
            iat: now,
            exp: now + self.jwt_expiration as i64,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("failed to sign token: {}", e)))
    }
}

pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, ServiceError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {}", e)))
}

fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(hash).map_err(|e| ServiceError::HashError(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// A signed-in customer, extracted from the bearer token. Handlers take
/// this by parameter; user identity is never ambient.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let token = bearer_token(parts)
            .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".to_string()))?;
        let claims = decode_claims(token, &state.config.jwt_secret)?;

        if claims.role != ROLE_CUSTOMER {
            return Err(ServiceError::Forbidden(
                "customer token required".to_string(),
            ));
        }

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::Unauthorized("malformed subject claim".to_string()))?;
        Ok(AuthenticatedUser { user_id })
    }
}

/// The back-office operator, for seller-only routes.
#[derive(Debug, Clone)]
pub struct SellerAuth {
    pub email: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for SellerAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let token = bearer_token(parts)
            .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".to_string()))?;
        let claims = decode_claims(token, &state.config.jwt_secret)?;

        if claims.role != ROLE_SELLER {
            return Err(ServiceError::Forbidden("seller token required".to_string()));
        }

        Ok(SellerAuth { email: claims.sub })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("hunter2!").unwrap();
        assert!(verify_password("hunter2!", &hash).unwrap());
        assert!(!verify_password("hunter3!", &hash).unwrap());
    }

    #[test]
    fn token_round_trip_preserves_claims() {
        let svc = AuthService::new(
            Arc::new(DatabaseConnection::Disconnected),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            3600,
            None,
            None,
        );
        let id = Uuid::new_v4();
        let token = svc.issue_token(&id.to_string(), ROLE_CUSTOMER).unwrap();
        let claims =
            decode_claims(&token, "test_secret_key_for_testing_purposes_only_32chars").unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.role, ROLE_CUSTOMER);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let svc = AuthService::new(
            Arc::new(DatabaseConnection::Disconnected),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            3600,
            None,
            None,
        );
        let token = svc.issue_token("someone", ROLE_SELLER).unwrap();
        assert!(decode_claims(&token, "a_completely_different_secret_key_32chars!!").is_err());
    }
}
