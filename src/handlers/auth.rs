use axum::{
    extract::{Json, State},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{AuthenticatedUser, LoginInput, RegisterInput},
    errors::ApiError,
    handlers::common::validate_input,
    ApiResponse, AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/seller/login", post(seller_login))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: AuthUserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthUserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SellerAuthResponse {
    pub token: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created"),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    validate_input(&payload)?;

    let (user, token) = state
        .services
        .auth
        .register(RegisterInput {
            name: payload.name,
            email: payload.email,
            password: payload.password,
        })
        .await?;

    Ok(Json(ApiResponse::success(AuthResponse {
        token,
        user: AuthUserResponse {
            id: user.id,
            name: user.name,
            email: user.email,
        },
    })))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    validate_input(&payload)?;

    let (user, token) = state
        .services
        .auth
        .login(LoginInput {
            email: payload.email,
            password: payload.password,
        })
        .await?;

    Ok(Json(ApiResponse::success(AuthResponse {
        token,
        user: AuthUserResponse {
            id: user.id,
            name: user.name,
            email: user.email,
        },
    })))
}

/// Who-am-I probe used by the storefront on load.
async fn me(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<ApiResponse<AuthUserResponse>>, ApiError> {
    let user = state.services.auth.get_user(auth.user_id).await?;
    Ok(Json(ApiResponse::success(AuthUserResponse {
        id: user.id,
        name: user.name,
        email: user.email,
    })))
}

async fn seller_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<SellerAuthResponse>>, ApiError> {
    let token = state
        .services
        .auth
        .seller_login(&payload.email, &payload.password)
        .await?;
    Ok(Json(ApiResponse::success(SellerAuthResponse { token })))
}
