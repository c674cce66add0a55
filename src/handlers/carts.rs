use axum::{
    extract::{Json, State},
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::{auth::AuthenticatedUser, errors::ApiError, ApiResponse, AppState};

pub fn cart_routes() -> Router<AppState> {
    Router::new().route("/", get(get_cart).put(update_cart))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    /// `{product_id: quantity}` snapshot, replacing the stored one.
    pub items: serde_json::Value,
}

async fn get_cart(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let cart = state.services.carts.get_cart(auth.user_id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

async fn update_cart(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(payload): Json<UpdateCartRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let cart = state
        .services
        .carts
        .replace_cart(auth.user_id, payload.items)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}
