use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post},
    Router,
};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser, entities::product, errors::ApiError, ApiResponse, AppState,
};

pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_wishlist))
        .route("/:product_id", post(add_to_wishlist))
        .route("/:product_id", delete(remove_from_wishlist))
}

async fn list_wishlist(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<product::Model>>>, ApiError> {
    let products = state.services.wishlist.list(auth.user_id).await?;
    Ok(Json(ApiResponse::success(products)))
}

async fn add_to_wishlist(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.services.wishlist.add(auth.user_id, product_id).await?;
    Ok(Json(ApiResponse::success_with_message((), "Added to Wishlist")))
}

async fn remove_from_wishlist(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state
        .services
        .wishlist
        .remove(auth.user_id, product_id)
        .await?;
    Ok(Json(ApiResponse::success_with_message((), "Removed from Wishlist")))
}
