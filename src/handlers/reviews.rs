use axum::{
    extract::{Json, Path, State},
    routing::{get, post, put},
    Router,
};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    entities::review,
    errors::ApiError,
    services::reviews::{CreateReviewInput, ReviewEligibility, ReviewWithAuthor, UpdateReviewInput},
    ApiResponse, AppState,
};

pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_review))
        .route("/:id", put(update_review))
        .route("/product/:product_id", get(list_product_reviews))
        .route("/can-review/:product_id", get(check_eligibility))
}

async fn create_review(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(payload): Json<CreateReviewInput>,
) -> Result<Json<ApiResponse<review::Model>>, ApiError> {
    let review = state
        .services
        .reviews
        .create_review(auth.user_id, payload)
        .await?;
    Ok(Json(ApiResponse::success(review)))
}

async fn update_review(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(review_id): Path<Uuid>,
    Json(payload): Json<UpdateReviewInput>,
) -> Result<Json<ApiResponse<review::Model>>, ApiError> {
    let review = state
        .services
        .reviews
        .update_review(auth.user_id, review_id, payload)
        .await?;
    Ok(Json(ApiResponse::success(review)))
}

async fn list_product_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<ReviewWithAuthor>>>, ApiError> {
    let reviews = state.services.reviews.list_for_product(product_id).await?;
    Ok(Json(ApiResponse::success(reviews)))
}

/// Eligibility probe the product page uses to decide whether to show the
/// review form.
async fn check_eligibility(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ReviewEligibility>>, ApiError> {
    let eligibility = state
        .services
        .reviews
        .eligibility(auth.user_id, product_id)
        .await?;
    Ok(Json(ApiResponse::success(eligibility)))
}
