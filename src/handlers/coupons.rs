use axum::{
    extract::{Json, State},
    routing::get,
    Router,
};

use crate::{
    auth::SellerAuth,
    entities::coupon,
    errors::ApiError,
    services::coupons::CreateCouponInput,
    ApiResponse, AppState,
};

pub fn coupon_routes() -> Router<AppState> {
    Router::new().route("/", get(list_coupons).post(create_coupon))
}

async fn list_coupons(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<coupon::Model>>>, ApiError> {
    let coupons = state.services.coupons.list_coupons().await?;
    Ok(Json(ApiResponse::success(coupons)))
}

async fn create_coupon(
    State(state): State<AppState>,
    _seller: SellerAuth,
    Json(payload): Json<CreateCouponInput>,
) -> Result<Json<ApiResponse<coupon::Model>>, ApiError> {
    let coupon = state.services.coupons.create_coupon(payload).await?;
    Ok(Json(ApiResponse::success(coupon)))
}
