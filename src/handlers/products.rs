use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::SellerAuth,
    entities::product,
    errors::ApiError,
    services::catalog::CreateProductInput,
    ApiResponse, AppState,
};

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product))
        .route("/:id/restock", post(restock_product))
        .route("/:id/availability", put(set_availability))
}

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub in_stock: bool,
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<ApiResponse<Vec<product::Model>>>, ApiError> {
    let products = match query.category {
        Some(category) => state.services.catalog.list_by_category(&category).await?,
        None => state.services.catalog.list_products().await?,
    };
    Ok(Json(ApiResponse::success(products)))
}

async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<product::Model>>, ApiError> {
    let product = state.services.catalog.get_product(product_id).await?;
    Ok(Json(ApiResponse::success(product)))
}

async fn create_product(
    State(state): State<AppState>,
    _seller: SellerAuth,
    Json(payload): Json<CreateProductInput>,
) -> Result<Json<ApiResponse<product::Model>>, ApiError> {
    let product = state.services.catalog.create_product(payload).await?;
    Ok(Json(ApiResponse::success(product)))
}

async fn restock_product(
    State(state): State<AppState>,
    _seller: SellerAuth,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<RestockRequest>,
) -> Result<Json<ApiResponse<product::Model>>, ApiError> {
    let product = state
        .services
        .catalog
        .restock(product_id, payload.quantity)
        .await?;
    Ok(Json(ApiResponse::success(product)))
}

async fn set_availability(
    State(state): State<AppState>,
    _seller: SellerAuth,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<AvailabilityRequest>,
) -> Result<Json<ApiResponse<product::Model>>, ApiError> {
    let product = state
        .services
        .catalog
        .set_availability(product_id, payload.in_stock)
        .await?;
    Ok(Json(ApiResponse::success(product)))
}
