use axum::{
    extract::{Json, Path, State},
    routing::{get, post, put},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{AuthenticatedUser, SellerAuth},
    entities::order::{OrderStatus, PaymentType},
    errors::ApiError,
    services::checkout::{OrderLineInput, PlaceOrderInput},
    services::orders::OrderDetails,
    ApiResponse, AppState,
};

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/cod", post(place_order_cod))
        .route("/online", post(place_order_online))
        .route("/mine", get(list_my_orders))
        .route("/", get(list_all_orders))
        .route("/:id/status", put(update_order_status))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderLineRequest>,
    pub address_id: Uuid,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlaceOrderResponse {
    pub order_id: Uuid,
    pub order_number: String,
    pub amount: Decimal,
    /// Gateway redirect; present for online payment only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

impl PlaceOrderRequest {
    fn into_input(self) -> PlaceOrderInput {
        PlaceOrderInput {
            items: self
                .items
                .into_iter()
                .map(|line| OrderLineInput {
                    product_id: line.product_id,
                    quantity: line.quantity,
                })
                .collect(),
            address_id: self.address_id,
            coupon_code: self.coupon_code,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/cod",
    request_body = PlaceOrderRequest,
    responses(
        (status = 200, description = "Order placed", body = PlaceOrderResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
        (status = 400, description = "Invalid request or coupon", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn place_order_cod(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<Json<ApiResponse<PlaceOrderResponse>>, ApiError> {
    let placed = state
        .services
        .checkout
        .place_order(auth.user_id, payload.into_input(), PaymentType::Cod)
        .await?;

    Ok(Json(ApiResponse::success(PlaceOrderResponse {
        order_id: placed.order.id,
        order_number: placed.order.order_number,
        amount: placed.order.amount,
        url: None,
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/online",
    request_body = PlaceOrderRequest,
    responses(
        (status = 200, description = "Order placed; redirect to the returned payment URL", body = PlaceOrderResponse),
        (status = 402, description = "Payment session could not be created", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn place_order_online(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<Json<ApiResponse<PlaceOrderResponse>>, ApiError> {
    let placed = state
        .services
        .checkout
        .place_order(auth.user_id, payload.into_input(), PaymentType::Online)
        .await?;

    Ok(Json(ApiResponse::success(PlaceOrderResponse {
        order_id: placed.order.id,
        order_number: placed.order.order_number,
        amount: placed.order.amount,
        url: placed.payment_url,
    })))
}

/// The caller's confirmed orders, newest first.
async fn list_my_orders(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<OrderDetails>>>, ApiError> {
    let orders = state.services.orders.list_user_orders(auth.user_id).await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Every confirmed order, for the back-office.
async fn list_all_orders(
    State(state): State<AppState>,
    _seller: SellerAuth,
) -> Result<Json<ApiResponse<Vec<OrderDetails>>>, ApiError> {
    let orders = state.services.orders.list_all_orders().await?;
    Ok(Json(ApiResponse::success(orders)))
}

async fn update_order_status(
    State(state): State<AppState>,
    _seller: SellerAuth,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<crate::entities::order::Model>>, ApiError> {
    let order = state
        .services
        .orders
        .update_status(order_id, payload.status)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}
